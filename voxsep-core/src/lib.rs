//! # voxsep Core Library
//!
//! Client for the AudioShake Tasks API including:
//! - Task client (upload, create task, poll status, download stems)
//! - Single-file separation workflow state machine
//! - Bounded-concurrency batch scheduler
//! - Event types (SeparatorEvent enum) and event bus
//! - Audio file discovery
//! - Configuration loading and credential handling

pub mod batch;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod scanner;
pub mod types;
pub mod workflow;

pub use error::{Error, Result};
