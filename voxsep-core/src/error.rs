//! Common error types for voxsep

use thiserror::Error;

/// Common result type for voxsep operations
pub type Result<T> = std::result::Result<T, Error>;

/// Maximum length of remote-provided text kept for display.
const DISPLAY_LIMIT: usize = 200;

/// Error taxonomy for the separation pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// Input rejected before any network call (missing file, unsupported extension)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP 401 from any endpoint
    #[error("Authentication failed. Your API key may be invalid or expired. Check your key and try again.")]
    Auth,

    /// Network-level failure (connect, timeout, DNS)
    #[error("Network error: {0}")]
    Transport(String),

    /// Non-2xx, non-401 response from the remote API
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    /// Remote task reported a failed target
    #[error("Task failed: {0}")]
    TaskFailed(String),

    /// Task completed but produced no downloadable files
    #[error("Task completed but produced no output files")]
    NoOutput,

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Truncate remote-provided text (response bodies, transport messages) so
/// one oversized payload cannot flood a terminal or a log line.
pub(crate) fn truncate_for_display(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= DISPLAY_LIMIT {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(DISPLAY_LIMIT).collect();
        format!("{cut}...")
    }
}
