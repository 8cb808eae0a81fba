//! Wire types for the AudioShake Tasks API
//!
//! `POST /assets` → `UploadResponse`, `POST /tasks` → `CreateTaskResponse`,
//! `GET /tasks/{id}` → `TaskSnapshot`. Field names follow the remote
//! contract; snapshots tolerate a missing `targets` array (the task simply
//! is not done yet).

use serde::{Deserialize, Serialize};

/// One requested output: model + formats + optional modifiers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    /// Separation model (e.g. "vocals", "instrumental", "drums")
    pub model: String,
    /// Requested output formats (e.g. ["wav"])
    pub formats: Vec<String>,
    /// Optional model variant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    /// Also produce the residual (source minus the model output)
    #[serde(default, skip_serializing_if = "is_false")]
    pub residual: bool,
    /// Optional language hint for lyric-aware models
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !value
}

impl Target {
    pub fn new(model: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            formats: vec![format.into()],
            variant: None,
            residual: false,
            language: None,
        }
    }
}

/// `POST /assets` response
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    /// Server-side asset id for the uploaded file
    pub id: String,
}

/// `POST /tasks` request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest<'a> {
    pub asset_id: &'a str,
    pub targets: &'a [Target],
}

/// `POST /tasks` response
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTaskResponse {
    pub id: String,
}

/// Per-target processing status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetState {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// One downloadable output produced by a completed target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputEntry {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
}

/// One target's slice of a task snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetStatus {
    pub status: TargetState,
    /// Remote error text, present when `status` is `failed`
    #[serde(default)]
    pub error: Option<String>,
    /// Outputs, present once the target completes
    #[serde(default)]
    pub output: Option<Vec<OutputEntry>>,
}

/// `GET /tasks/{id}` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: String,
    /// May be absent early in processing
    #[serde(default)]
    pub targets: Option<Vec<TargetStatus>>,
}

/// Task-level classification derived from per-target statuses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskPhase {
    /// Keep polling
    InProgress,
    /// Every target completed
    Completed,
    /// Some target failed; carries the first failed target's error text
    Failed(String),
}

impl TaskSnapshot {
    /// Classify the snapshot. Any failed target fails the task even when
    /// others completed; an empty or missing target list means "not yet
    /// done", never done and never failed.
    pub fn phase(&self) -> TaskPhase {
        let targets = match self.targets.as_deref() {
            Some(targets) if !targets.is_empty() => targets,
            _ => return TaskPhase::InProgress,
        };

        if let Some(failed) = targets.iter().find(|t| t.status == TargetState::Failed) {
            let reason = failed
                .error
                .clone()
                .unwrap_or_else(|| "unknown error".to_string());
            return TaskPhase::Failed(reason);
        }

        if targets.iter().all(|t| t.status == TargetState::Completed) {
            TaskPhase::Completed
        } else {
            TaskPhase::InProgress
        }
    }

    /// Flatten all downloadable outputs across targets to `(name, link)`
    /// pairs. Entries without a link are skipped; a missing name falls back
    /// to "output".
    pub fn outputs(&self) -> Vec<(String, String)> {
        let mut outputs = Vec::new();
        for target in self.targets.as_deref().unwrap_or_default() {
            for entry in target.output.as_deref().unwrap_or_default() {
                if let Some(link) = &entry.link {
                    let name = entry
                        .name
                        .clone()
                        .unwrap_or_else(|| "output".to_string());
                    outputs.push((name, link.clone()));
                }
            }
        }
        outputs
    }
}
