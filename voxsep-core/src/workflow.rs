//! Single-file separation workflow
//!
//! Drives one input through the task lifecycle:
//!
//! Idle → Uploading → TaskCreating → Polling → Downloading → {Succeeded | Failed | Cancelled}
//!
//! The cancellation token is checked at the suspension points (phase
//! boundaries and the poll loop); once the task is observed complete, the
//! download phase runs to its own end. Every failure mode collapses into
//! the returned outcome; nothing escapes as a panic.

use crate::client::ApiClient;
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::events::FileStatus;
use crate::scanner;
use crate::types::{Target, TaskPhase, TaskSnapshot};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default wait between task status polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Extension used when an output link carries none
const DEFAULT_OUTPUT_EXTENSION: &str = "wav";

/// Workflow states, in lifecycle order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Idle,
    Uploading,
    TaskCreating,
    Polling,
    Downloading,
    Succeeded,
    Failed,
    Cancelled,
}

/// Per-invocation workflow configuration
#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    /// Directory receiving the separated stems
    pub output_dir: PathBuf,
    /// Requested output (model + formats + modifiers)
    pub target: Target,
    /// Wait between status polls
    pub poll_interval: Duration,
}

impl WorkflowOptions {
    pub fn new(output_dir: PathBuf, target: Target) -> Self {
        Self {
            output_dir,
            target,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn from_settings(output_dir: PathBuf, settings: &Settings) -> Self {
        Self {
            output_dir,
            target: settings.target(),
            poll_interval: Duration::from_secs(settings.poll_interval_secs),
        }
    }
}

/// Terminal result of one workflow invocation
#[derive(Debug)]
pub enum SeparationOutcome {
    /// At least one output file was saved
    Succeeded { saved: Vec<PathBuf> },
    /// Any failure, from local validation to a remote task error
    Failed { error: Error },
    /// The cancellation signal was observed at a suspension point
    Cancelled,
}

impl SeparationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    pub fn status(&self) -> FileStatus {
        match self {
            Self::Succeeded { .. } => FileStatus::Success,
            Self::Failed { .. } => FileStatus::Failed,
            Self::Cancelled => FileStatus::Cancelled,
        }
    }

    pub fn failure_message(&self) -> Option<String> {
        match self {
            Self::Failed { error } => Some(error.to_string()),
            _ => None,
        }
    }

    /// One-word-ish label for run logs and summaries
    pub fn log_label(&self) -> String {
        match self {
            Self::Succeeded { .. } => "Success".to_string(),
            Self::Failed { error } => format!("Failed: {error}"),
            Self::Cancelled => "Cancelled".to_string(),
        }
    }
}

/// Run the full lifecycle for one input file.
pub async fn separate_file(
    client: &ApiClient,
    input: &Path,
    options: &WorkflowOptions,
    cancel: &CancellationToken,
) -> SeparationOutcome {
    let outcome = match run(client, input, options, cancel).await {
        Ok(StepResult::Saved(saved)) => SeparationOutcome::Succeeded { saved },
        Ok(StepResult::Cancelled) => SeparationOutcome::Cancelled,
        Err(error) => SeparationOutcome::Failed { error },
    };

    let terminal = match &outcome {
        SeparationOutcome::Succeeded { .. } => WorkflowState::Succeeded,
        SeparationOutcome::Failed { .. } => WorkflowState::Failed,
        SeparationOutcome::Cancelled => WorkflowState::Cancelled,
    };
    transition(input, terminal);

    outcome
}

enum StepResult {
    Saved(Vec<PathBuf>),
    Cancelled,
}

async fn run(
    client: &ApiClient,
    input: &Path,
    options: &WorkflowOptions,
    cancel: &CancellationToken,
) -> Result<StepResult> {
    // Validate before touching the network
    if !input.exists() {
        return Err(Error::InvalidInput(format!(
            "skipped: file not found: {}",
            input.display()
        )));
    }
    if !scanner::is_audio_file(input) {
        return Err(Error::InvalidInput(format!(
            "skipped: unsupported file type: {}",
            input.display()
        )));
    }

    if cancel.is_cancelled() {
        return Ok(StepResult::Cancelled);
    }

    transition(input, WorkflowState::Uploading);
    let asset_id = client.upload(input).await?;

    if cancel.is_cancelled() {
        return Ok(StepResult::Cancelled);
    }

    transition(input, WorkflowState::TaskCreating);
    let task_id = client
        .create_task(&asset_id, std::slice::from_ref(&options.target))
        .await?;

    transition(input, WorkflowState::Polling);
    let snapshot = loop {
        // One check covers both "before every poll" and "after every sleep"
        if cancel.is_cancelled() {
            return Ok(StepResult::Cancelled);
        }

        let snapshot = client.get_task(&task_id).await?;
        match snapshot.phase() {
            TaskPhase::Completed => break snapshot,
            TaskPhase::Failed(reason) => return Err(Error::TaskFailed(reason)),
            TaskPhase::InProgress => {}
        }

        tokio::time::sleep(options.poll_interval).await;
    };

    // Completion observed: the download phase runs to its own end even if
    // cancellation arrives now.
    transition(input, WorkflowState::Downloading);
    let saved = download_outputs(client, input, &snapshot, &options.output_dir).await?;
    if saved.is_empty() {
        return Err(Error::NoOutput);
    }
    Ok(StepResult::Saved(saved))
}

async fn download_outputs(
    client: &ApiClient,
    input: &Path,
    snapshot: &TaskSnapshot,
    output_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let outputs = snapshot.outputs();
    if outputs.is_empty() {
        tracing::warn!(task_id = %snapshot.id, "Task completed with no output files");
        return Ok(Vec::new());
    }

    tokio::fs::create_dir_all(output_dir).await?;

    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());

    let mut saved = Vec::new();
    for (name, link) in &outputs {
        let dest = output_dir.join(output_file_name(&stem, name, link));
        match client.download(link, &dest).await {
            Ok(()) => {
                tracing::info!(file = %dest.display(), "Saved output");
                saved.push(dest);
            }
            Err(e) => {
                // One bad link doesn't void the others; zero saved files is
                // the caller's failure signal.
                tracing::warn!(output = %name, error = %e, "Download failed");
            }
        }
    }
    Ok(saved)
}

/// Build `{inputStem}_{outputName}.{ext}`, deriving the extension from the
/// link path with any query string stripped.
fn output_file_name(input_stem: &str, output_name: &str, link: &str) -> String {
    let path_part = link.split('?').next().unwrap_or(link);
    let extension = Path::new(path_part)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or(DEFAULT_OUTPUT_EXTENSION);
    format!("{input_stem}_{output_name}.{extension}")
}

fn transition(input: &Path, state: WorkflowState) {
    tracing::debug!(file = %input.display(), ?state, "Workflow state");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_name_strips_query_string() {
        assert_eq!(
            output_file_name("song", "vocals", "https://cdn.example/foo.wav?token=x"),
            "song_vocals.wav"
        );
    }

    #[test]
    fn test_output_name_keeps_link_extension() {
        assert_eq!(
            output_file_name("track", "drums", "https://cdn.example/out/drums.mp3"),
            "track_drums.mp3"
        );
    }

    #[test]
    fn test_output_name_falls_back_to_wav() {
        assert_eq!(
            output_file_name("song", "vocals", "https://cdn.example/outputs/12345"),
            "song_vocals.wav"
        );
    }

    #[test]
    fn test_outcome_status_mapping() {
        let success = SeparationOutcome::Succeeded { saved: vec![] };
        let failed = SeparationOutcome::Failed {
            error: Error::NoOutput,
        };
        assert!(success.is_success());
        assert_eq!(success.status(), FileStatus::Success);
        assert_eq!(failed.status(), FileStatus::Failed);
        assert_eq!(SeparationOutcome::Cancelled.status(), FileStatus::Cancelled);
        assert!(failed.failure_message().unwrap().contains("no output"));
    }
}
