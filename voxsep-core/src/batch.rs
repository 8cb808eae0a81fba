//! Bounded-concurrency batch scheduler
//!
//! Fans the separation workflow out over many files with at most `workers`
//! in flight. Every submitted entry settles into exactly one outcome;
//! a failing entry never aborts the batch, and results come back in
//! submission order even though completion order is arbitrary.

use crate::client::ApiClient;
use crate::error::Error;
use crate::events::{EventBus, SeparatorEvent};
use crate::workflow::{self, SeparationOutcome, WorkflowOptions};
use chrono::Utc;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Batch configuration
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Shared per-file workflow configuration
    pub workflow: WorkflowOptions,
    /// Upper bound on simultaneously active workflows (min 1)
    pub workers: usize,
    /// Optional append-only run log, one `{file}\t{status}` line per entry
    pub log_path: Option<PathBuf>,
}

/// One submitted entry's terminal outcome
#[derive(Debug)]
pub struct FileOutcome {
    pub input: PathBuf,
    pub outcome: SeparationOutcome,
}

/// Run the workflow over `files` with bounded concurrency.
///
/// The returned vector holds exactly one entry per input, in submission
/// order. Setting the cancellation token stops new dispatches immediately;
/// in-flight workflows settle as cancelled at their next suspension point,
/// and already-finished entries keep their outcome.
pub async fn run_batch(
    client: Arc<ApiClient>,
    files: Vec<PathBuf>,
    options: &BatchOptions,
    cancel: &CancellationToken,
    bus: &EventBus,
) -> Vec<FileOutcome> {
    let total = files.len();
    let _ = bus.emit(SeparatorEvent::BatchStarted {
        total,
        timestamp: Utc::now(),
    });

    let workers = options.workers.max(1);
    let semaphore = Arc::new(Semaphore::new(workers));
    let mut join_set: JoinSet<(usize, SeparationOutcome)> = JoinSet::new();

    for (index, input) in files.iter().cloned().enumerate() {
        let client = Arc::clone(&client);
        let semaphore = Arc::clone(&semaphore);
        let cancel = cancel.clone();
        let bus = bus.clone();
        let workflow_options = options.workflow.clone();

        join_set.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return (index, SeparationOutcome::Cancelled),
            };

            // Dispatch gate: queued entries settle without a network call
            if cancel.is_cancelled() {
                return (index, SeparationOutcome::Cancelled);
            }

            let _ = bus.emit(SeparatorEvent::FileStarted {
                index,
                total,
                file: file_label(&input),
                timestamp: Utc::now(),
            });

            let outcome = workflow::separate_file(&client, &input, &workflow_options, &cancel).await;
            (index, outcome)
        });
    }

    let mut slots: Vec<Option<SeparationOutcome>> =
        std::iter::repeat_with(|| None).take(total).collect();
    let mut run_log = RunLog::open(options.log_path.as_deref());

    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((index, outcome)) => {
                let file = file_label(&files[index]);
                run_log.record(&file, &outcome.log_label());
                let _ = bus.emit(SeparatorEvent::FileFinished {
                    index,
                    total,
                    file,
                    status: outcome.status(),
                    message: outcome.failure_message(),
                    timestamp: Utc::now(),
                });
                slots[index] = Some(outcome);
            }
            Err(join_error) => {
                // The entry's slot stays empty here and is filled with a
                // failure outcome below, so the batch result stays complete.
                tracing::error!(error = %join_error, "Batch worker terminated abnormally");
            }
        }
    }

    let outcomes: Vec<FileOutcome> = slots
        .into_iter()
        .zip(files)
        .map(|(slot, input)| {
            let outcome = slot.unwrap_or_else(|| SeparationOutcome::Failed {
                error: Error::Internal("worker terminated abnormally".to_string()),
            });
            FileOutcome { input, outcome }
        })
        .collect();

    let succeeded = outcomes.iter().filter(|o| o.outcome.is_success()).count();
    let cancelled = outcomes
        .iter()
        .filter(|o| matches!(o.outcome, SeparationOutcome::Cancelled))
        .count();
    let failed = total - succeeded - cancelled;

    if cancel.is_cancelled() {
        let _ = bus.emit(SeparatorEvent::BatchCancelled {
            timestamp: Utc::now(),
        });
    }
    let _ = bus.emit(SeparatorEvent::BatchFinished {
        succeeded,
        failed,
        cancelled,
        timestamp: Utc::now(),
    });

    tracing::info!(total, succeeded, failed, cancelled, "Batch settled");
    outcomes
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Append-only per-run result log. Lines are written synchronously as each
/// entry settles, so a killed process keeps everything settled so far.
struct RunLog {
    file: Option<std::fs::File>,
}

impl RunLog {
    fn open(path: Option<&Path>) -> Self {
        let file = path.and_then(|p| {
            match std::fs::OpenOptions::new().create(true).append(true).open(p) {
                Ok(file) => Some(file),
                Err(e) => {
                    tracing::warn!(path = %p.display(), error = %e, "Run log disabled");
                    None
                }
            }
        });
        Self { file }
    }

    fn record(&mut self, file_name: &str, label: &str) {
        if let Some(file) = self.file.as_mut() {
            if let Err(e) = writeln!(file, "{file_name}\t{label}") {
                tracing::warn!(error = %e, "Run log write failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_label_uses_file_name() {
        assert_eq!(file_label(Path::new("/music/song.mp3")), "song.mp3");
    }

    #[test]
    fn test_run_log_appends_tab_separated_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");

        let mut log = RunLog::open(Some(&path));
        log.record("song.mp3", "Success");
        log.record("other.wav", "Failed: Task failed: corrupt input");
        drop(log);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "song.mp3\tSuccess\nother.wav\tFailed: Task failed: corrupt input\n"
        );
    }

    #[test]
    fn test_run_log_absent_path_is_noop() {
        let mut log = RunLog::open(None);
        log.record("song.mp3", "Success");
    }
}
