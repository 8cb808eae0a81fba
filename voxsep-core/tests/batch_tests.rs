//! Batch scheduler tests: outcome completeness, isolation of failures,
//! cancellation, run log, and event emission.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::TryRecvError;
use tokio_util::sync::CancellationToken;
use voxsep_core::batch::{run_batch, BatchOptions};
use voxsep_core::client::ApiClient;
use voxsep_core::config::Credential;
use voxsep_core::events::{EventBus, FileStatus, SeparatorEvent};
use voxsep_core::types::Target;
use voxsep_core::workflow::WorkflowOptions;
use wiremock::matchers::{method, path as url_path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_happy_api(server: &MockServer) {
    Mock::given(method("POST"))
        .and(url_path("/assets"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "a1"})),
        )
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(url_path("/tasks"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": "t1"})),
        )
        .mount(server)
        .await;

    let link = format!("{}/files/stem.wav", server.uri());
    Mock::given(method("GET"))
        .and(url_path("/tasks/t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "t1",
            "targets": [{"status": "completed", "output": [{"name": "vocals", "link": link}]}]
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(url_path("/files/stem.wav"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"stem".to_vec()))
        .mount(server)
        .await;
}

fn test_client(server: &MockServer) -> Arc<ApiClient> {
    Arc::new(ApiClient::with_base_url(server.uri(), Credential::new("test-key")).unwrap())
}

fn batch_options(output_dir: PathBuf, workers: usize) -> BatchOptions {
    let mut workflow = WorkflowOptions::new(output_dir, Target::new("vocals", "wav"));
    workflow.poll_interval = Duration::from_millis(5);
    BatchOptions {
        workflow,
        workers,
        log_path: None,
    }
}

fn write_inputs(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
    names
        .iter()
        .map(|name| {
            let path = dir.join(name);
            std::fs::write(&path, b"fake audio content").unwrap();
            path
        })
        .collect()
}

fn drain_events(rx: &mut tokio::sync::broadcast::Receiver<SeparatorEvent>) -> Vec<SeparatorEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            Err(TryRecvError::Lagged(_)) => continue,
        }
    }
    events
}

#[tokio::test]
async fn test_every_input_settles_exactly_once_for_any_worker_count() {
    let server = MockServer::start().await;
    mount_happy_api(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let files = write_inputs(
        dir.path(),
        &["song0.mp3", "song1.mp3", "song2.mp3", "song3.mp3", "song4.mp3"],
    );

    for workers in [1, 2, 5] {
        let client = test_client(&server);
        let options = batch_options(dir.path().join(format!("out{workers}")), workers);
        let bus = EventBus::new(64);
        let cancel = CancellationToken::new();

        let outcomes = run_batch(client, files.clone(), &options, &cancel, &bus).await;

        // Exactly one outcome per submitted input, in submission order
        assert_eq!(outcomes.len(), files.len());
        for (entry, input) in outcomes.iter().zip(&files) {
            assert_eq!(&entry.input, input);
            assert!(
                entry.outcome.is_success(),
                "{} failed with workers={workers}: {:?}",
                input.display(),
                entry.outcome
            );
        }
    }
}

#[tokio::test]
async fn test_one_bad_entry_does_not_abort_the_batch() {
    let server = MockServer::start().await;
    mount_happy_api(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let files = write_inputs(dir.path(), &["song0.mp3", "notes.txt", "song1.mp3"]);

    let client = test_client(&server);
    let options = batch_options(dir.path().join("out"), 2);
    let bus = EventBus::new(64);
    let cancel = CancellationToken::new();

    let outcomes = run_batch(client, files, &options, &cancel, &bus).await;

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].outcome.is_success());
    assert_eq!(outcomes[1].outcome.status(), FileStatus::Failed);
    assert!(outcomes[1]
        .outcome
        .failure_message()
        .unwrap()
        .contains("skipped"));
    assert!(outcomes[2].outcome.is_success());
}

#[tokio::test]
async fn test_preset_cancellation_dispatches_nothing() {
    let server = MockServer::start().await;
    Mock::given(path_regex("^/.*"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let files = write_inputs(dir.path(), &["song0.mp3", "song1.mp3", "song2.mp3"]);

    let client = test_client(&server);
    let options = batch_options(dir.path().join("out"), 2);
    let bus = EventBus::new(64);
    let mut rx = bus.subscribe();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcomes = run_batch(client, files, &options, &cancel, &bus).await;

    assert_eq!(outcomes.len(), 3);
    for entry in &outcomes {
        assert_eq!(entry.outcome.status(), FileStatus::Cancelled);
    }

    let events = drain_events(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, SeparatorEvent::BatchCancelled { .. })));
    match events.last() {
        Some(SeparatorEvent::BatchFinished {
            succeeded,
            failed,
            cancelled,
            ..
        }) => {
            assert_eq!((*succeeded, *failed, *cancelled), (0, 0, 3));
        }
        other => panic!("expected BatchFinished last, got {other:?}"),
    }
}

#[tokio::test]
async fn test_run_log_gets_one_line_per_entry() {
    let server = MockServer::start().await;
    mount_happy_api(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let files = write_inputs(dir.path(), &["a.mp3", "b.mp3", "c.mp3"]);
    let log_path = dir.path().join("run.log");

    let client = test_client(&server);
    let mut options = batch_options(dir.path().join("out"), 2);
    options.log_path = Some(log_path.clone());
    let bus = EventBus::new(64);
    let cancel = CancellationToken::new();

    run_batch(client, files, &options, &cancel, &bus).await;

    let content = std::fs::read_to_string(&log_path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 3);
    // Completion order is arbitrary; every file settles exactly once
    for name in ["a.mp3", "b.mp3", "c.mp3"] {
        let matching: Vec<_> = lines.iter().filter(|l| **l == format!("{name}\tSuccess")).collect();
        assert_eq!(matching.len(), 1, "missing or duplicated log line for {name}");
    }
}

#[tokio::test]
async fn test_events_report_mixed_results() {
    let server = MockServer::start().await;
    mount_happy_api(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let files = write_inputs(dir.path(), &["good.mp3", "bad.txt"]);

    let client = test_client(&server);
    let options = batch_options(dir.path().join("out"), 2);
    let bus = EventBus::new(64);
    let mut rx = bus.subscribe();
    let cancel = CancellationToken::new();

    run_batch(client, files, &options, &cancel, &bus).await;

    let events = drain_events(&mut rx);
    let finished: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            SeparatorEvent::FileFinished { file, status, .. } => Some((file.clone(), *status)),
            _ => None,
        })
        .collect();
    assert_eq!(finished.len(), 2);
    assert!(finished.contains(&("good.mp3".to_string(), FileStatus::Success)));
    assert!(finished.contains(&("bad.txt".to_string(), FileStatus::Failed)));

    match events.last() {
        Some(SeparatorEvent::BatchFinished {
            succeeded, failed, ..
        }) => assert_eq!((*succeeded, *failed), (1, 1)),
        other => panic!("expected BatchFinished last, got {other:?}"),
    }
}
