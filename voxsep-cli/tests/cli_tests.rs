//! CLI surface tests: exit codes, credential remediation, config round trip

use assert_cmd::Command;
use predicates::prelude::*;

fn voxsep() -> Command {
    Command::cargo_bin("voxsep").unwrap()
}

#[test]
fn test_missing_credential_fails_with_remediation() {
    let config_home = tempfile::tempdir().unwrap();

    voxsep()
        .env_remove("AUDIOSHAKE_API_KEY")
        .env("XDG_CONFIG_HOME", config_home.path())
        .args(["separate", "song.mp3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("API key"))
        .stderr(predicate::str::contains("AUDIOSHAKE_API_KEY"));
}

#[test]
fn test_batch_missing_credential_fails_before_any_work() {
    let config_home = tempfile::tempdir().unwrap();
    let music = tempfile::tempdir().unwrap();
    std::fs::write(music.path().join("song.mp3"), b"audio").unwrap();

    voxsep()
        .env_remove("AUDIOSHAKE_API_KEY")
        .env("XDG_CONFIG_HOME", config_home.path())
        .arg("batch")
        .arg(music.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("API key"));
}

#[test]
fn test_separate_missing_input_fails_locally() {
    let config_home = tempfile::tempdir().unwrap();

    voxsep()
        .env("AUDIOSHAKE_API_KEY", "test-key")
        .env("XDG_CONFIG_HOME", config_home.path())
        .args(["separate", "/definitely/not/there.mp3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_batch_without_audio_files_exits_nonzero() {
    let config_home = tempfile::tempdir().unwrap();
    let empty = tempfile::tempdir().unwrap();

    voxsep()
        .env("AUDIOSHAKE_API_KEY", "test-key")
        .env("XDG_CONFIG_HOME", config_home.path())
        .arg("batch")
        .arg(empty.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("No audio files"));
}

#[test]
fn test_config_set_api_key_round_trip() {
    let config_home = tempfile::tempdir().unwrap();

    voxsep()
        .env("XDG_CONFIG_HOME", config_home.path())
        .args(["config", "set-api-key", "abc123"])
        .assert()
        .success();

    voxsep()
        .env("XDG_CONFIG_HOME", config_home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("api_key: set"))
        .stdout(predicate::str::contains("model: vocals"));
}

#[test]
fn test_config_rejects_empty_api_key() {
    let config_home = tempfile::tempdir().unwrap();

    voxsep()
        .env("XDG_CONFIG_HOME", config_home.path())
        .args(["config", "set-api-key", "  "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must not be empty"));
}
