use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{TempDir, tempdir};

/// Temp dir holding an empty config file, so the user's config is never read.
fn workspace() -> Result<(TempDir, PathBuf)> {
    let dir = tempdir()?;
    let config = dir.path().join("config.toml");
    fs::write(&config, "")?;
    Ok((dir, config))
}

fn write_listing(root: &Path) -> Result<PathBuf> {
    let path = root.join("operations.json");
    let listing = json!({
        "operations": [
            {
                "name": "projects/demo/operations/A",
                "metadata": {
                    "state": "SUCCEEDED",
                    "type": "EXPORT_IMAGE",
                    "description": "finished export",
                    "createTime": "2024-01-01T00:00:00Z",
                    "updateTime": "2024-01-01T00:20:00Z"
                }
            },
            {
                "name": "projects/demo/operations/B",
                "metadata": {
                    "state": "RUNNING",
                    "type": "INGEST_IMAGE",
                    "description": "running ingest",
                    "createTime": "2024-01-01T01:00:00Z",
                    "updateTime": "2024-01-01T01:05:00Z"
                }
            }
        ]
    });
    fs::write(&path, listing.to_string())?;
    Ok(path)
}

fn taskwatch(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("taskwatch").unwrap();
    cmd.arg("--config")
        .arg(config)
        .env_remove("TASKWATCH_CONFIG")
        .env_remove("PUSHBULLET_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_schema_command() {
    Command::cargo_bin("taskwatch")
        .unwrap()
        .arg("schema")
        .assert()
        .success()
        .stdout(predicate::str::contains("$schema"))
        .stdout(predicate::str::contains("createTime"));
}

#[test]
fn test_tasks_table() -> Result<()> {
    let (dir, config) = workspace()?;
    let listing = write_listing(dir.path())?;

    let output = taskwatch(&config)
        .arg("tasks")
        .arg("--source-file")
        .arg(&listing)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let table = String::from_utf8(output)?;

    let running = table.find("running ingest").unwrap();
    let finished = table.find("finished export").unwrap();
    assert!(running < finished, "active tasks are listed first:\n{table}");
    Ok(())
}

#[test]
fn test_tasks_json() -> Result<()> {
    let (dir, config) = workspace()?;
    let listing = write_listing(dir.path())?;

    let output = taskwatch(&config)
        .args(["tasks", "--json", "-m", "1", "--source-file"])
        .arg(&listing)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let tasks: serde_json::Value = serde_json::from_slice(&output)?;
    let tasks = tasks.as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["name"], "projects/demo/operations/B");
    assert_eq!(tasks[0]["metadata"]["state"], "RUNNING");
    Ok(())
}

#[test]
fn test_source_from_config_file() -> Result<()> {
    let (dir, config) = workspace()?;
    let listing = write_listing(dir.path())?;
    fs::write(
        &config,
        format!("[source]\nfile = {:?}\n", listing.to_string_lossy()),
    )?;

    taskwatch(&config)
        .arg("tasks")
        .assert()
        .success()
        .stdout(predicate::str::contains("finished export"));
    Ok(())
}

#[test]
fn test_unknown_notifier_suggests_match() -> Result<()> {
    let (dir, config) = workspace()?;
    let listing = write_listing(dir.path())?;

    taskwatch(&config)
        .args(["start", "-n", "pushbulet", "--source-file"])
        .arg(&listing)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("did you mean 'pushbullet'"));
    Ok(())
}

#[test]
fn test_unknown_event_is_config_error() -> Result<()> {
    let (dir, config) = workspace()?;
    let listing = write_listing(dir.path())?;

    taskwatch(&config)
        .args(["start", "finised", "--source-file"])
        .arg(&listing)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown event 'finised'"));
    Ok(())
}

#[test]
fn test_missing_source_is_config_error() -> Result<()> {
    let (_dir, config) = workspace()?;
    taskwatch(&config)
        .arg("tasks")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no operation source"));
    Ok(())
}

#[test]
fn test_invalid_config_file() -> Result<()> {
    let (_dir, config) = workspace()?;
    fs::write(&config, "interval_mins = \"soon\"\n")?;
    taskwatch(&config).arg("tasks").assert().code(2);
    Ok(())
}

#[test]
fn test_pushbullet_without_key() -> Result<()> {
    let (_dir, config) = workspace()?;
    taskwatch(&config)
        .args(["test", "-n", "pushbullet"])
        .assert()
        .code(2);
    Ok(())
}

#[test]
fn test_log_notifier() -> Result<()> {
    let (_dir, config) = workspace()?;
    taskwatch(&config)
        .args(["test", "-n", "log"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Notification Test"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_failing_source_stops_watcher() -> Result<()> {
    let (_dir, config) = workspace()?;
    taskwatch(&config)
        .args(["start", "-n", "log", "--source-cmd", "exit 3"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error:"));
    Ok(())
}
