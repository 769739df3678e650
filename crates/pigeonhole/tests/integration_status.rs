//! Integration tests for the status and root commands

use assert_cmd::cargo;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn pigeon(home: &TempDir) -> assert_cmd::Command {
    let mut cmd = cargo::cargo_bin_cmd!("pigeon");
    cmd.env("PIGEONHOLE_HOME", home.path())
        .env_remove("PIGEONHOLE_ROOT")
        .env_remove("PIGEONHOLE_CONCURRENCY")
        .env("PIGEONHOLE_MACHINE", "host-a")
        .env("PIGEONHOLE_LOG", "error");
    cmd
}

#[test]
fn test_root_reports_explicit_root() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("medium");
    fs::create_dir_all(&root).unwrap();

    pigeon(&temp_dir)
        .arg("root")
        .arg("--root")
        .arg(&root)
        .assert()
        .success()
        .stdout(predicate::str::contains("medium"));
}

#[test]
fn test_root_unavailable() {
    let temp_dir = TempDir::new().unwrap();

    pigeon(&temp_dir)
        .arg("--root")
        .arg(temp_dir.path().join("missing"))
        .arg("root")
        .assert()
        .success()
        .stdout(predicate::str::diff("unavailable\n"));
}

#[test]
fn test_root_found_by_marker_from_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let volume = temp_dir.path().join("stick");
    fs::create_dir_all(volume.join("courier")).unwrap();
    let config = temp_dir.path().join("pigeon.toml");
    fs::write(
        &config,
        format!(
            "[root]\nmarker = \"courier\"\nvolumes = [{:?}]\nmount_parents = []\n",
            volume.to_str().unwrap()
        ),
    )
    .unwrap();

    pigeon(&temp_dir)
        .arg("--config")
        .arg(&config)
        .arg("root")
        .assert()
        .success()
        .stdout(predicate::str::contains("courier"));
}

#[test]
fn test_status_lists_pending_machines() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("medium");
    fs::create_dir_all(&root).unwrap();

    for (address, id) in [
        ("orders@host-b", "1"),
        ("orders@host-b", "2"),
        ("audit@host-c", "3"),
        ("orders", "local"),
    ] {
        pigeon(&temp_dir)
            .arg("--root")
            .arg(&root)
            .args(["send", address, "--id", id])
            .assert()
            .success();
    }

    let output = pigeon(&temp_dir)
        .arg("--root")
        .arg(&root)
        .args(["status", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["machine"], "host-a");
    let outgoing = report["outgoing"].as_array().unwrap();
    assert_eq!(outgoing.len(), 2);
    assert_eq!(outgoing[0]["machine"], "host-b");
    assert_eq!(outgoing[0]["pending"], 2);
    assert_eq!(outgoing[1]["machine"], "host-c");

    pigeon(&temp_dir)
        .arg("--root")
        .arg(&root)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("3 message(s) awaiting delivery"));
}

#[test]
fn test_status_without_medium() {
    let temp_dir = TempDir::new().unwrap();

    pigeon(&temp_dir)
        .arg("--root")
        .arg(temp_dir.path().join("missing"))
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Working root: unavailable"));
}
