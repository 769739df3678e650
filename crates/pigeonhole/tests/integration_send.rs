//! Integration tests for the send, ensure, and purge commands

use assert_cmd::cargo;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Command with an isolated home and an explicit working root.
///
/// `PIGEONHOLE_HOME` keeps the real ~/.config/pigeonhole out of the way.
fn pigeon(home: &TempDir, root: &Path) -> assert_cmd::Command {
    let mut cmd = cargo::cargo_bin_cmd!("pigeon");
    cmd.env("PIGEONHOLE_HOME", home.path())
        .env_remove("PIGEONHOLE_ROOT")
        .env_remove("PIGEONHOLE_CONCURRENCY")
        .env("PIGEONHOLE_MACHINE", "host-a")
        .env("PIGEONHOLE_LOG", "error")
        .arg("--root")
        .arg(root);
    cmd
}

#[test]
fn test_send_writes_message_file() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("medium");
    fs::create_dir_all(&root).unwrap();

    pigeon(&temp_dir, &root)
        .args([
            "send",
            "orders@host-b",
            "--id",
            "abc123",
            "--reply-to",
            "replies@host-a",
            "--header",
            "k=v",
            "--body",
            "hello",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("abc123.msg"));

    let path = root.join("host-b/orders/abc123.msg");
    let content = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 7);
    assert_eq!(lines[0], "abc123");
    assert_eq!(lines[1], "");
    assert_eq!(lines[2], "replies@host-a");
    assert_eq!(lines[3], "True");
    assert_eq!(lines[5], r#"{"k":"v"}"#);
    assert_eq!(lines[6], "aGVsbG8=");
}

#[test]
fn test_send_json_output() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("medium");
    fs::create_dir_all(&root).unwrap();

    let output = pigeon(&temp_dir, &root)
        .args(["send", "orders", "--id", "m1", "--json", "--not-recoverable"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["id"], "m1");
    assert_eq!(report["address"], "orders");
    assert_eq!(report["delivered"], true);

    let content = fs::read_to_string(root.join("host-a/orders/m1.msg")).unwrap();
    assert_eq!(content.lines().nth(3), Some("False"));
}

#[test]
fn test_send_without_medium_is_dropped() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("not-inserted");

    pigeon(&temp_dir, &root)
        .args(["send", "orders", "--id", "lost"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dropped"));

    assert!(!root.exists());
}

#[test]
fn test_send_rejects_bad_address() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("medium");
    fs::create_dir_all(&root).unwrap();

    pigeon(&temp_dir, &root)
        .args(["send", "../escape@host-b"])
        .assert()
        .failure();
}

#[test]
fn test_send_failure_exits_nonzero() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("medium");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("host-b"), b"in the way").unwrap();

    pigeon(&temp_dir, &root)
        .args(["send", "orders@host-b", "--id", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_ensure_then_purge() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("medium");
    fs::create_dir_all(&root).unwrap();

    pigeon(&temp_dir, &root)
        .args(["ensure", "audit@host-c"])
        .assert()
        .success()
        .stdout(predicate::str::contains("audit"));
    assert!(root.join("host-c/audit").is_dir());

    for id in ["a", "b"] {
        pigeon(&temp_dir, &root)
            .args(["send", "audit@host-c", "--id", id])
            .assert()
            .success();
    }

    pigeon(&temp_dir, &root)
        .args(["purge", "audit@host-c"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Purged 2 file(s)"));
    assert_eq!(fs::read_dir(root.join("host-c/audit")).unwrap().count(), 0);
}

#[test]
fn test_ensure_without_medium_fails() {
    let temp_dir = TempDir::new().unwrap();

    pigeon(&temp_dir, &temp_dir.path().join("not-inserted"))
        .args(["ensure", "orders"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unavailable"));
}
