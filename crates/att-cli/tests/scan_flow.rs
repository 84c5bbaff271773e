//! End-to-end integration tests for the scan flow.
//!
//! Drives the `att` binary through a complete session: register entities,
//! scan in, bounce the badge, scan out, report. The database path is
//! pinned to a temp directory through the `ATT_DATABASE_PATH` environment
//! override.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn att_binary() -> String {
    env!("CARGO_BIN_EXE_att").to_string()
}

fn att(db_path: &Path, args: &[&str]) -> Output {
    Command::new(att_binary())
        .env("ATT_DATABASE_PATH", db_path)
        .args(args)
        .output()
        .expect("failed to run att")
}

fn att_ok(db_path: &Path, args: &[&str]) -> String {
    let output = att(db_path, args);
    assert!(
        output.status.success(),
        "att {args:?} should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).expect("utf-8 output")
}

fn seed(db_path: &Path) {
    att_ok(db_path, &["identity", "add", "--id", "stu-1", "--name", "Ada"]);
    att_ok(db_path, &["room", "add", "--id", "room-1", "--name", "Lab A"]);
    att_ok(
        db_path,
        &[
            "session",
            "add",
            "--id",
            "sess-1",
            "--room",
            "room-1",
            "--starts",
            "2025-03-10T08:00:00",
            "--ends",
            "2025-03-10T09:00:00",
        ],
    );
}

fn scan_json(db_path: &Path, at: &str) -> serde_json::Value {
    let stdout = att_ok(
        db_path,
        &[
            "scan",
            "--identity",
            "stu-1",
            "--session",
            "sess-1",
            "--at",
            at,
            "--json",
        ],
    );
    serde_json::from_str(&stdout).expect("json decision")
}

#[test]
fn full_session_flow() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("att.db");
    seed(&db_path);

    // Arrive ten minutes early, inside grace-in: accepted and on time.
    let decision = scan_json(&db_path, "2025-03-10T07:50:00");
    assert_eq!(decision["status"], "accepted");
    assert_eq!(decision["action"], "time_in");
    assert_eq!(decision["is_late"], false);
    assert_eq!(decision["via_grace"], true);

    // Badge bounce three seconds later: suppressed, no state change.
    let decision = scan_json(&db_path, "2025-03-10T07:50:03");
    assert_eq!(decision["status"], "rejected");
    assert_eq!(decision["reason"], "duplicate_scan");

    // Leave during grace-out: time-out with the exact duration.
    let decision = scan_json(&db_path, "2025-03-10T09:10:00");
    assert_eq!(decision["status"], "accepted");
    assert_eq!(decision["action"], "time_out");
    assert_eq!(decision["duration_minutes"], 80);

    // The report shows one closed record.
    let stdout = att_ok(&db_path, &["report", "--session", "sess-1", "--json"]);
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let entries = report.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["identity_id"], "stu-1");
    assert_eq!(entries[0]["is_late"], false);
    assert_eq!(entries[0]["duration_minutes"], 80);
    assert_eq!(entries[0]["closed_reason"], "normal");
}

#[test]
fn too_early_scan_reports_wait() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("att.db");
    seed(&db_path);

    let decision = scan_json(&db_path, "2025-03-10T07:30:00");
    assert_eq!(decision["status"], "rejected");
    assert_eq!(decision["reason"], "too_early");
    assert_eq!(decision["wait_seconds"], 900);
}

#[test]
fn scan_after_close_is_rejected() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("att.db");
    seed(&db_path);

    let decision = scan_json(&db_path, "2025-03-10T10:00:00");
    assert_eq!(decision["status"], "rejected");
    assert_eq!(decision["reason"], "closed");
}

#[test]
fn active_lists_open_record_until_time_out() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("att.db");
    seed(&db_path);

    scan_json(&db_path, "2025-03-10T08:05:00");
    let stdout = att_ok(&db_path, &["active"]);
    assert!(stdout.contains("stu-1 in room-1"));

    scan_json(&db_path, "2025-03-10T08:55:00");
    let stdout = att_ok(&db_path, &["active"]);
    assert_eq!(stdout, "No active records.\n");
}
