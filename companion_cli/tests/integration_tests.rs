//! Integration tests for the companion binary.
//!
//! These tests verify end-to-end behavior including:
//! - Guided exercise runs and their summary records
//! - Heart rate estimation from traces and synthetic pulses
//! - Fall screening and stress sampling
//! - Record history

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Helper to create a test data directory
fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Helper to get the CLI, isolated from any user config file
fn cli(temp_dir: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("companion"));
    cmd.env("XDG_CONFIG_HOME", temp_dir.path().join("config"))
        .env("HOME", temp_dir.path())
        .arg("--data-dir")
        .arg(temp_dir.path().join("data"));
    cmd
}

fn records(temp_dir: &TempDir) -> Vec<serde_json::Value> {
    let path = temp_dir.path().join("data/records.jsonl");
    let contents = fs::read_to_string(path).expect("Failed to read records");
    contents
        .lines()
        .map(|line| serde_json::from_str(line).expect("Record is not JSON"))
        .collect()
}

fn write_trace(path: &Path, header: &str, rows: impl IntoIterator<Item = String>) {
    let mut contents = format!("{}\n", header);
    for row in rows {
        contents.push_str(&row);
        contents.push('\n');
    }
    fs::write(path, contents).expect("Failed to write trace");
}

#[test]
fn test_cli_help() {
    let temp_dir = setup_test_dir();
    cli(&temp_dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Guided breathing exercises and camera heart rate checks",
        ));
}

#[test]
fn test_list_shows_catalog() {
    let temp_dir = setup_test_dir();
    cli(&temp_dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("box-breathing"))
        .stdout(predicate::str::contains("cardiac-recovery"))
        .stdout(predicate::str::contains("grounding-54321"))
        .stdout(predicate::str::contains("progressive-relaxation"));
}

#[test]
fn test_run_box_breathing_logs_summary() {
    let temp_dir = setup_test_dir();

    cli(&temp_dir)
        .args(["run", "box-breathing", "--heart-rate", "88"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Breathe in slowly"))
        .stdout(predicate::str::contains("[round 4/4]"))
        .stdout(predicate::str::contains("16 of 16 steps in 64s"))
        .stdout(predicate::str::contains("Logged to"));

    let records = records(&temp_dir);
    assert_eq!(records.len(), 1);
    let summary = &records[0];
    assert_eq!(summary["kind"], "exercise_summary");
    assert_eq!(summary["exercise_id"], "box-breathing");
    assert_eq!(summary["trigger"], "stress_relief");
    assert_eq!(summary["completed"], true);
    assert_eq!(summary["duration_seconds"], 64);
    assert_eq!(summary["heart_rate_before"], 88);
}

#[test]
fn test_run_dry_run_does_not_log() {
    let temp_dir = setup_test_dir();

    cli(&temp_dir)
        .args(["run", "grounding-54321", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("5 of 5 steps in 51s"))
        .stdout(predicate::str::contains("Dry run"));

    assert!(!temp_dir.path().join("data/records.jsonl").exists());
}

#[test]
fn test_run_unknown_exercise_fails() {
    let temp_dir = setup_test_dir();

    cli(&temp_dir)
        .args(["run", "cold-plunge"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown exercise: cold-plunge"));
}

#[test]
fn test_ppg_synthetic_pulse() {
    let temp_dir = setup_test_dir();

    cli(&temp_dir)
        .args(["ppg", "--synthetic-bpm", "72"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Heart rate: 72 BPM"))
        .stdout(predicate::str::contains("Normal sinus rhythm"))
        .stdout(predicate::str::contains("Confidence: 75%"));

    let records = records(&temp_dir);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["kind"], "heart_reading");
    assert_eq!(records[0]["bpm"], 72);
    assert_eq!(records[0]["rhythm"], "normal");
    assert_eq!(records[0]["duration_seconds"], 5);
}

#[test]
fn test_ppg_fast_trace_recommends_recovery() {
    let temp_dir = setup_test_dir();
    let trace = temp_dir.path().join("fast.csv");
    // One beat every 15 frames at 30 fps
    write_trace(
        &trace,
        "red",
        (0..150).map(|i| if i % 15 == 10 { "170".to_string() } else { "150".to_string() }),
    );

    cli(&temp_dir)
        .arg("ppg")
        .arg("--trace")
        .arg(&trace)
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Heart rate: 120 BPM"))
        .stdout(predicate::str::contains("Tachycardia"))
        .stdout(predicate::str::contains("cardiac-recovery"))
        .stdout(predicate::str::contains("Dry run"));

    assert!(!temp_dir.path().join("data/records.jsonl").exists());
}

#[test]
fn test_ppg_flat_trace_is_inconclusive() {
    let temp_dir = setup_test_dir();
    let trace = temp_dir.path().join("flat.csv");
    write_trace(&trace, "red", (0..150).map(|_| "150".to_string()));

    cli(&temp_dir)
        .arg("ppg")
        .arg("--trace")
        .arg(&trace)
        .assert()
        .success()
        .stdout(predicate::str::contains("No heartbeat found"));

    assert!(!temp_dir.path().join("data/records.jsonl").exists());
}

#[test]
fn test_ppg_unavailable_camera_fails() {
    let temp_dir = setup_test_dir();

    cli(&temp_dir)
        .args(["ppg", "--unavailable"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("camera permission denied"));

    assert!(!temp_dir.path().join("data/records.jsonl").exists());
}

#[test]
fn test_ppg_source_flags_conflict() {
    let temp_dir = setup_test_dir();

    cli(&temp_dir)
        .args(["ppg", "--synthetic-bpm", "72", "--unavailable"])
        .assert()
        .failure();
}

#[test]
fn test_fall_trace_logs_events() {
    let temp_dir = setup_test_dir();
    let trace = temp_dir.path().join("motion.csv");
    write_trace(
        &trace,
        "x,y,z",
        [
            "0,0,9.8".to_string(),
            "20,10,15".to_string(),
            "0.1,9.7,0.3".to_string(),
            "0.5,0.5,0.5".to_string(),
        ],
    );

    cli(&temp_dir)
        .arg("fall")
        .arg("--trace")
        .arg(&trace)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 possible fall(s) detected"))
        .stdout(predicate::str::contains("Impact"))
        .stdout(predicate::str::contains("FreeFall"));

    let records = records(&temp_dir);
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r["kind"] == "fall_event"));
    assert_eq!(records[0]["signal"], "impact");
    assert_eq!(records[1]["signal"], "free_fall");
}

#[test]
fn test_fall_quiet_trace() {
    let temp_dir = setup_test_dir();
    let trace = temp_dir.path().join("motion.csv");
    write_trace(&trace, "x,y,z", (0..20).map(|_| "0,0,9.8".to_string()));

    cli(&temp_dir)
        .arg("fall")
        .arg("--trace")
        .arg(&trace)
        .assert()
        .success()
        .stdout(predicate::str::contains("No falls detected"));

    assert!(!temp_dir.path().join("data/records.jsonl").exists());
}

#[test]
fn test_stress_reading_logged() {
    let temp_dir = setup_test_dir();

    cli(&temp_dir)
        .args(["stress", "--samples", "5", "--seed", "7", "--heart-rate", "70"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Stress level:"));

    let records = records(&temp_dir);
    assert_eq!(records.len(), 1);
    let reading = &records[0];
    assert_eq!(reading["kind"], "stress_reading");
    assert_eq!(reading["heart_rate_at_reading"], 70);
    let level = reading["level"].as_f64().unwrap();
    // Five steps of at most 5 from the default 25
    assert!((0.0..=50.0).contains(&level));
}

fn write_config(temp_dir: &TempDir, contents: &str) {
    let dir = temp_dir.path().join("config/companion");
    fs::create_dir_all(&dir).expect("Failed to create config dir");
    fs::write(dir.join("config.toml"), contents).expect("Failed to write config");
}

#[test]
fn test_stress_realtime_uses_configured_interval() {
    let temp_dir = setup_test_dir();
    write_config(&temp_dir, "[stress]\ninterval_secs = 1\nmax_step = 0.0\n");

    let started = std::time::Instant::now();
    cli(&temp_dir)
        .args(["stress", "--realtime", "--samples", "2", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Stress level: 25 (Low)"));

    assert!(started.elapsed() >= std::time::Duration::from_secs(2));
    assert!(!temp_dir.path().join("data/records.jsonl").exists());
}

#[test]
fn test_invalid_stress_config_rejected() {
    let temp_dir = setup_test_dir();
    write_config(&temp_dir, "[stress]\nmax_step = inf\n");

    cli(&temp_dir)
        .args(["stress", "--samples", "3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("stress.max_step"));
}

#[test]
fn test_history_lists_records_in_order() {
    let temp_dir = setup_test_dir();

    cli(&temp_dir).args(["run", "box-breathing"]).assert().success();
    cli(&temp_dir)
        .args(["ppg", "--synthetic-bpm", "72"])
        .assert()
        .success();

    cli(&temp_dir)
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("exercise  box-breathing (16/16 steps, completed)"))
        .stdout(predicate::str::contains("heart     72 BPM"));

    let output = cli(&temp_dir)
        .args(["history", "--limit", "1"])
        .output()
        .expect("Failed to run history");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("heart"));
    assert!(!stdout.contains("box-breathing"));
}

#[test]
fn test_history_empty() {
    let temp_dir = setup_test_dir();
    cli(&temp_dir)
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("No records yet"));
}
