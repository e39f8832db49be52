//! Integration tests for the takc binary
//!
//! The inference service points at a closed local port, so every
//! compression exhausts its retries and lands on the local fallback.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const REPORT: &str = "Revenue reached $2.5B in fiscal 2024, up 12% from the prior year. \
Operating margin improved to 18% as cloud costs fell. \
Headcount grew by five percent across every regional office. \
The board approved a $500M buyback program for next year. \
Management expects revenue growth to slow as enterprise deals lengthen. \
Currency swings remain the largest risk to reported earnings.";

struct Env {
    dir: TempDir,
}

impl Env {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("takc").unwrap();
        cmd.env("TAKC_CONFIG", self.dir.path().join("absent.yml"))
            .env("TAKC_STORE", self.dir.path().join("store.sqlite"))
            .env("TAKC_LLM_URL", "http://127.0.0.1:9")
            .env("TAKC_RETRY_BASE_MS", "1")
            .env_remove("RUST_LOG");
        cmd
    }

    fn write_report(&self) -> std::path::PathBuf {
        let path = self.dir.path().join("report.txt");
        fs::write(&path, REPORT).unwrap();
        path
    }

    fn compress(&self, rates: &str) {
        self.cmd()
            .arg("compress")
            .arg("finance")
            .arg(self.write_report())
            .arg("--rates")
            .arg(rates)
            .assert()
            .success();
    }
}

#[test]
fn test_compress_falls_back_when_service_unreachable() {
    let env = Env::new();

    env.cmd()
        .arg("compress")
        .arg("finance")
        .arg(env.write_report())
        .assert()
        .success()
        .stdout(predicate::str::contains("Compressed finance"))
        .stdout(predicate::str::contains("fallback"))
        .stdout(predicate::str::contains("ultra"))
        .stdout(predicate::str::contains("light"));
}

#[test]
fn test_compress_reads_stdin() {
    let env = Env::new();

    env.cmd()
        .arg("--format")
        .arg("json")
        .arg("compress")
        .arg("finance")
        .arg("--rates")
        .arg("high")
        .write_stdin(REPORT)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"high\""))
        .stdout(predicate::str::contains("\"source\": \"fallback\""));
}

#[test]
fn test_get_shows_cached_entry() {
    let env = Env::new();
    env.compress("light");

    env.cmd()
        .arg("get")
        .arg("finance")
        .arg("light")
        .arg("--metadata")
        .assert()
        .success()
        .stdout(predicate::str::contains("Rate:         light (8x target)"))
        .stdout(predicate::str::contains("fallback"));
}

#[test]
fn test_get_json() {
    let env = Env::new();
    env.compress("medium");

    let output = env
        .cmd()
        .arg("--format")
        .arg("json")
        .arg("get")
        .arg("finance")
        .arg("MEDIUM")
        .output()
        .unwrap();
    assert!(output.status.success());

    let entry: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(entry["task_type"], "finance");
    assert_eq!(entry["rate"], "medium");
    assert_eq!(entry["metadata"]["target_ratio"], 16);
    assert_eq!(entry["metadata"]["source"], "fallback");
}

#[test]
fn test_ls_lists_rates() {
    let env = Env::new();
    env.compress("ultra,high");

    env.cmd()
        .arg("ls")
        .assert()
        .success()
        .stdout(predicate::str::contains("finance: high ultra"));
}

#[test]
fn test_ls_empty_store() {
    let env = Env::new();

    env.cmd()
        .arg("ls")
        .assert()
        .success()
        .stdout(predicate::str::contains("No cached entries"));
}

#[test]
fn test_query_miss_exits_2() {
    let env = Env::new();

    env.cmd()
        .arg("query")
        .arg("legal")
        .arg("What is the liability cap?")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("No compressed cache"))
        .stderr(predicate::str::contains("legal"));
}

#[test]
fn test_query_with_unreachable_service_fails() {
    let env = Env::new();
    env.compress("high");

    env.cmd()
        .arg("query")
        .arg("finance")
        .arg("What is the revenue?")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("inference"));
}

#[test]
fn test_invalid_rate_exits_3() {
    let env = Env::new();

    env.cmd()
        .arg("get")
        .arg("finance")
        .arg("extreme")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Unknown compression rate"));
}

#[test]
fn test_invalid_task_type_exits_3() {
    let env = Env::new();

    env.cmd()
        .arg("get")
        .arg("../finance")
        .arg("high")
        .assert()
        .code(3);
}

#[test]
fn test_empty_input_rejected() {
    let env = Env::new();

    env.cmd()
        .arg("compress")
        .arg("finance")
        .write_stdin("   \n ")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Nothing to compress"));
}

#[test]
fn test_models_lists_catalogue() {
    let env = Env::new();

    env.cmd()
        .arg("models")
        .assert()
        .success()
        .stdout(predicate::str::contains("llama-3.1-8b"))
        .stdout(predicate::str::contains("http://127.0.0.1:9"));
}

#[test]
fn test_models_check_reports_unreachable() {
    let env = Env::new();

    env.cmd()
        .arg("models")
        .arg("--check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not reachable"));
}

#[test]
fn test_models_check_json_reports_metrics() {
    let env = Env::new();

    let output = env
        .cmd()
        .arg("--format")
        .arg("json")
        .arg("models")
        .arg("--check")
        .output()
        .unwrap();
    assert!(!output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["reachable"], false);
    assert_eq!(report["metrics"]["total_requests"], 1);
    assert_eq!(report["metrics"]["total_errors"], 1);
}

#[test]
fn test_rust_log_overrides_default_level() {
    let env = Env::new();

    env.cmd()
        .env("RUST_LOG", "info")
        .arg("compress")
        .arg("finance")
        .arg(env.write_report())
        .arg("--rates")
        .arg("high")
        .assert()
        .success()
        .stderr(predicate::str::contains("Compressing finance"));
}

#[test]
fn test_default_level_hides_info_logs() {
    let env = Env::new();

    env.cmd()
        .arg("compress")
        .arg("finance")
        .arg(env.write_report())
        .arg("--rates")
        .arg("high")
        .assert()
        .success()
        .stderr(predicate::str::contains("Compressing finance").not());
}
