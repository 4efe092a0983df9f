//! End-to-end tests driving the `mt` binary against a temporary database.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn mt_binary() -> String {
    env!("CARGO_BIN_EXE_mt").to_string()
}

/// A temp home with a config file pointing at a fresh database.
struct Sandbox {
    temp: TempDir,
    config: PathBuf,
}

impl Sandbox {
    fn new() -> Self {
        Self::with_config("")
    }

    fn with_config(extra: &str) -> Self {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join("data").join("mt.db");
        let config = temp.path().join("config.toml");
        std::fs::write(
            &config,
            format!("database_path = {:?}\n{extra}", db_path.display().to_string()),
        )
        .unwrap();
        Self { temp, config }
    }

    fn home(&self) -> &Path {
        self.temp.path()
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(mt_binary())
            .env("HOME", self.home())
            .env("XDG_CONFIG_HOME", self.home().join(".config"))
            .env_remove("MT_DATABASE_PATH")
            .env_remove("MT_READ_ONLY")
            .env_remove("RUST_LOG")
            .arg("--config")
            .arg(&self.config)
            .args(args)
            .output()
            .expect("failed to run mt")
    }

    fn ok(&self, args: &[&str]) -> String {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "mt {args:?} should succeed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8(output.stdout).unwrap()
    }

    fn json(&self, args: &[&str]) -> serde_json::Value {
        let mut all = vec!["--json"];
        all.extend_from_slice(args);
        serde_json::from_str(&self.ok(&all)).unwrap()
    }
}

#[test]
fn test_start_stop_resume_flow() {
    let sandbox = Sandbox::new();

    sandbox.ok(&[
        "--at",
        "2025-01-06T09:00:00Z",
        "start",
        "A",
        "--category",
        "work",
        "--create-category",
    ]);
    sandbox.ok(&["--at", "2025-01-06T10:00:00Z", "start", "B"]);

    let active = sandbox.json(&["--at", "2025-01-06T10:30:00Z", "active"]);
    assert_eq!(active["name"], "B");
    assert_eq!(active["state"], "running");
    assert_eq!(active["duration_seconds"], 1800);

    let stopped = sandbox.json(&["--at", "2025-01-06T11:00:00Z", "stop"]);
    assert_eq!(stopped["stopped"]["name"], "B");
    assert_eq!(stopped["resumed"]["name"], "A");

    let a = sandbox.json(&["--at", "2025-01-06T12:00:00Z", "show", "1"]);
    assert_eq!(a["records"].as_array().unwrap().len(), 2);
    // 09:00-10:00 plus 11:00-12:00
    assert_eq!(a["duration_seconds"], 7200);

    let text = sandbox.ok(&["--at", "2025-01-06T12:00:00Z", "list", "--category", "work"]);
    assert!(text.contains("running"), "unexpected list output: {text}");
    assert!(text.contains("A [work]"), "unexpected list output: {text}");
}

#[test]
fn test_negative_ids_and_shift() {
    let sandbox = Sandbox::new();
    sandbox.ok(&["--at", "2025-01-06T09:00:00Z", "start", "first"]);
    sandbox.ok(&["--at", "2025-01-06T10:00:00Z", "start", "second"]);
    sandbox.ok(&["--at", "2025-01-06T10:30:00Z", "--shift", "-15m", "pause"]);

    let latest = sandbox.json(&["show", "-1"]);
    assert_eq!(latest["name"], "second");
    assert_eq!(latest["state"], "paused");
    assert_eq!(latest["records"][0]["end"], "2025-01-06T10:15:00Z");

    let older = sandbox.json(&["show", "-2"]);
    assert_eq!(older["name"], "first");

    let output = sandbox.run(&["show", "-3"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("log not found"));
}

#[test]
fn test_pause_twice_fails() {
    let sandbox = Sandbox::new();
    sandbox.ok(&["--at", "2025-01-06T09:00:00Z", "start", "A"]);
    sandbox.ok(&["--at", "2025-01-06T09:30:00Z", "pause"]);

    let output = sandbox.run(&["--at", "2025-01-06T09:45:00Z", "pause", "1"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("already paused"));
}

#[test]
fn test_split_and_merge_restore_coverage() {
    let sandbox = Sandbox::new();
    sandbox.ok(&["--at", "2025-01-06T09:00:00Z", "start", "long"]);
    sandbox.ok(&["--at", "2025-01-06T12:00:00Z", "stop"]);

    let split = sandbox.json(&["--at", "2025-01-06T10:00:00Z", "split", "1"]);
    assert_eq!(split["original"]["duration_seconds"], 3600);
    assert_eq!(split["sibling"]["duration_seconds"], 7200);
    let sibling = split["sibling"]["id"].as_i64().unwrap().to_string();

    let merged = sandbox.json(&["merge", "1", &sibling]);
    assert_eq!(merged["duration_seconds"], 3 * 3600);

    let logs = sandbox.json(&["list"]);
    assert_eq!(logs.as_array().unwrap().len(), 1);
}

#[test]
fn test_tasks_and_edit() {
    let sandbox = Sandbox::new();
    sandbox.ok(&["task", "add", "review", "--description", "code review"]);
    sandbox.ok(&["--at", "2025-01-06T09:00:00Z", "start", "draft"]);
    sandbox.ok(&["edit", "--task", "review", "--flag", "billable", "--name", "PR 12"]);

    let log = sandbox.json(&["show", "1"]);
    assert_eq!(log["name"], "PR 12");
    assert_eq!(log["task_id"], 1);
    assert_eq!(log["flags"][0], "billable");

    let tasks = sandbox.ok(&["task", "list"]);
    assert_eq!(tasks, "1: review - code review\n");

    let output = sandbox.run(&["edit", "--category", "nowhere"]);
    assert!(!output.status.success());
}

#[test]
fn test_read_only_config_rejects_mutations() {
    let sandbox = Sandbox::with_config("read_only = true\n");
    let output = sandbox.run(&["start", "A"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("read only mode"));

    // Reads still work.
    assert_eq!(sandbox.ok(&["active"]), "No active log.\n");
}

#[test]
fn test_no_subcommand_prints_help() {
    let sandbox = Sandbox::new();
    let output = sandbox.ok(&[]);
    assert!(output.contains("Usage"));
}
