//! CLI integration tests for pidiagctl
//!
//! - pidiagctl diagnose LOG --json     category and captions as JSON, exit 0
//! - pidiagctl diagnose MISSING        exit 66
//! - pidiagctl format LOG              header + separator, idempotent
//! - pidiagctl send LOG                blocked without the Pi-Apps header
//! - pidiagctl config set/show         persisted under XDG_CONFIG_HOME
//!
//! Every run gets its own HOME, config and journal so the host is never touched.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn get_binary_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_pidiagctl"))
}

struct Sandbox {
    dir: tempfile::TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("root/etc")).unwrap();
        fs::create_dir_all(dir.path().join("config/pidiag")).unwrap();
        fs::write(
            dir.path().join("config/pidiag/config.toml"),
            format!(
                "[engine]\nbackend = \"apt\"\nenrichment = false\n\n[paths]\nroot = \"{}\"\npi_apps_dir = \"{}\"\n",
                dir.path().join("root").display(),
                dir.path().join("pi-apps").display()
            ),
        )
        .unwrap();
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn journal(&self) -> PathBuf {
        self.path().join("state/ctl.jsonl")
    }

    fn make_log(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(get_binary_path())
            .args(args)
            .env_clear()
            .env("PATH", std::env::var("PATH").unwrap_or_default())
            .env("HOME", self.path())
            .env("XDG_CONFIG_HOME", self.path().join("config"))
            .env("PIDIAG_LOG_FILE", self.journal())
            .output()
            .expect("Failed to run pidiagctl")
    }
}

#[test]
fn test_pidiagctl_no_args_fails_with_usage() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&[]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Usage"));
}

#[test]
fn test_diagnose_json_lock_error() {
    let sandbox = Sandbox::new();
    let log = sandbox.make_log("install.log", "E: Could not get lock /var/lib/dpkg/lock-frontend\n");

    let output = sandbox.run(&["diagnose", log.to_str().unwrap(), "--json"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["category"], "system");
    let captions = json["captions"].as_array().unwrap();
    assert_eq!(captions.len(), 1);
    assert!(captions[0].as_str().unwrap().contains("Could not get lock"));

    let journal = fs::read_to_string(sandbox.journal()).unwrap();
    let entry: serde_json::Value = serde_json::from_str(journal.lines().last().unwrap()).unwrap();
    assert_eq!(entry["command"], "diagnose");
    assert_eq!(entry["category"], "system");
    assert_eq!(entry["ok"], true);
}

#[test]
fn test_diagnose_missing_log_exit_code() {
    let sandbox = Sandbox::new();
    let missing = sandbox.path().join("missing.log");
    let output = sandbox.run(&["diagnose", missing.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(66));
    assert!(String::from_utf8_lossy(&output.stderr).contains("[ERROR]"));
}

#[test]
fn test_format_is_idempotent() {
    let sandbox = Sandbox::new();
    let log = sandbox.make_log("install.log", "\x1b[32mReading package lists...\x1b[0m\n");

    assert!(sandbox.run(&["format", log.to_str().unwrap()]).status.success());
    let once = fs::read_to_string(&log).unwrap();
    assert!(once.starts_with("OS: "));
    assert!(once.contains("\n\nBEGINNING OF LOG FILE:\n-----------------------\n\nReading package lists...\n"));

    assert!(sandbox.run(&["format", log.to_str().unwrap()]).status.success());
    assert_eq!(fs::read_to_string(&log).unwrap(), once);
}

#[test]
fn test_send_blocked_without_pi_apps_header() {
    let sandbox = Sandbox::new();
    let log = sandbox.make_log("install.log", "E: Unable to locate package foo\n");
    let output = sandbox.run(&["send", log.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(67));
    assert!(String::from_utf8_lossy(&output.stdout).contains("missing required header"));
}

#[test]
fn test_config_set_and_show() {
    let sandbox = Sandbox::new();
    assert!(sandbox.run(&["config", "set", "report.enabled=false"]).status.success());

    let output = sandbox.run(&["config", "show"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("enabled = false"), "got: {}", stdout);
    assert!(stdout.contains("backend = \"apt\""));

    let bad = sandbox.run(&["config", "set", "engine.backend=yum"]);
    assert_eq!(bad.status.code(), Some(1));
}
