//! Invocation journal for pidiagctl
//!
//! One JSON line per invocation, XDG state directory with fallback chain.

use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Journal entry for each pidiagctl invocation
#[derive(Debug, Serialize, Deserialize)]
pub struct LogEntry {
    /// ISO 8601 timestamp
    pub ts: String,

    /// Request ID (UUID)
    pub req_id: String,

    /// Subcommand name
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    pub exit_code: i32,

    pub duration_ms: u64,

    /// Diagnosis category, for `diagnose`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    pub ok: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

impl LogEntry {
    /// Discover journal path with fallback chain
    ///
    /// Priority:
    /// 1. $PIDIAG_LOG_FILE
    /// 2. $XDG_STATE_HOME/pidiag/ctl.jsonl
    /// 3. ~/.local/state/pidiag/ctl.jsonl
    pub fn discover_log_path() -> Option<PathBuf> {
        discover_with(|key| std::env::var(key).ok())
    }

    /// Append to the journal. Failures are ignored.
    pub fn write(&self) {
        let Some(path) = Self::discover_log_path() else {
            return;
        };
        if let Err(e) = self.write_to_file(&path) {
            tracing::debug!("journal write to {} failed: {}", path.display(), e);
        }
    }

    pub fn write_to_file(&self, path: &Path) -> Result<(), std::io::Error> {
        let json = serde_json::to_string(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", json)?;
        Ok(())
    }

    pub fn generate_req_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Current timestamp in ISO 8601 format
    pub fn now() -> String {
        chrono::Utc::now().to_rfc3339()
    }
}

fn discover_with<F>(lookup: F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = lookup("PIDIAG_LOG_FILE").filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    if let Some(state) = lookup("XDG_STATE_HOME").filter(|p| !p.is_empty()) {
        return Some(Path::new(&state).join("pidiag/ctl.jsonl"));
    }
    lookup("HOME").map(|home| Path::new(&home).join(".local/state/pidiag/ctl.jsonl"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> LogEntry {
        LogEntry {
            ts: LogEntry::now(),
            req_id: LogEntry::generate_req_id(),
            command: "diagnose".to_string(),
            args: vec!["install.log".to_string()],
            exit_code: 0,
            duration_ms: 12,
            category: Some("system".to_string()),
            ok: true,
            error: None,
        }
    }

    #[test]
    fn test_path_fallback_chain() {
        let explicit = discover_with(|k| match k {
            "PIDIAG_LOG_FILE" => Some("/tmp/j.jsonl".to_string()),
            "HOME" => Some("/home/pi".to_string()),
            _ => None,
        });
        assert_eq!(explicit, Some(PathBuf::from("/tmp/j.jsonl")));

        let xdg = discover_with(|k| match k {
            "XDG_STATE_HOME" => Some("/run/state".to_string()),
            _ => None,
        });
        assert_eq!(xdg, Some(PathBuf::from("/run/state/pidiag/ctl.jsonl")));

        let home = discover_with(|k| (k == "HOME").then(|| "/home/pi".to_string()));
        assert_eq!(home, Some(PathBuf::from("/home/pi/.local/state/pidiag/ctl.jsonl")));

        assert_eq!(discover_with(|_| None), None);
    }

    #[test]
    fn test_entries_append_as_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state/pidiag/ctl.jsonl");
        entry().write_to_file(&path).unwrap();
        entry().write_to_file(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: LogEntry = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.command, "diagnose");
        assert_eq!(parsed.category.as_deref(), Some("system"));
        assert!(!lines[0].contains("\"error\""));
    }
}
