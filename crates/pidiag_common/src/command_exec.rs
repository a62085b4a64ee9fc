//! CommandExec - external process layer
//!
//! Every package-manager query, architecture probe and hardware lookup goes
//! through a [`CommandRunner`]:
//! - Spawns the program directly, never through a shell
//! - Captures stdout, stderr, exit code and duration
//! - Bounds each call with a timeout and kills the child on expiry. The
//!   deadline also covers draining the pipes, which a backgrounded
//!   grandchild may hold open after the child exits.
//! - Never fails: anything that goes wrong degrades to empty output
//!
//! Tests and offline replays swap in [`ScriptedRunner`] or [`NullRunner`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Maximum output length to capture per stream
const MAX_OUTPUT_BYTES: usize = 64 * 1024; // 64KB

/// Default timeout for commands
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Poll interval while waiting on a child
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Result of a command execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    /// Full command line, for logs and the developer appendix
    pub full_command: String,
    /// Exit code (-1 when the process never produced one)
    pub exit_code: i32,
    /// Stdout (truncated if too long)
    pub stdout: String,
    /// Whether stdout was truncated
    pub stdout_truncated: bool,
    /// Stderr (truncated if too long)
    pub stderr: String,
    /// Whether stderr was truncated
    pub stderr_truncated: bool,
    /// Execution duration
    pub duration_ms: u64,
    /// Execution status
    pub status: ExecutionStatus,
}

/// Execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Command ran successfully (exit code 0)
    Success,
    /// Command ran but returned non-zero exit code
    NonZeroExit,
    /// Command not found on system
    CommandNotFound,
    /// Permission denied
    PermissionDenied,
    /// Command timed out and was killed
    Timeout,
    /// Other OS error
    OsError,
}

impl ExecutionStatus {
    /// Human-readable description
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NonZeroExit => "non-zero exit",
            Self::CommandNotFound => "command not found",
            Self::PermissionDenied => "permission denied",
            Self::Timeout => "timeout",
            Self::OsError => "OS error",
        }
    }

    /// Whether the process actually ran to completion
    pub fn ran(&self) -> bool {
        matches!(self, Self::Success | Self::NonZeroExit)
    }
}

impl CommandResult {
    /// Build a result for a process that never produced output
    pub fn failed(full_command: &str, status: ExecutionStatus, reason: &str) -> Self {
        Self {
            full_command: full_command.to_string(),
            exit_code: -1,
            stdout: String::new(),
            stdout_truncated: false,
            stderr: reason.to_string(),
            stderr_truncated: false,
            duration_ms: 0,
            status,
        }
    }

    /// Build a successful result with canned stdout
    pub fn canned(full_command: &str, stdout: &str) -> Self {
        Self {
            full_command: full_command.to_string(),
            exit_code: 0,
            stdout: stdout.to_string(),
            stdout_truncated: false,
            stderr: String::new(),
            stderr_truncated: false,
            duration_ms: 0,
            status: ExecutionStatus::Success,
        }
    }

    /// Stdout followed by stderr, or empty when the process never ran.
    ///
    /// Package managers report the interesting part of a failure on a
    /// non-zero exit, so that output is kept.
    pub fn combined_output(&self) -> String {
        if !self.status.ran() {
            return String::new();
        }
        let mut out = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&self.stderr);
        }
        out
    }

    /// Trimmed stdout of a successful run, empty otherwise
    pub fn stdout_if_success(&self) -> String {
        if self.status == ExecutionStatus::Success {
            self.stdout.trim().to_string()
        } else {
            String::new()
        }
    }
}

/// Seam for every external process the engine starts
pub trait CommandRunner {
    /// Run `program` with `args`, never failing
    fn run(&self, program: &str, args: &[&str]) -> CommandResult;

    /// Convenience: combined output as text, empty on failure
    fn output(&self, program: &str, args: &[&str]) -> String {
        self.run(program, args).combined_output()
    }

    /// Convenience: trimmed stdout of a successful run
    fn stdout(&self, program: &str, args: &[&str]) -> String {
        self.run(program, args).stdout_if_success()
    }
}

/// Join program and arguments into one display string
pub fn command_line(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

/// Runs real processes on the host with a timeout
#[derive(Debug, Clone)]
pub struct SystemRunner {
    timeout: Duration,
    env: Vec<(String, String)>,
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }
}

impl SystemRunner {
    pub fn new(timeout: Duration) -> Self {
        // Package-manager output is matched against English strings
        Self {
            timeout,
            env: vec![("LC_ALL".to_string(), "C".to_string())],
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Add an environment variable for every spawned process
    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> CommandResult {
        let full_command = command_line(program, args);
        let start = Instant::now();
        debug!("exec: {}", full_command);

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let status = match e.kind() {
                    std::io::ErrorKind::NotFound => ExecutionStatus::CommandNotFound,
                    std::io::ErrorKind::PermissionDenied => ExecutionStatus::PermissionDenied,
                    _ => ExecutionStatus::OsError,
                };
                debug!("exec failed: {} ({})", full_command, status.as_str());
                let mut result =
                    CommandResult::failed(&full_command, status, &format!("OS error: {}", e));
                result.duration_ms = start.elapsed().as_millis() as u64;
                return result;
            }
        };

        let deadline = start + self.timeout;
        let stdout_reader = spawn_reader(child.stdout.take());
        let stderr_reader = spawn_reader(child.stderr.take());

        let exit = match wait_until(&mut child, deadline) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                return self.timed_out(&full_command, start);
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                let mut result = CommandResult::failed(
                    &full_command,
                    ExecutionStatus::OsError,
                    &format!("wait failed: {}", e),
                );
                result.duration_ms = start.elapsed().as_millis() as u64;
                return result;
            }
        };

        let (Some(stdout), Some(stderr)) = (
            collect_reader(stdout_reader, deadline),
            collect_reader(stderr_reader, deadline),
        ) else {
            return self.timed_out(&full_command, start);
        };
        let duration_ms = start.elapsed().as_millis() as u64;
        let (stdout, stdout_truncated) = truncate_output(&stdout);
        let (stderr, stderr_truncated) = truncate_output(&stderr);
        let exit_code = exit.code().unwrap_or(-1);

        let status = if exit.success() {
            ExecutionStatus::Success
        } else if exit_code == 127 {
            ExecutionStatus::CommandNotFound
        } else if exit_code == 126 {
            ExecutionStatus::PermissionDenied
        } else {
            ExecutionStatus::NonZeroExit
        };

        debug!(
            "exec done: {} -> {} in {}ms",
            full_command,
            status.as_str(),
            duration_ms
        );

        CommandResult {
            full_command,
            exit_code,
            stdout,
            stdout_truncated,
            stderr,
            stderr_truncated,
            duration_ms,
            status,
        }
    }
}

impl SystemRunner {
    fn timed_out(&self, full_command: &str, start: Instant) -> CommandResult {
        warn!(
            "command timed out after {}ms: {}",
            self.timeout.as_millis(),
            full_command
        );
        let mut result = CommandResult::failed(full_command, ExecutionStatus::Timeout, "timed out");
        result.duration_ms = start.elapsed().as_millis() as u64;
        result
    }
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> Option<Receiver<Vec<u8>>> {
    pipe.map(|mut pipe| {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            let _ = tx.send(buf);
        });
        rx
    })
}

/// Pipe contents, or `None` when the pipe is still open at the deadline
fn collect_reader(reader: Option<Receiver<Vec<u8>>>, deadline: Instant) -> Option<Vec<u8>> {
    let Some(rx) = reader else {
        return Some(Vec::new());
    };
    match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(buf) => Some(buf),
        Err(RecvTimeoutError::Timeout) => None,
        Err(RecvTimeoutError::Disconnected) => Some(Vec::new()),
    }
}

fn wait_until(child: &mut Child, deadline: Instant) -> std::io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Runner that never produces information
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRunner;

impl CommandRunner for NullRunner {
    fn run(&self, program: &str, args: &[&str]) -> CommandResult {
        CommandResult::failed(
            &command_line(program, args),
            ExecutionStatus::CommandNotFound,
            "external commands disabled",
        )
    }
}

/// Replays canned outputs keyed by command line.
///
/// A key matches when the full command line equals it or starts with it
/// followed by a space, so `"apt-cache show"` answers every show query.
/// The longest matching key wins. Unmatched commands report not-found.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    responses: HashMap<String, CommandResult>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `command` with `stdout` and exit 0
    pub fn respond(mut self, command: &str, stdout: &str) -> Self {
        self.responses
            .insert(command.to_string(), CommandResult::canned(command, stdout));
        self
    }

    /// Answer `command` with a full result
    pub fn respond_with(mut self, command: &str, result: CommandResult) -> Self {
        self.responses.insert(command.to_string(), result);
        self
    }

    /// Command lines seen so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Whether any recorded call starts with `prefix`
    pub fn was_called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(prefix))
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[&str]) -> CommandResult {
        let line = command_line(program, args);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(line.clone());
        }

        let best = self
            .responses
            .iter()
            .filter(|(key, _)| {
                line == **key
                    || (line.starts_with(key.as_str())
                        && line.as_bytes().get(key.len()) == Some(&b' '))
            })
            .max_by_key(|(key, _)| key.len());

        match best {
            Some((_, result)) => {
                let mut result = result.clone();
                result.full_command = line;
                result
            }
            None => CommandResult::failed(&line, ExecutionStatus::CommandNotFound, "not scripted"),
        }
    }
}

/// Truncate output to max bytes, returning (string, was_truncated)
fn truncate_output(bytes: &[u8]) -> (String, bool) {
    if bytes.len() <= MAX_OUTPUT_BYTES {
        (String::from_utf8_lossy(bytes).to_string(), false)
    } else {
        let truncated = &bytes[..MAX_OUTPUT_BYTES];
        let s = String::from_utf8_lossy(truncated).to_string();
        (format!("{}\n... [truncated, {} bytes total]", s, bytes.len()), true)
    }
}
