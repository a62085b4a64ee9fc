//! Log formatter: clean terminal noise and prepend the device header.
//!
//! Formatting is idempotent. A cleaned log that already opens with a device
//! header (or the fallback line) followed by the separator is written back
//! without a second header.

use crate::device_info::{device_header, HeaderSources};
use crate::error::{DiagError, DiagResult};
use crate::preprocess::clean_log;
use std::path::Path;
use tracing::{debug, warn};

/// Separator between the header and the original log
pub const LOG_SEPARATOR: &str = "\n\nBEGINNING OF LOG FILE:\n-----------------------\n\n";

/// Header used when device facts could not be collected
pub const HEADER_FALLBACK: &str = "Failed to get device info";

const HEADER_PREFIX: &str = "OS: ";

/// Whether cleaned text already carries a device header.
///
/// Header lines are never blank, so a blank line before the separator means
/// the `OS: ` line belongs to the log itself.
pub fn is_formatted(cleaned: &str) -> bool {
    let Some((head, _)) = cleaned.split_once(LOG_SEPARATOR) else {
        return false;
    };
    head == HEADER_FALLBACK || (head.starts_with(HEADER_PREFIX) && !head.contains("\n\n"))
}

/// Format log content. `header` is only called for logs without one.
pub fn format_text<F>(content: &str, header: F) -> String
where
    F: FnOnce() -> anyhow::Result<String>,
{
    let cleaned = clean_log(content);
    if is_formatted(&cleaned) {
        debug!("log already carries a device header");
        return cleaned;
    }
    let header = header().unwrap_or_else(|e| {
        warn!("device header unavailable: {:#}", e);
        HEADER_FALLBACK.to_string()
    });
    format!("{header}{LOG_SEPARATOR}{cleaned}")
}

/// Rewrite a log file in place. An empty path does nothing.
pub fn format_log(path: &Path, sources: &HeaderSources) -> DiagResult<()> {
    if path.as_os_str().is_empty() {
        return Ok(());
    }
    if !path.is_file() {
        return Err(DiagError::LogNotFound(path.display().to_string()));
    }

    let bytes = std::fs::read(path)?;
    let formatted = format_text(&String::from_utf8_lossy(&bytes), || device_header(sources));
    std::fs::write(path, formatted)?;
    debug!("formatted {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_exec::NullRunner;
    use crate::host::HostInfo;
    use std::fs;

    fn fixed_header() -> anyhow::Result<String> {
        Ok("OS: Test OS\nOS architecture: 64-bit\n".to_string())
    }

    #[test]
    fn test_header_and_separator() {
        let out = format_text("\x1b[1;32mInstalling\x1b[0m foo\n", fixed_header);
        assert_eq!(
            out,
            "OS: Test OS\nOS architecture: 64-bit\n\n\nBEGINNING OF LOG FILE:\n-----------------------\n\nInstalling foo\n"
        );
    }

    #[test]
    fn test_formatting_twice_is_stable() {
        let once = format_text("line one\r\n.......... .......... .......... .......... ......... 10%\nline two\n", fixed_header);
        let twice = format_text(&once, || panic!("header recomputed"));
        assert_eq!(once, twice);
        assert!(!once.contains(".........."));
    }

    #[test]
    fn test_header_failure_fallback() {
        let out = format_text("body", || anyhow::bail!("no sysfs"));
        assert!(out.starts_with("Failed to get device info\n\nBEGINNING OF LOG FILE:"));
        assert!(out.ends_with("body"));
    }

    #[test]
    fn test_fallback_header_is_recognised() {
        let once = format_text("body\n", || anyhow::bail!("no sysfs"));
        let twice = format_text(&once, || panic!("header recomputed"));
        assert_eq!(once, twice);
        assert_eq!(twice.matches("BEGINNING OF LOG FILE:").count(), 1);
    }

    #[test]
    fn test_log_starting_with_os_line_gets_header() {
        let raw = "OS: Raspbian detected, continuing\nE: Unable to locate package foo\n";
        assert!(!is_formatted(raw));
        let out = format_text(raw, fixed_header);
        assert!(out.starts_with("OS: Test OS\n"));
        assert!(out.ends_with(&format!("{LOG_SEPARATOR}{raw}")));
        assert!(is_formatted(&out));
    }

    #[test]
    fn test_format_log_paths() {
        let dir = tempfile::tempdir().unwrap();
        let host = HostInfo::blank(dir.path());
        let mut sources = HeaderSources::new(&host, &NullRunner);
        sources.lookup_latest = false;

        assert!(format_log(Path::new(""), &sources).is_ok());
        assert!(matches!(
            format_log(&dir.path().join("missing.log"), &sources),
            Err(DiagError::LogNotFound(_))
        ));

        let log = dir.path().join("install.log");
        fs::write(&log, "E: Unable to locate package foo\n").unwrap();
        format_log(&log, &sources).unwrap();
        let text = fs::read_to_string(&log).unwrap();
        assert!(text.starts_with("OS: Unknown\n"));
        assert!(text.ends_with(&format!("{LOG_SEPARATOR}E: Unable to locate package foo\n")));
    }
}
