//! Report gate and uploader.
//!
//! Reporting is best effort. Only a missing log is an error; every other
//! failed precondition comes back as [`ReportOutcome::NotSent`].

use crate::device_info::HeaderSources;
use crate::error::{DiagError, DiagResult};
use crate::formatter::format_log;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::blocking::{multipart, Client};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Line a genuine Pi-Apps log carries after formatting
pub const REQUIRED_HEADER: &str = "Last updated Pi-Apps on:";

/// Built-in endpoint pointer
pub const DEFAULT_ENDPOINT_POINTER: &str =
    "aHR0cHM6Ly9yYXcuZ2l0aHVidXNlcmNvbnRlbnQuY29tL0JvdHNwb3QvcGktYXBwcy1hbmFseXRpY3MvbWFpbi9lcnJvci1sb2ctd2ViaG9vay1uZXcK";

pub const SENT_MESSAGE: &str = "Error report sent successfully!";
pub const MISSING_HEADER_MESSAGE: &str = "Log file not sent - missing required header";

#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub enabled: bool,
    /// Overrides [`DEFAULT_ENDPOINT_POINTER`]
    pub endpoint_pointer: Option<String>,
    pub upload_timeout: Duration,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint_pointer: None,
            upload_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    Sent(String),
    NotSent(String),
}

impl ReportOutcome {
    pub fn message(&self) -> &str {
        match self {
            ReportOutcome::Sent(m) | ReportOutcome::NotSent(m) => m,
        }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, ReportOutcome::Sent(_))
    }
}

/// Format the log, check the gate and upload it
pub fn send_report(
    path: &Path,
    opts: &ReportOptions,
    sources: &HeaderSources,
) -> DiagResult<ReportOutcome> {
    if path.as_os_str().is_empty() {
        return Err(DiagError::EmptyPath);
    }
    if !path.is_file() {
        return Err(DiagError::LogNotFound(path.display().to_string()));
    }

    format_log(path, sources)?;
    let content = std::fs::read(path)?;

    if !has_required_header(&String::from_utf8_lossy(&content)) {
        info!("report for {} blocked: missing header", path.display());
        return Ok(ReportOutcome::NotSent(MISSING_HEADER_MESSAGE.to_string()));
    }
    if !opts.enabled {
        info!("report for {} blocked: reporting disabled", path.display());
        return Ok(ReportOutcome::NotSent(
            "Log file not sent - error reporting is disabled".to_string(),
        ));
    }

    let client = match Client::builder().timeout(opts.upload_timeout).build() {
        Ok(c) => c,
        Err(e) => {
            warn!("no upload client: {}", e);
            return Ok(ReportOutcome::NotSent(format!(
                "Log file not sent - upload tool unavailable: {e}"
            )));
        }
    };

    let pointer = opts
        .endpoint_pointer
        .as_deref()
        .unwrap_or(DEFAULT_ENDPOINT_POINTER);
    let endpoint = match resolve_endpoint(&client, pointer) {
        Ok(url) => url,
        Err(e) => {
            warn!("{}", e);
            return Ok(ReportOutcome::NotSent(format!("Log file not sent - {e}")));
        }
    };

    match upload(&client, &endpoint, &upload_name(path), content) {
        Ok(()) => {
            info!("report for {} sent", path.display());
            Ok(ReportOutcome::Sent(SENT_MESSAGE.to_string()))
        }
        Err(e) => {
            warn!("{}", e);
            Ok(ReportOutcome::NotSent(format!("Log file not sent - {e}")))
        }
    }
}

/// Whether some line starts with [`REQUIRED_HEADER`]
pub fn has_required_header(text: &str) -> bool {
    text.lines().any(|l| l.starts_with(REQUIRED_HEADER))
}

/// Basename with the extension replaced by `.txt`
pub fn upload_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "log".to_string());
    format!("{stem}.txt")
}

/// Base64 text to a trimmed UTF-8 string
pub fn decode_layer(encoded: &str) -> DiagResult<String> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| DiagError::Endpoint(format!("invalid base64: {e}")))?;
    let text = String::from_utf8(bytes)
        .map_err(|e| DiagError::Endpoint(format!("decoded endpoint is not UTF-8: {e}")))?;
    Ok(text.trim().to_string())
}

/// Pointer -> remote location -> webhook URL
fn resolve_endpoint(client: &Client, pointer: &str) -> DiagResult<String> {
    let location = decode_layer(pointer)?;
    if !location.starts_with("https://") && !location.starts_with("http://") {
        return Err(DiagError::Endpoint(format!(
            "pointer does not decode to a URL: {location}"
        )));
    }
    debug!("fetching report endpoint from {}", location);

    let body = client
        .get(&location)
        .send()
        .and_then(|r| r.error_for_status())
        .and_then(|r| r.text())
        .map_err(|e| DiagError::Endpoint(format!("could not fetch endpoint: {e}")))?;
    decode_layer(&body)
}

fn upload(client: &Client, endpoint: &str, name: &str, content: Vec<u8>) -> DiagResult<()> {
    let part = multipart::Part::bytes(content)
        .file_name(name.to_string())
        .mime_str("text/plain")
        .map_err(|e| DiagError::Upload(e.to_string()))?;
    let form = multipart::Form::new().part("file", part);

    debug!("uploading {}", name);
    client
        .post(endpoint)
        .multipart(form)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(|e| DiagError::Upload(e.to_string()))?;
    Ok(())
}
