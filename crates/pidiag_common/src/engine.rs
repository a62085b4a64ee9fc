//! Diagnosis entry points.
//!
//! `diagnose_text` is pure over the injected host and runner. `diagnose_file`
//! adds the file boundary: reading the log and appending the developer
//! appendix when the caller allows it.

use crate::backend::{Backend, BackendKind};
use crate::command_exec::CommandRunner;
use crate::diagnosis::Diagnosis;
use crate::enrichment::Appendix;
use crate::error::{DiagError, DiagResult};
use crate::host::HostInfo;
use crate::rules::{catalog, evaluate, Scope};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

/// Everything a diagnosis call needs besides the log itself
pub struct DiagnoseOptions<'a> {
    pub backend: BackendKind,
    pub enrich: bool,
    pub host: &'a HostInfo,
    pub runner: &'a dyn CommandRunner,
}

impl<'a> DiagnoseOptions<'a> {
    /// Backend detected from the host root, enrichment on
    pub fn new(host: &'a HostInfo, runner: &'a dyn CommandRunner) -> Self {
        Self {
            backend: BackendKind::detect(&host.root),
            enrich: true,
            host,
            runner,
        }
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_enrichment(mut self, enrich: bool) -> Self {
        self.enrich = enrich;
        self
    }
}

/// Classify log text. Never fails.
pub fn diagnose_text(text: &str, opts: &DiagnoseOptions) -> (Diagnosis, Appendix) {
    let rules = catalog(opts.backend);
    debug!(
        "diagnosing {} bytes with {} backend ({} rules, enrich={})",
        text.len(),
        opts.backend,
        rules.len(),
        opts.enrich
    );

    let mut scope = Scope::new(
        text,
        opts.host,
        Backend::new(opts.backend),
        opts.runner,
        opts.enrich,
    );
    evaluate(&rules, &mut scope);

    let diagnosis = scope.diagnosis.finalize();
    info!(
        "diagnosis: category={} captions={}",
        diagnosis.category,
        diagnosis.captions.len()
    );
    (diagnosis, scope.appendix)
}

/// Classify a log file, appending the developer appendix when `allow_write` is set
pub fn diagnose_file(path: &Path, allow_write: bool, opts: &DiagnoseOptions) -> DiagResult<Diagnosis> {
    if path.as_os_str().is_empty() {
        return Err(DiagError::EmptyPath);
    }
    if !path.is_file() {
        return Err(DiagError::LogNotFound(path.display().to_string()));
    }

    let bytes = std::fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    let (diagnosis, appendix) = diagnose_text(&text, opts);

    if allow_write && !appendix.is_empty() {
        if let Err(e) = append_appendix(path, &appendix) {
            warn!("could not append developer appendix to {}: {}", path.display(), e);
        }
    }

    Ok(diagnosis)
}

fn append_appendix(path: &Path, appendix: &Appendix) -> std::io::Result<()> {
    let mut file = OpenOptions::new().append(true).open(path)?;
    file.write_all(appendix.render().as_bytes())?;
    debug!("appended {} appendix section(s) to {}", appendix.sections().len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_exec::{NullRunner, ScriptedRunner};
    use crate::diagnosis::Category;
    use std::fs;

    fn blank_host() -> (tempfile::TempDir, HostInfo) {
        let dir = tempfile::tempdir().unwrap();
        let host = HostInfo::blank(dir.path());
        (dir, host)
    }

    #[test]
    fn test_empty_log_is_unknown() {
        let (_dir, host) = blank_host();
        let opts = DiagnoseOptions::new(&host, &NullRunner).with_backend(BackendKind::Apt);
        let (d, appendix) = diagnose_text("", &opts);
        assert_eq!(d.category, Category::Unknown);
        assert!(d.captions.is_empty());
        assert!(appendix.is_empty());
    }

    #[test]
    fn test_backend_detected_from_root() {
        let (dir, host) = blank_host();
        assert_eq!(DiagnoseOptions::new(&host, &NullRunner).backend, BackendKind::Generic);
        fs::create_dir_all(dir.path().join("usr/bin")).unwrap();
        fs::write(dir.path().join("usr/bin/apt-get"), "").unwrap();
        assert_eq!(DiagnoseOptions::new(&host, &NullRunner).backend, BackendKind::Apt);
    }

    #[test]
    fn test_missing_and_empty_paths() {
        let (dir, host) = blank_host();
        let opts = DiagnoseOptions::new(&host, &NullRunner);
        assert!(matches!(
            diagnose_file(Path::new(""), false, &opts),
            Err(DiagError::EmptyPath)
        ));
        assert!(matches!(
            diagnose_file(&dir.path().join("nope.log"), false, &opts),
            Err(DiagError::LogNotFound(_))
        ));
    }

    #[test]
    fn test_invalid_utf8_is_read_lossily() {
        let (dir, host) = blank_host();
        let log = dir.path().join("install.log");
        let mut bytes = b"E: Could not get lock /var/lib/dpkg/lock-frontend\n".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe, b'\n']);
        fs::write(&log, bytes).unwrap();

        let opts = DiagnoseOptions::new(&host, &NullRunner).with_backend(BackendKind::Apt);
        let d = diagnose_file(&log, false, &opts).unwrap();
        assert_eq!(d.category, Category::System);
    }

    #[test]
    fn test_appendix_written_only_when_allowed() {
        let (dir, host) = blank_host();
        let log = dir.path().join("install.log");
        let text = "The following packages have unmet dependencies:\n libfoo : Depends: libbar but it is not installable\n\nE: Unable to correct problems\n";
        let runner = ScriptedRunner::new();
        let opts = DiagnoseOptions::new(&host, &runner).with_backend(BackendKind::Apt);

        fs::write(&log, text).unwrap();
        diagnose_file(&log, false, &opts).unwrap();
        assert_eq!(fs::read_to_string(&log).unwrap(), text);

        diagnose_file(&log, true, &opts).unwrap();
        let written = fs::read_to_string(&log).unwrap();
        assert!(written.starts_with(text));
        assert!(written.contains(Appendix::HEADER));
    }

    #[test]
    fn test_read_only_leaves_file_untouched_without_enrichment() {
        let (dir, host) = blank_host();
        let log = dir.path().join("install.log");
        let text = "The following packages have unmet dependencies:\n libfoo : Depends: libbar\n";
        fs::write(&log, text).unwrap();

        let opts = DiagnoseOptions::new(&host, &NullRunner)
            .with_backend(BackendKind::Apt)
            .with_enrichment(false);
        diagnose_file(&log, true, &opts).unwrap();
        assert_eq!(fs::read_to_string(&log).unwrap(), text);
    }
}
