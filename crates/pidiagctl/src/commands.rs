//! Subcommand implementations

use crate::cli::{Cli, Commands, ConfigAction};
use crate::errors::{EXIT_REPORT_BLOCKED, EXIT_SUCCESS};
use crate::output;
use anyhow::{Context, Result};
use pidiag_common::device_info::{device_header, HeaderSources};
use pidiag_common::formatter::format_log;
use pidiag_common::{
    diagnose_file, send_report, CommandRunner, DiagConfig, DiagnoseOptions, HostInfo,
    ReportOutcome, SystemRunner,
};
use std::path::Path;
use tracing::debug;

/// What a finished command reports back to the journal
#[derive(Debug, Default)]
pub struct CommandOutcome {
    pub exit_code: i32,
    pub category: Option<String>,
}

impl CommandOutcome {
    fn success() -> Self {
        Self::default()
    }
}

/// Config, host facts and command runner for one invocation
pub struct Session {
    pub config: DiagConfig,
    pub host: HostInfo,
    runner: Box<dyn CommandRunner>,
}

impl Session {
    /// Probe the host under the configured root
    pub fn new(config: DiagConfig) -> Self {
        let runner = SystemRunner::new(config.command_timeout());
        Self::with_runner(config, Box::new(runner))
    }

    pub fn with_runner(config: DiagConfig, runner: Box<dyn CommandRunner>) -> Self {
        let host = HostInfo::detect(runner.as_ref(), &config.paths.root);
        Self {
            config,
            host,
            runner,
        }
    }

    pub fn diagnose_options(&self) -> DiagnoseOptions<'_> {
        DiagnoseOptions::new(&self.host, self.runner.as_ref())
            .with_backend(self.config.backend_kind())
            .with_enrichment(self.config.engine.enrichment)
    }

    pub fn header_sources(&self) -> HeaderSources<'_> {
        let mut sources = HeaderSources::new(&self.host, self.runner.as_ref());
        sources.pi_apps_dir = self.config.pi_apps_dir();
        sources.github_api_key = self.config.github_api_key.clone();
        sources
    }
}

/// Load config, apply global flags and run the subcommand
pub fn execute(cli: Cli) -> Result<CommandOutcome> {
    let Cli {
        backend,
        no_enrich,
        command,
        ..
    } = cli;
    let session = || open_session(backend.as_deref(), no_enrich);

    match command {
        Commands::Diagnose { log, read_only, json } => diagnose(&session()?, &log, read_only, json),
        Commands::Format { log } => format(&session()?, &log),
        Commands::Send { log } => send(&session()?, &log),
        Commands::Header => header(&session()?),
        Commands::Config { action } => config_command(&action),
    }
}

fn open_session(backend: Option<&str>, no_enrich: bool) -> Result<Session> {
    let mut config = DiagConfig::load()?;
    if let Some(backend) = backend {
        config.set("engine.backend", backend)?;
    }
    if no_enrich {
        config.engine.enrichment = false;
    }
    debug!(
        "backend={} enrichment={} root={}",
        config.engine.backend,
        config.engine.enrichment,
        config.paths.root.display()
    );
    Ok(Session::new(config))
}

pub fn diagnose(session: &Session, log: &Path, read_only: bool, json: bool) -> Result<CommandOutcome> {
    let diagnosis = diagnose_file(log, !read_only, &session.diagnose_options())
        .with_context(|| format!("Cannot diagnose {}", log.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&diagnosis)?);
    } else {
        output::display_diagnosis(&diagnosis);
    }

    Ok(CommandOutcome {
        exit_code: EXIT_SUCCESS,
        category: Some(diagnosis.category.to_string()),
    })
}

pub fn format(session: &Session, log: &Path) -> Result<CommandOutcome> {
    format_log(log, &session.header_sources())
        .with_context(|| format!("Cannot format {}", log.display()))?;
    output::display_success(&format!("Formatted {}", log.display()));
    Ok(CommandOutcome::success())
}

pub fn send(session: &Session, log: &Path) -> Result<CommandOutcome> {
    let outcome = send_report(log, &session.config.report_options(), &session.header_sources())
        .with_context(|| format!("Cannot send {}", log.display()))?;
    output::display_report_outcome(&outcome);
    let exit_code = match outcome {
        ReportOutcome::Sent(_) => EXIT_SUCCESS,
        ReportOutcome::NotSent(_) => EXIT_REPORT_BLOCKED,
    };
    Ok(CommandOutcome {
        exit_code,
        category: None,
    })
}

pub fn header(session: &Session) -> Result<CommandOutcome> {
    print!("{}", device_header(&session.header_sources())?);
    Ok(CommandOutcome::success())
}

fn config_command(action: &ConfigAction) -> Result<CommandOutcome> {
    match action {
        ConfigAction::Show => {
            print!("{}", DiagConfig::load()?.show()?);
        }
        ConfigAction::Set { assignment } => {
            // Environment overrides are not persisted
            let path = DiagConfig::user_config_path()?;
            let mut config = if path.exists() {
                DiagConfig::load_from(&path)?
            } else {
                DiagConfig::default()
            };
            config.set_assignment(assignment)?;
            config.save_to(&path)?;
            output::display_success(&format!("Saved {}", path.display()));
        }
    }
    Ok(CommandOutcome::success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pidiag_common::{BackendKind, ScriptedRunner};
    use std::fs;

    fn make_session(root: &Path) -> Session {
        let mut config = DiagConfig::default();
        config.paths.root = root.to_path_buf();
        config.engine.backend = "apt".to_string();
        Session::with_runner(config, Box::new(ScriptedRunner::new()))
    }

    #[test]
    fn test_session_uses_configured_backend() {
        let dir = tempfile::tempdir().unwrap();
        let session = make_session(dir.path());
        assert_eq!(session.diagnose_options().backend, BackendKind::Apt);
        assert_eq!(session.host.root, dir.path());
    }

    #[test]
    fn test_diagnose_reports_category() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("install.log");
        fs::write(&log, "E: Could not get lock /var/lib/dpkg/lock-frontend\n").unwrap();
        let session = make_session(dir.path());

        let outcome = diagnose(&session, &log, true, true).unwrap();
        assert_eq!(outcome.exit_code, EXIT_SUCCESS);
        assert_eq!(outcome.category.as_deref(), Some("system"));
    }

    #[test]
    fn test_send_without_header_is_blocked() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("install.log");
        fs::write(&log, "E: broken\n").unwrap();
        let mut session = make_session(dir.path());
        session.config.paths.pi_apps_dir = Some(dir.path().join("no-pi-apps"));

        let outcome = send(&session, &log).unwrap();
        assert_eq!(outcome.exit_code, EXIT_REPORT_BLOCKED);
        assert!(fs::read_to_string(&log).unwrap().starts_with("OS: "));
    }

    #[test]
    fn test_diagnose_missing_log_fails() {
        let dir = tempfile::tempdir().unwrap();
        let session = make_session(dir.path());
        let err = diagnose(&session, &dir.path().join("gone.log"), true, false).unwrap_err();
        assert_eq!(crate::errors::exit_code_for(&err), crate::errors::EXIT_LOG_UNREADABLE);
    }
}
