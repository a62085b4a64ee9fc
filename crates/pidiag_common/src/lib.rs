//! pidiag common - log diagnosis engine for Pi-Apps install failures
//!
//! Classifies captured install logs into a category plus human-readable
//! captions, formats logs for triage and gates error reports.

pub mod arch;
pub mod backend;
pub mod candidates;
pub mod command_exec;
pub mod device_info;
pub mod diag_config;
pub mod diagnosis;
pub mod engine;
pub mod enrichment;
pub mod error;
pub mod formatter;
pub mod host;
pub mod os_release;
pub mod preprocess;
pub mod repo_files;
pub mod report;
pub mod rules;

pub use backend::BackendKind;
pub use command_exec::{CommandRunner, NullRunner, ScriptedRunner, SystemRunner};
pub use diag_config::DiagConfig;
pub use diagnosis::{Category, Diagnosis};
pub use engine::{diagnose_file, diagnose_text, DiagnoseOptions};
pub use enrichment::Appendix;
pub use error::{DiagError, DiagResult};
pub use host::HostInfo;
pub use report::{send_report, ReportOptions, ReportOutcome};
