//! Error codes and exit status for pidiagctl

use pidiag_common::DiagError;

/// Exit code for success, whatever the diagnosis category
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code for general errors
pub const EXIT_GENERAL_ERROR: i32 = 1;

/// Exit code when the log file is missing or unreadable
pub const EXIT_LOG_UNREADABLE: i32 = 66;

/// Exit code when the report gate declined to send
pub const EXIT_REPORT_BLOCKED: i32 = 67;

/// Exit code for a failed command
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<DiagError>() {
        Some(DiagError::EmptyPath | DiagError::LogNotFound(_) | DiagError::Io(_)) => {
            EXIT_LOG_UNREADABLE
        }
        _ => EXIT_GENERAL_ERROR,
    }
}

/// Short machine-readable code for the journal
pub fn error_code(err: &anyhow::Error) -> String {
    match err.downcast_ref::<DiagError>() {
        Some(e) => format!("E{}", e.code()),
        None => "E1".to_string(),
    }
}
