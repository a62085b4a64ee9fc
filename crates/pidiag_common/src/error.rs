//! Error types for the diagnosis engine.
//!
//! Only boundary failures live here. Classification itself never fails.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiagError {
    #[error("No log file specified")]
    EmptyPath,

    #[error("Log file not found: {0}")]
    LogNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Report endpoint error: {0}")]
    Endpoint(String),

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DiagError {
    pub fn code(&self) -> i32 {
        match self {
            DiagError::EmptyPath => 2,
            DiagError::LogNotFound(_) => 3,
            DiagError::Config(_) => 4,
            DiagError::Endpoint(_) => 5,
            DiagError::Upload(_) => 6,
            DiagError::Io(_) => 7,
            DiagError::Json(_) => 8,
        }
    }
}

pub type DiagResult<T> = Result<T, DiagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let errors = vec![
            DiagError::EmptyPath,
            DiagError::LogNotFound("x".into()),
            DiagError::Config("x".into()),
            DiagError::Endpoint("x".into()),
            DiagError::Upload("x".into()),
            DiagError::Io(std::io::Error::new(std::io::ErrorKind::Other, "x")),
        ];
        let mut codes: Vec<i32> = errors.iter().map(|e| e.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_io_conversion() {
        let err: DiagError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(err.to_string().contains("gone"));
    }
}
