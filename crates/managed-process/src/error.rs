//! Error types for managed processes

use std::io;
use thiserror::Error;

/// Managed process errors
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The OS refused to create the process
    #[error("Failed to spawn process: {0}")]
    SpawnFailed(#[from] io::Error),

    /// The process wrote to stderr; the message is the decoded stderr text
    #[error("{0}")]
    Stderr(String),

    /// The process exited with a non-success status
    #[error("Process exited with {}: {stderr}", describe_code(.code))]
    ExitStatus { code: Option<i32>, stderr: String },

    /// Invalid configuration
    #[error("Invalid process configuration: {0}")]
    InvalidConfig(String),
}

impl ProcessError {
    /// Failure detail for reporting.
    ///
    /// For exit-time failures this is the captured stderr text.
    pub fn detail(&self) -> String {
        match self {
            ProcessError::Stderr(stderr) => stderr.clone(),
            ProcessError::ExitStatus { stderr, .. } => stderr.clone(),
            other => other.to_string(),
        }
    }
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "signal".to_string(),
    }
}

/// Result type for process operations
pub type Result<T> = std::result::Result<T, ProcessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stderr_display_is_raw_text() {
        let err = ProcessError::Stderr("bad input".to_string());
        assert_eq!(err.to_string(), "bad input");
        assert_eq!(err.detail(), "bad input");
    }

    #[test]
    fn test_exit_status_display() {
        let err = ProcessError::ExitStatus {
            code: Some(3),
            stderr: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "Process exited with code 3: boom");
        assert_eq!(err.detail(), "boom");

        let err = ProcessError::ExitStatus {
            code: None,
            stderr: String::new(),
        };
        assert_eq!(err.to_string(), "Process exited with signal: ");
    }

    #[test]
    fn test_spawn_failed_from_io() {
        let err: ProcessError = io::Error::new(io::ErrorKind::NotFound, "missing").into();
        assert!(matches!(err, ProcessError::SpawnFailed(_)));
        assert!(err.detail().contains("missing"));
    }
}
