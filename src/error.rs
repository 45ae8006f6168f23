//! Error types shared by the board, the session and the remote collaborators.

use thiserror::Error;

/// Everything a user gesture can fail with.
///
/// None of these are fatal: the CLI reports them and exits non-zero, the TUI
/// shows them in the status bar and keeps whatever the user typed.
#[derive(Debug, Error)]
pub enum Error {
    /// Input rejected before it reached the board (empty text, bad model name).
    #[error("{0}")]
    Validation(String),

    /// A referenced record does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The categorization or brainstorm service failed or replied with garbage.
    #[error("remote service error: {0}")]
    RemoteService(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for errors the user can fix by changing their input and retrying.
    pub fn is_user_error(&self) -> bool {
        matches!(self, Error::Validation(_) | Error::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            Error::NotFound("completed record 42".to_string()).to_string(),
            "completed record 42 not found"
        );
        assert_eq!(
            Error::Validation("Task text cannot be empty".to_string()).to_string(),
            "Task text cannot be empty"
        );
        assert!(Error::RemoteService("HTTP 500".to_string())
            .to_string()
            .starts_with("remote service error"));
    }

    #[test]
    fn test_is_user_error() {
        assert!(Error::Validation("x".into()).is_user_error());
        assert!(Error::NotFound("x".into()).is_user_error());
        assert!(!Error::RemoteService("x".into()).is_user_error());
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        assert!(!Error::from(io).is_user_error());
    }
}
