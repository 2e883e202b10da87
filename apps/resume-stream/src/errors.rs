use thiserror::Error;

/// User-facing reason shown when the connection to the extraction service
/// fails. The underlying cause is logged, never displayed.
pub const CONNECTION_ERROR_MESSAGE: &str = "Connection error. Please try again.";

/// Errors returned synchronously by session commands.
#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Session task has stopped")]
    Closed,
}

/// Why a session ended in `Failed`.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Failure {
    /// Reported by the extraction service itself; shown verbatim.
    #[error("{0}")]
    Remote(String),

    /// Connection-level failure; carries the generic user-facing message.
    #[error("{0}")]
    Transport(String),
}

impl Failure {
    pub fn connection() -> Self {
        Failure::Transport(CONNECTION_ERROR_MESSAGE.to_string())
    }

    pub fn reason(&self) -> &str {
        match self {
            Failure::Remote(reason) | Failure::Transport(reason) => reason,
        }
    }
}
