use thiserror::Error;

/// Errors raised by the cry-flow components
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// The microphone / recording capability could not be acquired or failed mid-session
    #[error("Capture unavailable: {0}")]
    CaptureUnavailable(String),

    /// Sign-in or sign-up rejected by the identity provider
    #[error("Authentication failed: {0}")]
    AuthFailure(String),

    #[error("Invalid transition: cannot {action} while {from}")]
    InvalidTransition { from: String, action: String },

    #[error("Invalid option '{value}' for field {field}")]
    InvalidOption { field: String, value: String },

    #[error("Session not found: {0}")]
    SessionNotFound(String),
}

impl FlowError {
    /// Whether the caller can recover by retrying the operation from scratch
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FlowError::CaptureUnavailable(_) | FlowError::AuthFailure(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
