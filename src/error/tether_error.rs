//! Unified error type for the session core.
//!
//! `TetherError` wraps the domain errors so that adapters and the binary
//! can use one `Result` type while still classifying errors through
//! [`ErrorCategory`].

use std::fmt;

use super::category::ErrorCategory;
use super::operation::OperationError;
use super::protocol::ProtocolAnomaly;
use super::transport::TransportError;

/// Unified error type.
#[derive(Debug)]
pub enum TetherError {
    /// Socket, connect or health probe failure.
    Transport(TransportError),

    /// Frame that could not be applied.
    Protocol(ProtocolAnomaly),

    /// User-initiated operation that cannot proceed.
    Operation(OperationError),

    /// Outbound frame while the socket is down.
    NotConnected,

    /// Conversation store failure.
    Store { message: String },

    /// Invalid configuration.
    Config { message: String },
}

impl TetherError {
    /// Get the category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            TetherError::Transport(_) => ErrorCategory::Transport,
            TetherError::Protocol(_) => ErrorCategory::Protocol,
            TetherError::Operation(_) => ErrorCategory::Operation,
            TetherError::NotConnected => ErrorCategory::NotConnected,
            TetherError::Store { .. } => ErrorCategory::System,
            TetherError::Config { .. } => ErrorCategory::Configuration,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            TetherError::Transport(err) => err.is_retryable(),
            _ => false,
        }
    }

    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            TetherError::Transport(err) => err.user_message(),
            TetherError::Protocol(_) => "The backend sent an unexpected message.".to_string(),
            TetherError::Operation(err) => err.to_string(),
            TetherError::NotConnected => "Not connected. The message was not sent.".to_string(),
            TetherError::Store { message } => format!("Could not access saved conversations: {}", message),
            TetherError::Config { message } => format!("Configuration problem: {}", message),
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            TetherError::Transport(err) => err.error_code(),
            TetherError::Protocol(err) => err.error_code(),
            TetherError::Operation(err) => err.error_code(),
            TetherError::NotConnected => "E_NOT_CONNECTED",
            TetherError::Store { .. } => "E_STORE",
            TetherError::Config { .. } => "E_CONFIG",
        }
    }

    /// Get the recovery hint for this error.
    pub fn recovery_hint(&self) -> &'static str {
        self.category().recovery_hint()
    }
}

impl fmt::Display for TetherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TetherError::Transport(err) => write!(f, "{}", err),
            TetherError::Protocol(err) => write!(f, "{}", err),
            TetherError::Operation(err) => write!(f, "{}", err),
            TetherError::NotConnected => write!(f, "Not connected"),
            TetherError::Store { message } => write!(f, "Store error: {}", message),
            TetherError::Config { message } => write!(f, "Config error: {}", message),
        }
    }
}

impl std::error::Error for TetherError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TetherError::Transport(err) => Some(err),
            TetherError::Protocol(err) => Some(err),
            TetherError::Operation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TransportError> for TetherError {
    fn from(err: TransportError) -> Self {
        TetherError::Transport(err)
    }
}

impl From<ProtocolAnomaly> for TetherError {
    fn from(err: ProtocolAnomaly) -> Self {
        TetherError::Protocol(err)
    }
}

impl From<OperationError> for TetherError {
    fn from(err: OperationError) -> Self {
        TetherError::Operation(err)
    }
}

impl From<std::io::Error> for TetherError {
    fn from(err: std::io::Error) -> Self {
        TetherError::Store {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for TetherError {
    fn from(err: serde_json::Error) -> Self {
        TetherError::Store {
            message: err.to_string(),
        }
    }
}
