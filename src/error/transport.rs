//! Transport-level error types.
//!
//! Everything that can go wrong between the client and the backend socket or
//! health endpoint. These never reach the conversation log; the reconnector
//! absorbs them and the UI only sees the connection status.

use std::fmt;

/// Transport-specific error variants.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    /// The backend URL could not be turned into a socket URL.
    InvalidUrl { url: String, message: String },

    /// Opening the socket failed.
    ConnectionFailed { url: String, message: String },

    /// Opening the socket did not finish in time.
    Timeout { url: String, duration_secs: u64 },

    /// The socket reported an error after it was established.
    Socket { message: String },

    /// The backend closed the connection.
    Closed { reason: Option<String> },

    /// The connection task is gone (shutdown or panicked).
    TaskStopped,
}

impl TransportError {
    /// Check if this error is likely transient.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            TransportError::InvalidUrl { .. } | TransportError::TaskStopped
        )
    }

    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            TransportError::InvalidUrl { url, .. } => {
                format!("The backend address '{}' is not valid.", url)
            }
            TransportError::ConnectionFailed { .. } => {
                "Unable to reach the backend. Retrying in the background.".to_string()
            }
            TransportError::Timeout { duration_secs, .. } => format!(
                "The backend did not answer within {} seconds. Retrying in the background.",
                duration_secs
            ),
            TransportError::Socket { .. } | TransportError::Closed { .. } => {
                "Connection to the backend was lost. Reconnecting.".to_string()
            }
            TransportError::TaskStopped => "The connection has been shut down.".to_string(),
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            TransportError::InvalidUrl { .. } => "E_TRANSPORT_URL",
            TransportError::ConnectionFailed { .. } => "E_TRANSPORT_CONN",
            TransportError::Timeout { .. } => "E_TRANSPORT_TIMEOUT",
            TransportError::Socket { .. } => "E_TRANSPORT_SOCKET",
            TransportError::Closed { .. } => "E_TRANSPORT_CLOSED",
            TransportError::TaskStopped => "E_TRANSPORT_STOPPED",
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::InvalidUrl { url, message } => {
                write!(f, "Invalid URL '{}': {}", url, message)
            }
            TransportError::ConnectionFailed { url, message } => {
                write!(f, "Connection to {} failed: {}", url, message)
            }
            TransportError::Timeout { url, duration_secs } => {
                write!(f, "Connection to {} timed out after {}s", url, duration_secs)
            }
            TransportError::Socket { message } => write!(f, "Socket error: {}", message),
            TransportError::Closed { reason } => match reason {
                Some(r) => write!(f, "Connection closed: {}", r),
                None => write!(f, "Connection closed"),
            },
            TransportError::TaskStopped => write!(f, "Connection task stopped"),
        }
    }
}

impl std::error::Error for TransportError {}
