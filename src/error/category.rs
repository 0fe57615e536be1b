//! Error category classification.
//!
//! Maps every error the session core can produce onto one of the four
//! handling classes: transport faults, protocol anomalies, user-facing
//! operation failures and local send failures. The category decides whether
//! anything is retried and whether the user ever sees it.

use std::fmt;

/// High-level categorization of errors for handling decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Socket error, close, connect timeout.
    /// Recovered by the reconnector; surfaced only as a status indicator.
    Transport,

    /// Frame referencing an unknown id, frame after a terminal state,
    /// malformed payload. Logged and ignored.
    Protocol,

    /// Tool failure, rejected approval, invalid elicitation input.
    /// Shown to the user inside the conversation.
    Operation,

    /// Outbound frame attempted while disconnected.
    /// The caller decides whether to retry the user-level action.
    NotConnected,

    /// Filesystem or store errors.
    System,

    /// Invalid settings (bad backend URL and similar).
    Configuration,
}

impl ErrorCategory {
    /// Returns true if the core recovers from errors in this category on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCategory::Transport)
    }

    /// Returns true if errors in this category should reach the user.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            ErrorCategory::Operation | ErrorCategory::NotConnected | ErrorCategory::Configuration
        )
    }

    /// Returns a short label for the category suitable for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Transport => "transport",
            ErrorCategory::Protocol => "protocol",
            ErrorCategory::Operation => "operation",
            ErrorCategory::NotConnected => "not_connected",
            ErrorCategory::System => "system",
            ErrorCategory::Configuration => "configuration",
        }
    }

    /// Returns suggested recovery actions for this category.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorCategory::Transport => "Reconnecting automatically",
            ErrorCategory::Protocol => "No action needed",
            ErrorCategory::Operation => "Review the conversation for details",
            ErrorCategory::NotConnected => "Wait for the connection to return and send again",
            ErrorCategory::System => "Check file permissions and available disk space",
            ErrorCategory::Configuration => "Check your configuration settings",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transport_is_retryable() {
        assert!(ErrorCategory::Transport.is_retryable());
        assert!(!ErrorCategory::Protocol.is_retryable());
        assert!(!ErrorCategory::Operation.is_retryable());
        assert!(!ErrorCategory::NotConnected.is_retryable());
        assert!(!ErrorCategory::System.is_retryable());
        assert!(!ErrorCategory::Configuration.is_retryable());
    }

    #[test]
    fn test_protocol_errors_stay_hidden() {
        assert!(!ErrorCategory::Protocol.is_user_visible());
        assert!(!ErrorCategory::Transport.is_user_visible());
        assert!(ErrorCategory::Operation.is_user_visible());
        assert!(ErrorCategory::NotConnected.is_user_visible());
    }

    #[test]
    fn test_category_display() {
        assert_eq!(ErrorCategory::NotConnected.to_string(), "not_connected");
        assert_eq!(format!("{}", ErrorCategory::Protocol), "protocol");
    }
}
