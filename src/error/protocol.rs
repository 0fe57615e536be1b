//! Protocol anomalies.
//!
//! Frames that are well-formed on the wire but make no sense against the
//! local state (unknown ids, frames after a terminal state, deltas with no
//! open stream), plus payloads that fail to parse at all. None of these are
//! ever returned to a caller; they are reported through [`ProtocolAnomaly::report`]
//! and the frame is dropped.

use std::fmt;

use tracing::{debug, error, warn};

/// A frame that cannot be applied to local state.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolAnomaly {
    /// Payload could not be decoded into a known frame.
    MalformedFrame { message: String, raw: String },

    /// Frame references a tool call that was never started.
    UnknownToolCall { tool_call_id: String, frame: &'static str },

    /// Frame arrived for a tool call that is already completed or failed.
    AfterTerminal {
        tool_call_id: String,
        status: String,
        frame: &'static str,
    },

    /// Late frame for a tool call that was failed locally by a stop.
    /// Expected after a cancellation; only logged at debug level.
    AfterCancel { tool_call_id: String, frame: &'static str },

    /// An entry with this id already exists.
    DuplicateId { kind: &'static str, id: String },

    /// Stream delta or completion with no assistant entry open.
    NoOpenStream { frame: &'static str },

    /// Frame references an approval that does not exist or is already resolved.
    UnknownApproval { tool_call_id: String },

    /// Frame references an unknown user message.
    UnknownMessage { client_id: String },
}

impl ProtocolAnomaly {
    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            ProtocolAnomaly::MalformedFrame { .. } => "E_PROTO_MALFORMED",
            ProtocolAnomaly::UnknownToolCall { .. } => "E_PROTO_UNKNOWN_TOOL",
            ProtocolAnomaly::AfterTerminal { .. } => "E_PROTO_AFTER_TERMINAL",
            ProtocolAnomaly::AfterCancel { .. } => "E_PROTO_AFTER_CANCEL",
            ProtocolAnomaly::DuplicateId { .. } => "E_PROTO_DUPLICATE",
            ProtocolAnomaly::NoOpenStream { .. } => "E_PROTO_NO_STREAM",
            ProtocolAnomaly::UnknownApproval { .. } => "E_PROTO_UNKNOWN_APPROVAL",
            ProtocolAnomaly::UnknownMessage { .. } => "E_PROTO_UNKNOWN_MESSAGE",
        }
    }

    /// Log the anomaly. The session continues regardless.
    pub fn report(&self) {
        match self {
            ProtocolAnomaly::AfterCancel { .. } => {
                debug!(code = self.error_code(), "{}", self);
            }
            ProtocolAnomaly::MalformedFrame { .. } => {
                error!(code = self.error_code(), "{}", self);
            }
            _ => {
                warn!(code = self.error_code(), "{}", self);
            }
        }
    }
}

impl fmt::Display for ProtocolAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolAnomaly::MalformedFrame { message, raw } => {
                // Large payloads are truncated so a bad frame doesn't flood the log
                let preview: String = raw.chars().take(200).collect();
                write!(f, "Dropping malformed frame ({}): {}", message, preview)
            }
            ProtocolAnomaly::UnknownToolCall { tool_call_id, frame } => {
                write!(f, "{} for unknown tool call {}", frame, tool_call_id)
            }
            ProtocolAnomaly::AfterTerminal {
                tool_call_id,
                status,
                frame,
            } => write!(
                f,
                "{} for tool call {} ignored, already {}",
                frame, tool_call_id, status
            ),
            ProtocolAnomaly::AfterCancel { tool_call_id, frame } => write!(
                f,
                "Late {} for cancelled tool call {} discarded",
                frame, tool_call_id
            ),
            ProtocolAnomaly::DuplicateId { kind, id } => {
                write!(f, "Duplicate {} id {} ignored", kind, id)
            }
            ProtocolAnomaly::NoOpenStream { frame } => {
                write!(f, "{} with no open assistant stream ignored", frame)
            }
            ProtocolAnomaly::UnknownApproval { tool_call_id } => {
                write!(f, "No pending approval for tool call {}", tool_call_id)
            }
            ProtocolAnomaly::UnknownMessage { client_id } => {
                write!(f, "No user message with client id {}", client_id)
            }
        }
    }
}

impl std::error::Error for ProtocolAnomaly {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_frame_preview_truncated() {
        let raw = "x".repeat(1000);
        let anomaly = ProtocolAnomaly::MalformedFrame {
            message: "expected value".to_string(),
            raw,
        };
        let text = anomaly.to_string();
        assert!(text.len() < 300);
        assert!(text.starts_with("Dropping malformed frame (expected value)"));
    }

    #[test]
    fn test_after_terminal_display() {
        let anomaly = ProtocolAnomaly::AfterTerminal {
            tool_call_id: "42".to_string(),
            status: "completed".to_string(),
            frame: "tool_call_progress",
        };
        assert_eq!(
            anomaly.to_string(),
            "tool_call_progress for tool call 42 ignored, already completed"
        );
        assert_eq!(anomaly.error_code(), "E_PROTO_AFTER_TERMINAL");
    }

    #[test]
    fn test_report_does_not_panic() {
        ProtocolAnomaly::NoOpenStream {
            frame: "stream_delta",
        }
        .report();
        ProtocolAnomaly::AfterCancel {
            tool_call_id: "1".to_string(),
            frame: "tool_call_result",
        }
        .report();
    }
}
