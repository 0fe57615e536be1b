//! Outbound frame sink abstraction.
//!
//! Controllers never talk to the socket directly; they hand frames to a
//! [`FrameSink`]. The production sink is [`crate::websocket::WsHandle`];
//! tests use [`crate::adapters::mock::MockFrameSink`].

use crate::websocket::messages::OutgoingFrame;
use crate::websocket::ConnectionStatus;

/// What happened to an outbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Queued on the live connection
    Sent,
    /// Socket not connected; the frame was dropped and a warning logged
    NotConnected,
}

impl SendOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, SendOutcome::Sent)
    }
}

/// Trait for handing frames to the transport.
///
/// `send` never fails with an error: a disconnected transport drops the
/// frame, logs a warning and reports [`SendOutcome::NotConnected`] so the
/// caller can show "not sent" instead of crashing.
pub trait FrameSink: Send + Sync {
    /// Send a frame to the backend.
    fn send(&self, frame: OutgoingFrame) -> SendOutcome;

    /// Current connection status.
    fn status(&self) -> ConnectionStatus;

    /// Convenience check for `status() == Connected`.
    fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Offline;

    impl FrameSink for Offline {
        fn send(&self, _frame: OutgoingFrame) -> SendOutcome {
            SendOutcome::NotConnected
        }

        fn status(&self) -> ConnectionStatus {
            ConnectionStatus::Disconnected
        }
    }

    #[test]
    fn test_default_is_connected() {
        assert!(!Offline.is_connected());
        assert!(SendOutcome::Sent.is_sent());
        assert!(!SendOutcome::NotConnected.is_sent());
    }
}
