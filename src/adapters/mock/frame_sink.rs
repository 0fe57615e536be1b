//! Mock frame sink for testing.

use std::sync::{Arc, Mutex};

use crate::traits::{FrameSink, SendOutcome};
use crate::websocket::messages::OutgoingFrame;
use crate::websocket::ConnectionStatus;

/// Records sent frames; connection status is settable.
///
/// Frames sent while not connected are counted as dropped and not recorded,
/// the same as the real transport.
#[derive(Debug, Clone)]
pub struct MockFrameSink {
    sent: Arc<Mutex<Vec<OutgoingFrame>>>,
    dropped: Arc<Mutex<usize>>,
    status: Arc<Mutex<ConnectionStatus>>,
}

impl MockFrameSink {
    /// A connected sink.
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            dropped: Arc::new(Mutex::new(0)),
            status: Arc::new(Mutex::new(ConnectionStatus::Connected)),
        }
    }

    pub fn disconnected() -> Self {
        let sink = Self::new();
        sink.set_status(ConnectionStatus::Disconnected);
        sink
    }

    pub fn set_status(&self, status: ConnectionStatus) {
        *self.status.lock().unwrap() = status;
    }

    pub fn sent(&self) -> Vec<OutgoingFrame> {
        self.sent.lock().unwrap().clone()
    }

    /// Take the frames sent so far, leaving the log empty.
    pub fn take_sent(&self) -> Vec<OutgoingFrame> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }

    pub fn dropped(&self) -> usize {
        *self.dropped.lock().unwrap()
    }
}

impl Default for MockFrameSink {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSink for MockFrameSink {
    fn send(&self, frame: OutgoingFrame) -> SendOutcome {
        if *self.status.lock().unwrap() != ConnectionStatus::Connected {
            *self.dropped.lock().unwrap() += 1;
            return SendOutcome::NotConnected;
        }
        self.sent.lock().unwrap().push(frame);
        SendOutcome::Sent
    }

    fn status(&self) -> ConnectionStatus {
        *self.status.lock().unwrap()
    }
}
