//! Transport layer: the single duplex socket to the backend.
//!
//! [`client`] owns the socket inside one spawned task and hosts the
//! [`reconnect::Reconnector`]; [`messages`] defines the wire frames.
//! Connection state is published on a `watch` channel and mutated only
//! by that task.

pub mod client;
pub mod messages;
pub mod reconnect;

pub use client::{resolve_endpoints, Endpoints, TransportConfig, TransportEvent, WsClient, WsHandle};
pub use messages::{IncomingFrame, OutgoingFrame};
pub use reconnect::{BackoffPolicy, ReconnectPhase, Reconnector};

/// Socket status as seen by the rest of the session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-lifetime connection state, owned by the transport task
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub last_error: Option<String>,
    /// Failed attempts since the last connection that outlived the grace window
    pub consecutive_failures: u32,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }
}

/// Why a socket closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Close frame from the server, or the stream ended cleanly
    Normal,
    /// Socket error or refused connection
    Error,
    /// Connect attempt timed out
    Timeout,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::Normal => "normal",
            CloseReason::Error => "error",
            CloseReason::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
