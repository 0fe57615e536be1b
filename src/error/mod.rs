//! Error handling for the session core.
//!
//! | Category | Examples | Handling |
//! |----------|----------|----------|
//! | Transport | socket error, close, connect timeout | reconnector retries, status indicator only |
//! | Protocol | unknown id, frame after terminal state, malformed payload | logged, frame dropped |
//! | Operation | approval already resolved, missing elicitation fields | returned to the caller |
//! | NotConnected | send while disconnected | "not sent" state, caller decides on retry |
//!
//! Protocol-layer errors are absorbed at the lowest layer that can make a
//! safe local decision. Only user-facing outcomes travel upward.

mod category;
mod operation;
mod protocol;
mod result;
mod tether_error;
mod transport;

pub use category::ErrorCategory;
pub use operation::OperationError;
pub use protocol::ProtocolAnomaly;
pub use result::TetherResult;
pub use tether_error::TetherError;
pub use transport::TransportError;
