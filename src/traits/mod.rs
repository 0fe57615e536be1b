//! Trait abstractions at the session's seams.
//!
//! - [`FrameSink`] - outbound frames to the transport
//! - [`HttpClient`] - GET requests for the liveness probe
//! - [`ConversationStore`] - opaque conversation persistence
//! - [`FileResolver`] - file reference resolution before send
//! - [`AutoApproveSource`] - auto-approve setting, read at decision time

pub mod files;
pub mod http;
pub mod settings;
pub mod store;
pub mod websocket;

pub use files::{FileResolver, ResolveError};
pub use http::{HttpClient, HttpError, Response};
pub use settings::{AutoApproveSource, AutoApproveToggle};
pub use store::{ConversationStore, StoreError};
pub use websocket::{FrameSink, SendOutcome};
