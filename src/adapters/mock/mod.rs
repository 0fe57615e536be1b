//! Test doubles for the traits in `crate::traits`, usable without network
//! or filesystem access.
//!
//! - [`MockFrameSink`] - records outbound frames, settable connection status
//! - [`MockHttpClient`] - HTTP client with configurable responses
//! - [`InMemoryStore`] - conversation store in a map
//! - [`MockFileResolver`] - file resolution from a table

pub mod files;
pub mod frame_sink;
pub mod http;
pub mod store;

pub use files::MockFileResolver;
pub use frame_sink::MockFrameSink;
pub use http::{MockHttpClient, MockResponse};
pub use store::InMemoryStore;
