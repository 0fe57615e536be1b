//! Concrete implementations of the traits in `crate::traits`.
//!
//! - [`ReqwestHttpClient`] - HTTP client using reqwest
//! - [`JsonFileStore`] - one JSON file per conversation
//! - [`FsFileResolver`] - file ids as paths under a root directory
//!
//! The production [`crate::traits::FrameSink`] is
//! [`crate::websocket::WsHandle`]. Test doubles live in [`mock`].

pub mod fs_files;
pub mod json_store;
pub mod mock;
pub mod reqwest_http;

pub use fs_files::FsFileResolver;
pub use json_store::JsonFileStore;
pub use mock::{InMemoryStore, MockFileResolver, MockFrameSink, MockHttpClient};
pub use reqwest_http::ReqwestHttpClient;
