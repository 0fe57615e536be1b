//! File reference resolution abstraction.
//!
//! Called from the outbound path only, before a user message that
//! references a file is sent.

use async_trait::async_trait;
use bytes::Bytes;

/// File resolution errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveError {
    /// No file with this id
    NotFound(String),
    /// Reading the file failed
    Unreadable(String),
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolveError::NotFound(id) => write!(f, "file {} not found", id),
            ResolveError::Unreadable(msg) => write!(f, "could not read file: {}", msg),
        }
    }
}

impl std::error::Error for ResolveError {}

/// Trait for turning a file reference into bytes.
#[async_trait]
pub trait FileResolver: Send + Sync {
    async fn resolve_file(&self, file_id: &str) -> Result<Bytes, ResolveError>;
}
