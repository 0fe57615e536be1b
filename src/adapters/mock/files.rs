//! Mock file resolver for testing.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::traits::{FileResolver, ResolveError};

/// Resolves ids from a table; unknown ids are `NotFound`.
#[derive(Debug, Clone, Default)]
pub struct MockFileResolver {
    files: Arc<Mutex<HashMap<String, Result<Bytes, ResolveError>>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockFileResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, file_id: &str, data: impl Into<Bytes>) {
        self.files
            .lock()
            .unwrap()
            .insert(file_id.to_string(), Ok(data.into()));
    }

    pub fn add_failure(&self, file_id: &str, err: ResolveError) {
        self.files
            .lock()
            .unwrap()
            .insert(file_id.to_string(), Err(err));
    }

    /// Ids resolved so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FileResolver for MockFileResolver {
    async fn resolve_file(&self, file_id: &str) -> Result<Bytes, ResolveError> {
        self.calls.lock().unwrap().push(file_id.to_string());
        self.files
            .lock()
            .unwrap()
            .get(file_id)
            .cloned()
            .unwrap_or_else(|| Err(ResolveError::NotFound(file_id.to_string())))
    }
}
