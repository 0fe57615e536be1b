//! In-memory conversation store for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::models::ConversationEntry;
use crate::traits::{ConversationStore, StoreError};

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    conversations: Arc<Mutex<HashMap<String, Vec<ConversationEntry>>>>,
    fail_saves: Arc<Mutex<bool>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a conversation.
    pub fn insert(&self, id: &str, entries: Vec<ConversationEntry>) {
        self.conversations
            .lock()
            .unwrap()
            .insert(id.to_string(), entries);
    }

    pub fn get(&self, id: &str) -> Option<Vec<ConversationEntry>> {
        self.conversations.lock().unwrap().get(id).cloned()
    }

    /// Make subsequent saves fail with an IO error.
    pub fn set_fail_saves(&self, fail: bool) {
        *self.fail_saves.lock().unwrap() = fail;
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn load_conversation(&self, id: &str) -> Result<Vec<ConversationEntry>, StoreError> {
        self.get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn save_conversation(
        &self,
        id: &str,
        entries: &[ConversationEntry],
    ) -> Result<(), StoreError> {
        if *self.fail_saves.lock().unwrap() {
            return Err(StoreError::Io("Mock save failure".to_string()));
        }
        self.insert(id, entries.to_vec());
        Ok(())
    }
}
