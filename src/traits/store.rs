//! Conversation persistence abstraction.
//!
//! The storage format is opaque to the session core; it only needs entries
//! back in the shape it saved them.

use async_trait::async_trait;

use crate::error::TetherError;
use crate::models::ConversationEntry;

/// Conversation store errors.
#[derive(Debug, Clone)]
pub enum StoreError {
    /// No conversation saved under this id
    NotFound(String),
    /// IO error
    Io(String),
    /// Serialization/deserialization error
    Serialization(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "Conversation '{}' not found", id),
            StoreError::Io(msg) => write!(f, "IO error: {}", msg),
            StoreError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<StoreError> for TetherError {
    fn from(err: StoreError) -> Self {
        TetherError::Store {
            message: err.to_string(),
        }
    }
}

/// Trait for loading and saving conversations.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Load the entries of a saved conversation.
    async fn load_conversation(&self, id: &str) -> Result<Vec<ConversationEntry>, StoreError>;

    /// Replace the saved entries of a conversation.
    async fn save_conversation(
        &self,
        id: &str,
        entries: &[ConversationEntry],
    ) -> Result<(), StoreError>;
}
