//! JSON-file conversation store.
//!
//! One pretty-printed `<id>.json` file per conversation under a data
//! directory (by default the platform data dir, `tether/conversations`).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::models::ConversationEntry;
use crate::traits::{ConversationStore, StoreError};

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store under the platform data directory, if one exists
    pub fn default_location() -> Option<Self> {
        dirs::data_dir().map(|dir| Self::new(dir.join("tether").join("conversations")))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, StoreError> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::Io(format!("invalid conversation id '{}'", id)));
        }
        Ok(self.dir.join(format!("{}.json", id)))
    }
}

#[async_trait]
impl ConversationStore for JsonFileStore {
    async fn load_conversation(&self, id: &str) -> Result<Vec<ConversationEntry>, StoreError> {
        let path = self.path_for(id)?;
        let json = match tokio::fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.to_string()))
            }
            Err(e) => return Err(StoreError::Io(format!("{:?}: {}", path, e))),
        };
        let entries: Vec<ConversationEntry> =
            serde_json::from_str(&json).map_err(|e| StoreError::Serialization(e.to_string()))?;
        debug!("Loaded {} entries from {:?}", entries.len(), path);
        Ok(entries)
    }

    async fn save_conversation(
        &self,
        id: &str,
        entries: &[ConversationEntry],
    ) -> Result<(), StoreError> {
        let path = self.path_for(id)?;
        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StoreError::Io(format!("{:?}: {}", self.dir, e)))?;

        // Write then rename so a crash never leaves a half-written file
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| StoreError::Io(format!("{:?}: {}", tmp, e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StoreError::Io(format!("{:?}: {}", path, e)))?;
        debug!("Saved {} entries to {:?}", entries.len(), path);
        Ok(())
    }
}
