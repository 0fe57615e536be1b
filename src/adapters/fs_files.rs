//! Filesystem file resolver: file ids are paths relative to a root.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use crate::traits::{FileResolver, ResolveError};

#[derive(Debug, Clone)]
pub struct FsFileResolver {
    root: PathBuf,
}

impl FsFileResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, file_id: &str) -> Result<PathBuf, ResolveError> {
        let relative = Path::new(file_id);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if file_id.is_empty() || escapes {
            return Err(ResolveError::NotFound(file_id.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl FileResolver for FsFileResolver {
    async fn resolve_file(&self, file_id: &str) -> Result<Bytes, ResolveError> {
        let path = self.path_for(file_id)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ResolveError::NotFound(file_id.to_string()))
            }
            Err(e) => Err(ResolveError::Unreadable(format!("{}: {}", file_id, e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolves_relative_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"hello").unwrap();
        let resolver = FsFileResolver::new(dir.path());
        let bytes = resolver.resolve_file("notes.txt").await.unwrap();
        assert_eq!(&bytes[..], b"hello");
    }

    #[tokio::test]
    async fn test_missing_and_escaping_ids() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = FsFileResolver::new(dir.path());
        assert_eq!(
            resolver.resolve_file("missing.txt").await,
            Err(ResolveError::NotFound("missing.txt".to_string()))
        );
        assert!(resolver.resolve_file("../etc/passwd").await.is_err());
        assert!(resolver.resolve_file("/etc/passwd").await.is_err());
    }
}
