//! Blob store abstraction for profile pictures and album media.
//!
//! The interaction services only need public URLs for avatars; uploads and
//! removals are performed by the content-management layer.

use std::path::PathBuf;
use std::sync::Arc;

use url::Url;

use crate::{AppError, AppResult};

/// Blob store operations.
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `path` and return the stored path.
    async fn upload(&self, path: &str, data: &[u8]) -> AppResult<String>;

    /// Remove every path in `paths`. Missing files are ignored.
    async fn remove(&self, paths: &[String]) -> AppResult<()>;

    /// Public URL for a stored path, if the path can be addressed.
    fn public_url(&self, path: &str) -> Option<Url>;
}

/// Shared blob store handle.
pub type BlobStoreService = Arc<dyn BlobStore>;

/// Local filesystem blob store.
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: Url,
}

impl LocalStorage {
    /// Create a new local storage backend.
    pub fn new(base_path: impl Into<PathBuf>, base_url: &str) -> AppResult<Self> {
        // A trailing slash makes `Url::join` append instead of replacing the last segment.
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .map_err(|e| AppError::Config(format!("Invalid storage base URL: {e}")))?;

        Ok(Self {
            base_path: base_path.into(),
            base_url,
        })
    }

    fn resolve(&self, path: &str) -> AppResult<PathBuf> {
        let relative = path.trim_start_matches('/');
        if relative.split('/').any(|segment| segment == "..") {
            return Err(AppError::Storage(format!("Path escapes storage root: {path}")));
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait::async_trait]
impl BlobStore for LocalStorage {
    async fn upload(&self, path: &str, data: &[u8]) -> AppResult<String> {
        let target = self.resolve(path)?;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Storage(format!("Failed to create directory: {e}")))?;
        }

        tokio::fs::write(&target, data)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write file: {e}")))?;

        tracing::debug!(path = %path, size = data.len(), "Stored blob");
        Ok(path.trim_start_matches('/').to_string())
    }

    async fn remove(&self, paths: &[String]) -> AppResult<()> {
        for path in paths {
            let target = self.resolve(path)?;
            match tokio::fs::remove_file(&target).await {
                Ok(()) => tracing::debug!(path = %path, "Removed blob"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(AppError::Storage(format!("Failed to delete file: {e}")));
                }
            }
        }
        Ok(())
    }

    fn public_url(&self, path: &str) -> Option<Url> {
        let relative = path.trim_start_matches('/');
        if relative.is_empty() {
            return None;
        }
        self.base_url.join(relative).ok()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::IdGenerator;

    fn storage(dir: &str) -> LocalStorage {
        let base = std::env::temp_dir().join(dir);
        LocalStorage::new(base, "http://localhost:3000/files").unwrap()
    }

    #[test]
    fn test_public_url() {
        let storage = storage("showcase-url-test");
        let url = storage.public_url("avatars/u1.png").unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/files/avatars/u1.png");
        assert!(storage.public_url("").is_none());
    }

    #[test]
    fn test_rejects_parent_segments() {
        let storage = storage("showcase-escape-test");
        assert!(matches!(
            storage.resolve("../etc/passwd"),
            Err(AppError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_upload_then_remove() {
        let storage = storage(&format!("showcase-blob-{}", IdGenerator::new().generate()));
        let stored = storage.upload("albums/a1/cover.jpg", b"jpeg").await.unwrap();
        assert_eq!(stored, "albums/a1/cover.jpg");
        assert!(storage.resolve(&stored).unwrap().exists());

        storage.remove(&[stored.clone(), "missing.jpg".to_string()]).await.unwrap();
        assert!(!storage.resolve(&stored).unwrap().exists());
    }
}
