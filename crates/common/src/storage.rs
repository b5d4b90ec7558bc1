//! Media storage for uploaded images, uploaded files and generated exports.
//!
//! Stored media is referenced by public URL of the form
//! `{url_host}/public/{static|file|xlsx}/{key}`. The local backend maps such a
//! URL back to a file under the matching root directory.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::config::StorageConfig;
use crate::{AppError, AppResult};

/// Kind of stored media, each with its own root directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Question, option and answer images.
    Image,
    /// Answer file uploads.
    File,
    /// Generated answer exports.
    Export,
}

impl MediaKind {
    /// URL path segment under `/public/`.
    #[must_use]
    pub const fn url_segment(self) -> &'static str {
        match self {
            Self::Image => "static",
            Self::File => "file",
            Self::Export => "xlsx",
        }
    }
}

/// Stored media metadata.
#[derive(Debug, Clone)]
pub struct StoredMedia {
    /// Storage key relative to the kind's root.
    pub key: String,
    /// Public URL to reference the media.
    pub url: String,
    /// Size in bytes.
    pub size: u64,
}

/// Media storage backend.
#[async_trait::async_trait]
pub trait MediaStorage: Send + Sync {
    /// Write media under `key`, replacing any existing file.
    async fn save(&self, kind: MediaKind, key: &str, data: &[u8]) -> AppResult<StoredMedia>;

    /// Remove the file behind a stored URL.
    ///
    /// Returns `false` when the URL is not ours or the file is already gone.
    /// Any other filesystem failure is an [`AppError::Io`].
    async fn remove(&self, kind: MediaKind, url: &str) -> AppResult<bool>;

    /// Public URL for a key.
    fn public_url(&self, kind: MediaKind, key: &str) -> String;

    /// Local path behind a stored URL, if it points into our storage.
    fn resolve(&self, kind: MediaKind, url: &str) -> Option<PathBuf>;
}

/// Shared media storage handle.
pub type MediaStorageService = Arc<dyn MediaStorage>;

/// Local filesystem media storage.
#[derive(Debug, Clone)]
pub struct LocalMediaStorage {
    url_host: String,
    static_dir: PathBuf,
    file_dir: PathBuf,
    export_dir: PathBuf,
}

impl LocalMediaStorage {
    /// Create a storage over the configured roots.
    #[must_use]
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            url_host: config.url_host.trim_end_matches('/').to_string(),
            static_dir: config.static_dir.clone(),
            file_dir: config.file_dir.clone(),
            export_dir: config.export_dir.clone(),
        }
    }

    fn root(&self, kind: MediaKind) -> &Path {
        match kind {
            MediaKind::Image => &self.static_dir,
            MediaKind::File => &self.file_dir,
            MediaKind::Export => &self.export_dir,
        }
    }

    fn url_prefix(&self, kind: MediaKind) -> String {
        format!("{}/public/{}/", self.url_host, kind.url_segment())
    }
}

/// A key must stay inside its root.
fn is_safe_key(key: &str) -> bool {
    !key.is_empty()
        && Path::new(key)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

#[async_trait::async_trait]
impl MediaStorage for LocalMediaStorage {
    async fn save(&self, kind: MediaKind, key: &str, data: &[u8]) -> AppResult<StoredMedia> {
        if !is_safe_key(key) {
            return Err(AppError::BadRequest(format!("Invalid media key: {key}")));
        }

        let path = self.root(kind).join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Io(format!("Failed to create directory: {e}")))?;
        }

        tokio::fs::write(&path, data)
            .await
            .map_err(|e| AppError::Io(format!("Failed to write {}: {e}", path.display())))?;

        Ok(StoredMedia {
            key: key.to_string(),
            url: self.public_url(kind, key),
            size: data.len() as u64,
        })
    }

    async fn remove(&self, kind: MediaKind, url: &str) -> AppResult<bool> {
        let Some(path) = self.resolve(kind, url) else {
            if !url.is_empty() {
                tracing::debug!(url = %url, "Skipping media outside local storage");
            }
            return Ok(false);
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::Io(format!(
                "Failed to delete {}: {e}",
                path.display()
            ))),
        }
    }

    fn public_url(&self, kind: MediaKind, key: &str) -> String {
        format!("{}{key}", self.url_prefix(kind))
    }

    fn resolve(&self, kind: MediaKind, url: &str) -> Option<PathBuf> {
        let key = url.strip_prefix(&self.url_prefix(kind))?;
        is_safe_key(key).then(|| self.root(kind).join(key))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn storage(root: &Path) -> LocalMediaStorage {
        LocalMediaStorage::new(&StorageConfig {
            url_host: "https://survey.example/".to_string(),
            static_dir: root.join("static"),
            file_dir: root.join("file"),
            export_dir: root.join("xlsx"),
        })
    }

    #[test]
    fn test_resolve_strips_host_and_kind() {
        let s = storage(Path::new("/srv"));

        assert_eq!(
            s.resolve(MediaKind::Image, "https://survey.example/public/static/a.png"),
            Some(PathBuf::from("/srv/static/a.png"))
        );
        assert_eq!(
            s.resolve(MediaKind::File, "https://survey.example/public/file/doc.pdf"),
            Some(PathBuf::from("/srv/file/doc.pdf"))
        );
        // Wrong kind, foreign host, traversal and empty key
        assert!(s.resolve(MediaKind::File, "https://survey.example/public/static/a.png").is_none());
        assert!(s.resolve(MediaKind::Image, "https://cdn.other/public/static/a.png").is_none());
        assert!(s.resolve(MediaKind::Image, "https://survey.example/public/static/../x").is_none());
        assert!(s.resolve(MediaKind::Image, "https://survey.example/public/static/").is_none());
        assert!(s.resolve(MediaKind::Image, "").is_none());
    }

    #[tokio::test]
    async fn test_save_then_remove() {
        let root = std::env::temp_dir().join(format!("survey-storage-{}", ulid::Ulid::new()));
        let s = storage(&root);

        let stored = s.save(MediaKind::Image, "q1.png", b"png").await.unwrap();
        assert_eq!(stored.url, "https://survey.example/public/static/q1.png");
        assert!(root.join("static/q1.png").exists());

        assert!(s.remove(MediaKind::Image, &stored.url).await.unwrap());
        assert!(!root.join("static/q1.png").exists());

        // Already gone is not an error
        assert!(!s.remove(MediaKind::Image, &stored.url).await.unwrap());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_save_rejects_traversal() {
        let s = storage(Path::new("/nonexistent"));
        let err = s.save(MediaKind::File, "../escape", b"x").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
