//! Uploads referenced by question definitions and answers.
//!
//! Image normalization happens upstream. Here uploads are checked for size
//! and, for images, extension before being stored under a generated key.

use serde::Serialize;
use survey_common::{AppError, AppResult, IdGenerator, MediaKind, MediaStorageService};

/// Largest accepted image upload.
pub const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

/// Largest accepted file upload.
pub const MAX_FILE_SIZE: usize = 50 * 1024 * 1024;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "tif", "tiff"];

/// A stored upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedMedia {
    pub url: String,
    pub size: u64,
}

/// Service for uploads.
#[derive(Clone)]
pub struct MediaService {
    storage: MediaStorageService,
    id_gen: IdGenerator,
}

impl MediaService {
    /// Create a new media service.
    #[must_use]
    pub const fn new(storage: MediaStorageService) -> Self {
        Self {
            storage,
            id_gen: IdGenerator::new(),
        }
    }

    /// Store an uploaded image.
    pub async fn upload_image(&self, original_name: &str, data: &[u8]) -> AppResult<UploadedMedia> {
        let extension = original_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        if !IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            return Err(AppError::BadRequest(format!(
                "Unsupported image type: {original_name}"
            )));
        }
        self.upload(MediaKind::Image, original_name, data, MAX_IMAGE_SIZE)
            .await
    }

    /// Store an uploaded file.
    pub async fn upload_file(&self, original_name: &str, data: &[u8]) -> AppResult<UploadedMedia> {
        self.upload(MediaKind::File, original_name, data, MAX_FILE_SIZE)
            .await
    }

    async fn upload(
        &self,
        kind: MediaKind,
        original_name: &str,
        data: &[u8],
        max_size: usize,
    ) -> AppResult<UploadedMedia> {
        if data.is_empty() {
            return Err(AppError::BadRequest("Empty upload".to_string()));
        }
        if data.len() > max_size {
            return Err(AppError::BadRequest(format!(
                "Upload exceeds {} MiB",
                max_size / (1024 * 1024)
            )));
        }

        let key = self.id_gen.generate_media_key(original_name);
        let stored = self.storage.save(kind, &key, data).await?;

        tracing::debug!(key = %stored.key, size = stored.size, "Upload stored");
        Ok(UploadedMedia {
            url: stored.url,
            size: stored.size,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use survey_common::LocalMediaStorage;
    use survey_common::config::StorageConfig;

    fn service() -> (MediaService, std::path::PathBuf) {
        let root = std::env::temp_dir().join(format!("survey-media-{}", IdGenerator::new().generate()));
        let config = StorageConfig {
            url_host: "http://localhost:3000".to_string(),
            static_dir: root.join("static"),
            file_dir: root.join("file"),
            export_dir: root.join("xlsx"),
        };
        (
            MediaService::new(Arc::new(LocalMediaStorage::new(&config))),
            root,
        )
    }

    #[tokio::test]
    async fn test_upload_image_keeps_extension() {
        let (service, root) = service();

        let uploaded = service.upload_image("photo.PNG", b"png-bytes").await.unwrap();

        assert!(uploaded.url.starts_with("http://localhost:3000/public/static/"));
        assert!(uploaded.url.ends_with(".png"));
        assert_eq!(uploaded.size, 9);

        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn test_upload_rejects_non_images_and_empty_files() {
        let (service, root) = service();

        assert!(matches!(
            service.upload_image("notes.txt", b"text").await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            service.upload_file("empty.pdf", b"").await,
            Err(AppError::BadRequest(_))
        ));

        let _ = std::fs::remove_dir_all(root);
    }
}
