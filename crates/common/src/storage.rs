//! Media storage boundary.
//!
//! The engagement layer only ever stores the opaque reference a backend
//! returns; raw bytes never reach the database.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{AppError, AppResult, config::StorageSettings};

/// Largest accepted image upload.
pub const MAX_IMAGE_BYTES: u64 = 5_000_000;

/// Largest accepted video upload.
pub const MAX_VIDEO_BYTES: u64 = 50_000_000;

const IMAGE_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "wmv"];

/// The kind of media a content item is backed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Still image (jpeg/png).
    Image,
    /// Video clip (mp4/mov/avi/wmv).
    Video,
}

impl MediaKind {
    /// Maximum upload size for this kind.
    #[must_use]
    pub const fn max_bytes(self) -> u64 {
        match self {
            Self::Image => MAX_IMAGE_BYTES,
            Self::Video => MAX_VIDEO_BYTES,
        }
    }

    const fn allowed_extensions(self) -> &'static [&'static str] {
        match self {
            Self::Image => IMAGE_EXTENSIONS,
            Self::Video => VIDEO_EXTENSIONS,
        }
    }
}

/// Uploaded file metadata.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Storage key (path or object key).
    pub key: String,
    /// Public URL to access the file; this is the media reference.
    pub url: String,
    /// File size in bytes.
    pub size: u64,
    /// MIME content type.
    pub content_type: String,
    /// MD5 hash of the file.
    pub md5: String,
}

/// Storage backend trait.
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync {
    /// Upload a file.
    async fn upload(&self, key: &str, data: &[u8], content_type: &str)
    -> AppResult<UploadedFile>;

    /// Delete a file.
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Get the public URL for a key.
    fn public_url(&self, key: &str) -> String;

    /// The key behind a URL this backend served, if it is one of ours.
    fn key_of(&self, url: &str) -> Option<String> {
        let prefix = self.public_url("");
        url.strip_prefix(prefix.as_str())
            .filter(|key| !key.is_empty())
            .map(str::to_string)
    }
}

/// Check an upload against the rules for `kind`.
///
/// Both the file extension and the MIME subtype must name an allowed format,
/// and the payload must not exceed [`MediaKind::max_bytes`].
pub fn validate_upload(
    kind: MediaKind,
    original_name: &str,
    content_type: &str,
    size: u64,
) -> AppResult<()> {
    if size == 0 {
        return Err(AppError::UploadRejected("Empty file".to_string()));
    }
    if size > kind.max_bytes() {
        return Err(AppError::UploadRejected(format!(
            "File exceeds {} bytes",
            kind.max_bytes()
        )));
    }

    let allowed = kind.allowed_extensions();
    let extension = extension_of(original_name).map(str::to_lowercase);
    let extension_ok = extension
        .as_deref()
        .is_some_and(|ext| allowed.contains(&ext));

    let mime = content_type.to_lowercase();
    let mime_ok = allowed.iter().any(|ext| mime.contains(ext))
        || (kind == MediaKind::Video && mime == "video/quicktime")
        || (kind == MediaKind::Video && mime == "video/x-ms-wmv")
        || (kind == MediaKind::Video && mime == "video/x-msvideo");

    if extension_ok && mime_ok {
        Ok(())
    } else {
        Err(AppError::UploadRejected(match kind {
            MediaKind::Image => "Images only".to_string(),
            MediaKind::Video => "Videos only".to_string(),
        }))
    }
}

fn extension_of(name: &str) -> Option<&str> {
    name.rfind('.')
        .filter(|&pos| pos > 0 && pos < name.len() - 1)
        .map(|pos| &name[pos + 1..])
        .filter(|ext| ext.len() <= 10)
}

/// Local filesystem storage backend.
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new local storage backend.
    #[must_use]
    pub const fn new(base_path: PathBuf, base_url: String) -> Self {
        Self {
            base_path,
            base_url,
        }
    }

    /// Create a backend from the `[storage]` settings.
    #[must_use]
    pub fn from_settings(settings: &StorageSettings) -> Self {
        Self::new(settings.base_path.clone(), settings.base_url.clone())
    }
}

#[async_trait::async_trait]
impl StorageBackend for LocalStorage {
    async fn upload(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> AppResult<UploadedFile> {
        let path = self.base_path.join(key);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Internal(format!("Failed to create directory: {e}")))?;
        }

        tokio::fs::write(&path, data)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to write file: {e}")))?;

        let md5 = format!("{:x}", md5::compute(data));

        tracing::debug!(key = %key, size = data.len(), "Stored media file");

        Ok(UploadedFile {
            key: key.to_string(),
            url: self.public_url(key),
            size: data.len() as u64,
            content_type: content_type.to_string(),
            md5,
        })
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let path = self.base_path.join(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Internal(format!("Failed to delete file: {e}"))),
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }
}

/// Build a storage key of the form `{kind}/{yyyy/mm/dd}/{user}/{ts}_{uuid}.{ext}`.
#[must_use]
pub fn generate_storage_key(kind: MediaKind, user_id: &str, original_name: &str) -> String {
    let folder = match kind {
        MediaKind::Image => "posts",
        MediaKind::Video => "videos",
    };
    build_key(folder, user_id, original_name)
}

/// Storage key of a profile photo, under `avatars/`.
#[must_use]
pub fn generate_avatar_key(user_id: &str, original_name: &str) -> String {
    build_key("avatars", user_id, original_name)
}

fn build_key(folder: &str, user_id: &str, original_name: &str) -> String {
    use chrono::Utc;

    let now = Utc::now();
    let date_path = now.format("%Y/%m/%d").to_string();
    let timestamp = now.timestamp_millis();
    let extension = extension_of(original_name)
        .map_or_else(|| "bin".to_string(), str::to_lowercase);

    format!(
        "{folder}/{date_path}/{user_id}/{timestamp}_{}.{extension}",
        uuid::Uuid::new_v4()
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_storage_key() {
        let key = generate_storage_key(MediaKind::Image, "user123", "photo.JPG");
        assert!(key.starts_with("posts/"));
        assert!(key.contains("user123"));
        assert!(key.ends_with(".jpg"));
    }

    #[test]
    fn test_generate_storage_key_no_extension() {
        let key = generate_storage_key(MediaKind::Video, "user123", "clip");
        assert!(key.starts_with("videos/"));
        assert!(key.ends_with(".bin"));
    }

    #[test]
    fn test_generate_avatar_key() {
        let key = generate_avatar_key("user123", "me.png");
        assert!(key.starts_with("avatars/"));
        assert!(key.ends_with(".png"));
    }

    #[test]
    fn test_key_of_only_matches_own_urls() {
        let storage = LocalStorage::new(PathBuf::from("/tmp/unused"), "/files".to_string());

        assert_eq!(
            storage.key_of("/files/avatars/a/b.png").as_deref(),
            Some("avatars/a/b.png")
        );
        assert_eq!(storage.key_of("https://cdn.example.com/a.png"), None);
        assert_eq!(storage.key_of("/files/"), None);
    }

    #[test]
    fn test_validate_image_accepts_png() {
        assert!(validate_upload(MediaKind::Image, "cat.png", "image/png", 1024).is_ok());
        assert!(validate_upload(MediaKind::Image, "cat.JPG", "image/jpeg", 1024).is_ok());
    }

    #[test]
    fn test_validate_image_rejects_gif_and_oversize() {
        assert!(matches!(
            validate_upload(MediaKind::Image, "cat.gif", "image/gif", 1024),
            Err(AppError::UploadRejected(_))
        ));
        assert!(matches!(
            validate_upload(MediaKind::Image, "cat.png", "image/png", MAX_IMAGE_BYTES + 1),
            Err(AppError::UploadRejected(_))
        ));
    }

    #[test]
    fn test_validate_video() {
        assert!(validate_upload(MediaKind::Video, "clip.mp4", "video/mp4", 10_000).is_ok());
        assert!(validate_upload(MediaKind::Video, "clip.mov", "video/quicktime", 10_000).is_ok());
        assert!(validate_upload(MediaKind::Video, "clip.png", "image/png", 10_000).is_err());
        assert!(validate_upload(MediaKind::Video, "clip.mp4", "video/mp4", 0).is_err());
    }

    #[tokio::test]
    async fn test_local_storage_roundtrip() {
        let dir = std::env::temp_dir().join(format!("rapport-storage-{}", uuid::Uuid::new_v4()));
        let storage = LocalStorage::new(dir.clone(), "/files/".to_string());

        let uploaded = storage
            .upload("posts/a/b.png", b"png-bytes", "image/png")
            .await
            .unwrap();
        assert_eq!(uploaded.url, "/files/posts/a/b.png");
        assert_eq!(uploaded.size, 9);
        assert!(dir.join("posts/a/b.png").exists());

        storage.delete("posts/a/b.png").await.unwrap();
        assert!(!dir.join("posts/a/b.png").exists());
        // Deleting twice is fine
        storage.delete("posts/a/b.png").await.unwrap();

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
