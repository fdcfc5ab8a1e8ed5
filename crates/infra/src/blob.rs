//! File-backed image storage.
//!
//! Images live flat in one directory, named `<unix-millis>-<random-hex>.<ext>`.
//! Material records only hold the stored name.

use std::path::{Path, PathBuf};

use chrono::Utc;
use labstock_core::DomainError;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

const SUPPORTED: &[(&str, &str)] = &[
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
];

#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    /// Open (and create if needed) the upload directory.
    pub async fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| StoreError::io("create_upload_dir", e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store `bytes` and return the generated file name.
    pub async fn save(&self, content_type: &str, bytes: &[u8]) -> StoreResult<String> {
        let ext = extension_for(content_type).ok_or_else(|| {
            DomainError::validation(format!("unsupported image type '{content_type}'"))
        })?;
        if bytes.is_empty() {
            return Err(DomainError::validation("image body is empty").into());
        }

        let name = format!(
            "{}-{}.{ext}",
            Utc::now().timestamp_millis(),
            Uuid::new_v4().simple()
        );
        tokio::fs::write(self.root.join(&name), bytes)
            .await
            .map_err(|e| StoreError::io("write_image", e))?;
        tracing::debug!(name = %name, size = bytes.len(), "stored image");
        Ok(name)
    }

    /// Read a stored image and its content type.
    pub async fn read(&self, name: &str) -> StoreResult<(Vec<u8>, &'static str)> {
        let path = self.path_for(name)?;
        let content_type = content_type_for(name).ok_or(DomainError::not_found("image"))?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok((bytes, content_type)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(DomainError::not_found("image").into())
            }
            Err(e) => Err(StoreError::io("read_image", e)),
        }
    }

    /// Whether `name` is a stored image. Fails with `Validation` for names the
    /// store could never have generated.
    pub async fn exists(&self, name: &str) -> StoreResult<bool> {
        let path = self.path_for(name)?;
        if content_type_for(name).is_none() {
            return Ok(false);
        }
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| StoreError::io("stat_image", e))
    }

    /// Remove a stored image. Returns `false` when it was already gone.
    pub async fn remove(&self, name: &str) -> StoreResult<bool> {
        let path = self.path_for(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io("remove_image", e)),
        }
    }

    fn path_for(&self, name: &str) -> StoreResult<PathBuf> {
        if !is_valid_name(name) {
            return Err(DomainError::validation(format!("invalid image name '{name}'")).into());
        }
        Ok(self.root.join(name))
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains("..")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

/// File extension for a supported image content type. Parameters such as
/// `; charset=...` are ignored.
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();
    SUPPORTED
        .iter()
        .find(|(mime, _)| *mime == essence)
        .map(|(_, ext)| *ext)
}

pub fn content_type_for(name: &str) -> Option<&'static str> {
    let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    let ext = if ext == "jpeg" { "jpg".to_string() } else { ext };
    SUPPORTED
        .iter()
        .find(|(_, e)| *e == ext)
        .map(|(mime, _)| *mime)
}
