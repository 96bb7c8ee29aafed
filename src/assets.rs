use crate::{errors::StoreError, models::upload::UploadRecord};
use std::path::{Component, Path, PathBuf};
use tokio::fs as tokio_fs;
use uuid::Uuid;

pub const UPLOADS_SUBDIR: &str = "uploads";

/// Image files under the public root, addressed by `UploadRecord::image_url`.
#[derive(Clone, Debug)]
pub struct AssetStore {
    public_dir: PathBuf,
}

impl AssetStore {
    pub fn new(public_dir: impl Into<PathBuf>) -> Self {
        Self {
            public_dir: public_dir.into(),
        }
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.public_dir.join(UPLOADS_SUBDIR)
    }

    /// Disk path for a stored url. `None` if the url tries to leave the root.
    pub fn path_for(&self, image_url: &str) -> Option<PathBuf> {
        let rel = Path::new(image_url.trim_start_matches('/'));
        if rel.as_os_str().is_empty()
            || rel
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.public_dir.join(rel))
    }

    /// Bytes of the record's image; `Ok(None)` when the file is gone.
    pub async fn read(&self, record: &UploadRecord) -> std::io::Result<Option<Vec<u8>>> {
        let Some(path) = self.path_for(&record.image_url) else {
            return Ok(None);
        };
        match tokio_fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Same as [`AssetStore::read`], for code already on the blocking pool.
    pub fn read_blocking(&self, record: &UploadRecord) -> std::io::Result<Option<Vec<u8>>> {
        let Some(path) = self.path_for(&record.image_url) else {
            return Ok(None);
        };
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Writes a new upload and returns its public url (`/uploads/<uuid>.<ext>`).
    pub async fn store(&self, bytes: &[u8], ext: &str) -> Result<String, StoreError> {
        let dir = self.uploads_dir();
        tokio_fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io(&dir, e))?;
        let file_name = format!("{}.{}", Uuid::new_v4(), ext);
        let path = dir.join(&file_name);
        tokio_fs::write(&path, bytes)
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        Ok(format!("/{UPLOADS_SUBDIR}/{file_name}"))
    }

    /// Deletes the backing file. A file that is already gone is fine.
    pub async fn delete(&self, record: &UploadRecord) -> Result<(), StoreError> {
        let Some(path) = self.path_for(&record.image_url) else {
            return Ok(());
        };
        match tokio_fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }
}
