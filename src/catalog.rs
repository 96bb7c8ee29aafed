use crate::{errors::StoreError, models::upload::UploadRecord};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::{fs as tokio_fs, sync::RwLock};

/// JSON-file backed list of uploads. Loaded once, saved after every mutation.
pub struct Catalog {
    path: PathBuf,
    records: RwLock<Vec<UploadRecord>>,
}

impl Catalog {
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let records = match tokio_fs::read(&path).await {
            Ok(data) => serde_json::from_slice(&data)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        tracing::info!("Loaded {} uploads from {}", records.len(), path.display());
        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    /// Full catalog in stored order.
    pub async fn snapshot(&self) -> Vec<UploadRecord> {
        self.records.read().await.clone()
    }

    pub async fn get(&self, id: &str) -> Option<UploadRecord> {
        self.records.read().await.iter().find(|r| r.id == id).cloned()
    }

    pub async fn insert(&self, record: UploadRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        records.push(record);
        if let Err(e) = save(&self.path, &records).await {
            records.pop();
            return Err(e);
        }
        Ok(())
    }

    /// Removes every record whose id is in `ids`, returning the removed ones.
    pub async fn remove(&self, ids: &[String]) -> Result<Vec<UploadRecord>, StoreError> {
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut records = self.records.write().await;
        let (removed, kept): (Vec<_>, Vec<_>) = records
            .iter()
            .cloned()
            .partition(|r| wanted.contains(r.id.as_str()));
        if removed.is_empty() {
            return Ok(removed);
        }
        save(&self.path, &kept).await?;
        *records = kept;
        Ok(removed)
    }
}

async fn save(path: &Path, records: &[UploadRecord]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        tokio_fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::io(parent, e))?;
    }
    let json = serde_json::to_vec_pretty(records)?;
    let tmp = path.with_extension("json.part");
    tokio_fs::write(&tmp, &json)
        .await
        .map_err(|e| StoreError::io(&tmp, e))?;
    tokio_fs::rename(&tmp, path)
        .await
        .map_err(|e| StoreError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(id: &str) -> UploadRecord {
        UploadRecord {
            id: id.into(),
            name: format!("member {id}"),
            image_url: format!("/uploads/{id}.jpg"),
            uploaded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::load(dir.path().join("none.json")).await.unwrap();
        assert!(catalog.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uploads.json");
        std::fs::write(&path, b"{ not json").unwrap();
        assert!(matches!(
            Catalog::load(&path).await,
            Err(StoreError::Json(_))
        ));
    }

    #[tokio::test]
    async fn insert_persists_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("uploads.json");
        let catalog = Catalog::load(&path).await.unwrap();
        catalog.insert(record("a")).await.unwrap();
        catalog.insert(record("b")).await.unwrap();

        let reloaded = Catalog::load(&path).await.unwrap();
        let ids: Vec<_> = reloaded.snapshot().await.into_iter().map(|r| r.id).collect();
        assert_eq!(ids, ["a", "b"]);
        assert!(!path.with_extension("json.part").exists());
    }

    #[tokio::test]
    async fn remove_drops_matching_and_saves() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uploads.json");
        let catalog = Catalog::load(&path).await.unwrap();
        for id in ["a", "b", "c"] {
            catalog.insert(record(id)).await.unwrap();
        }

        let removed = catalog
            .remove(&["c".to_string(), "a".to_string(), "zzz".to_string()])
            .await
            .unwrap();
        let removed: Vec<_> = removed.into_iter().map(|r| r.id).collect();
        assert_eq!(removed, ["a", "c"]);

        let reloaded = Catalog::load(&path).await.unwrap();
        assert_eq!(reloaded.snapshot().await, vec![catalog.get("b").await.unwrap()]);
    }
}
