use crate::app::ports::DatasetHost;
use crate::common::error::StorageError;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Archive container kept in a directory on disk.
pub struct LocalDatasetHost {
    root: PathBuf,
}

impl LocalDatasetHost {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

#[async_trait]
impl DatasetHost for LocalDatasetHost {
    async fn download(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        match fs::read(self.resolve(path)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(path.to_string())),
            Err(e) => Err(StorageError::Read { path: path.to_string(), message: e.to_string() }),
        }
    }

    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let write_err = |e: std::io::Error| StorageError::Write { path: path.to_string(), message: e.to_string() };
        let target = self.resolve(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        // readers never observe a partially written file
        let tmp = target.with_extension("tmp");
        fs::write(&tmp, &bytes).await.map_err(write_err)?;
        fs::rename(&tmp, &target).await.map_err(write_err)?;
        Ok(())
    }

    async fn ensure_container(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root).await.map_err(|e| StorageError::Write {
            path: self.root.display().to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_round_trip_and_nested_paths() {
        let dir = tempdir().unwrap();
        let host = LocalDatasetHost::new(dir.path().join("archive"));
        host.ensure_container().await.unwrap();
        host.ensure_container().await.unwrap();

        host.upload("errors/error_2024-01-01.json", b"{}".to_vec()).await.unwrap();
        assert_eq!(host.download("errors/error_2024-01-01.json").await.unwrap(), b"{}");
        assert!(!host.root().join("errors/error_2024-01-01.tmp").exists());
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let host = LocalDatasetHost::new(dir.path());
        let err = host.download("data_2024-01-01.json").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }
}
