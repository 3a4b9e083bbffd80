use crate::common::error::{FetchError, StorageError};
use crate::common::time::HktDateTime;
use crate::common::types::WaitRecord;
use async_trait::async_trait;

/// Source of "now", always at UTC+8.
pub trait Clock: Send + Sync {
    fn now(&self) -> HktDateTime;
}

// Ingest-side ports
#[async_trait]
pub trait WaitTimeSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<WaitRecord>, FetchError>;
}

/// Object store holding the archive, addressed by path inside one container.
#[async_trait]
pub trait DatasetHost: Send + Sync {
    /// Returns the stored bytes, or `StorageError::NotFound` when absent.
    async fn download(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Creates or replaces the object at `path`.
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<(), StorageError>;

    /// Creates the container if it does not exist yet.
    async fn ensure_container(&self) -> Result<(), StorageError>;
}
