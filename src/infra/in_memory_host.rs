use crate::app::ports::DatasetHost;
use crate::common::error::StorageError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// In-memory dataset host for development/testing
#[derive(Clone, Default)]
pub struct InMemoryDatasetHost {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    container_created: Arc<Mutex<bool>>,
}

impl InMemoryDatasetHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: &str, bytes: Vec<u8>) {
        self.objects.lock().unwrap().insert(path.to_string(), bytes);
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(path).cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn container_created(&self) -> bool {
        *self.container_created.lock().unwrap()
    }
}

#[async_trait]
impl DatasetHost for InMemoryDatasetHost {
    async fn download(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.get(path).ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        debug!(path, bytes = bytes.len(), "Stored object in memory");
        self.insert(path, bytes);
        Ok(())
    }

    async fn ensure_container(&self) -> Result<(), StorageError> {
        *self.container_created.lock().unwrap() = true;
        Ok(())
    }
}
