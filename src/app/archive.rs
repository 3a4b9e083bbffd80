use crate::app::ports::DatasetHost;
use crate::common::constants::{error_partition_path, partition_path, README_PATH};
use crate::common::error::StorageError;
use crate::common::time::{format_timestamp, HktDateTime};
use crate::common::types::{DailyPartition, ErrorEntry, ErrorPartition, Versioned};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// SHA-256 hex digest of stored bytes, used as the partition version.
pub fn content_version(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Serializes as pretty UTF-8 JSON. Non-ASCII text is written as-is.
fn to_json_bytes<T: Serialize>(value: &T, path: &str) -> Result<Vec<u8>, StorageError> {
    let mut bytes = serde_json::to_vec_pretty(value).map_err(|e| StorageError::Write {
        path: path.to_string(),
        message: e.to_string(),
    })?;
    bytes.push(b'\n');
    Ok(bytes)
}

fn from_json_bytes<T: DeserializeOwned>(bytes: &[u8], path: &str) -> Result<T, StorageError> {
    serde_json::from_slice(bytes).map_err(|e| StorageError::Corrupt {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

/// Day-partitioned archive on top of a [`DatasetHost`].
#[derive(Clone)]
pub struct ArchiveStore {
    host: Arc<dyn DatasetHost>,
}

impl ArchiveStore {
    pub fn new(host: Arc<dyn DatasetHost>) -> Self {
        Self { host }
    }

    pub async fn ensure_container_exists(&self) -> Result<(), StorageError> {
        self.host.ensure_container().await
    }

    pub async fn read_partition(
        &self,
        date: NaiveDate,
    ) -> Result<Versioned<DailyPartition>, StorageError> {
        let path = partition_path(date);
        let bytes = self.host.download(&path).await?;
        let value: DailyPartition = from_json_bytes(&bytes, &path)?;
        debug!(path = %path, snapshots = value.data.len(), "Read partition");
        Ok(Versioned { value, version: content_version(&bytes) })
    }

    /// Overwrites the day's partition.
    ///
    /// With `expected_version`, the write only happens if the stored bytes still
    /// hash to that version; otherwise it fails with `StorageError::Conflict`.
    /// The check and the upload are two separate calls on the host.
    ///
    /// Returns the version of the bytes just written.
    pub async fn write_partition(
        &self,
        date: NaiveDate,
        partition: &DailyPartition,
        expected_version: Option<&str>,
    ) -> Result<String, StorageError> {
        let path = partition_path(date);
        if let Some(expected) = expected_version {
            let current = match self.host.download(&path).await {
                Ok(bytes) => Some(content_version(&bytes)),
                Err(StorageError::NotFound(_)) => None,
                Err(e) => return Err(e),
            };
            if current.as_deref() != Some(expected) {
                warn!(path = %path, "Partition changed since it was read");
                return Err(StorageError::Conflict { path });
            }
        }

        let bytes = to_json_bytes(partition, &path)?;
        let version = content_version(&bytes);
        self.host.upload(&path, bytes).await?;
        info!(path = %path, snapshots = partition.data.len(), "Wrote partition");
        Ok(version)
    }

    /// Appends one entry to the day's error log, starting a new log if the
    /// existing one is missing or unreadable.
    pub async fn append_error(&self, date: NaiveDate, entry: ErrorEntry) -> Result<(), StorageError> {
        let path = error_partition_path(date);
        let mut log = match self.host.download(&path).await {
            Ok(bytes) => match from_json_bytes::<ErrorPartition>(&bytes, &path) {
                Ok(log) => log,
                Err(e) => {
                    warn!(path = %path, error = %e, "Error log unreadable, starting a new one");
                    ErrorPartition::default()
                }
            },
            Err(StorageError::NotFound(_)) => ErrorPartition::default(),
            Err(e) => return Err(e),
        };
        log.errors.push(entry);
        let bytes = to_json_bytes(&log, &path)?;
        self.host.upload(&path, bytes).await?;
        debug!(path = %path, entries = log.errors.len(), "Appended error entry");
        Ok(())
    }

    /// Regenerates the dataset README after a successful update.
    pub async fn update_readme(
        &self,
        now: HktDateTime,
        partition: &DailyPartition,
    ) -> Result<(), StorageError> {
        let content = render_readme(now, partition);
        self.host.upload(README_PATH, content.into_bytes()).await
    }
}

pub fn render_readme(now: HktDateTime, partition: &DailyPartition) -> String {
    let today = now.date_naive();
    let hospitals = partition.data.last().map(|s| s.hospitals.len()).unwrap_or(0);
    format!(
        "# AED Wait Time Data\n\n\
         Last updated: {updated}\n\n\
         This dataset contains AED wait time data for Hong Kong public hospitals, \
         sampled at minutes 02, 17, 32 and 47 of every hour (HKT, UTC+8).\n\n\
         ## Layout\n\n\
         - `data_YYYY-MM-DD.json`: `{{\"data\": [{{\"timestamp\", \"hospitals\": [...]}}]}}`, one file per day\n\
         - `errors/error_YYYY-MM-DD.json`: `{{\"errors\": [{{\"timestamp\", \"error\"}}]}}`\n\n\
         ## Today\n\n\
         - Partition: `{file}`\n\
         - Snapshots: {snapshots}\n\
         - Hospitals in latest snapshot: {hospitals}\n",
        updated = format_timestamp(&now),
        file = partition_path(today),
        snapshots = partition.data.len(),
        hospitals = hospitals,
    )
}
