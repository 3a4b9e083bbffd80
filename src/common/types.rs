use crate::common::error::StorageError;
use crate::common::time::{format_timestamp, serde_hkt, HktDateTime};
use serde::{Deserialize, Serialize};

/// One hospital's wait-time reading as stored in the archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitRecord {
    #[serde(rename = "hospNameEn")]
    pub name_en: String,
    #[serde(rename = "hospNameCh")]
    pub name_local: String,
    /// Free-text wait bucket, e.g. "Over 8 hours"
    #[serde(rename = "topWait")]
    pub top_wait: String,
    /// Upstream-reported time, kept verbatim
    #[serde(rename = "hospTimeEn")]
    pub as_of: String,
}

/// The records from one fetch, stamped with the cycle's time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(with = "serde_hkt")]
    pub timestamp: HktDateTime,
    pub hospitals: Vec<WaitRecord>,
}

/// All snapshots for one HKT calendar day, oldest first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyPartition {
    pub data: Vec<Snapshot>,
}

impl DailyPartition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_timestamp(&self) -> Option<HktDateTime> {
        self.data.last().map(|s| s.timestamp)
    }

    /// Appends a snapshot, keeping `data` non-decreasing in time.
    pub fn append(&mut self, snapshot: Snapshot) -> Result<(), StorageError> {
        if let Some(last) = self.last_timestamp() {
            if snapshot.timestamp < last {
                return Err(StorageError::OutOfOrder {
                    last: format_timestamp(&last),
                    incoming: format_timestamp(&snapshot.timestamp),
                });
            }
        }
        self.data.push(snapshot);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    #[serde(with = "serde_hkt")]
    pub timestamp: HktDateTime,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPartition {
    pub errors: Vec<ErrorEntry>,
}

/// A value read from the dataset host together with the digest of its bytes
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub value: T,
    pub version: String,
}

/// What a single cycle ended up doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No usable partition existed for today; a new one was written
    Created,
    /// A snapshot was appended to today's partition
    Appended { snapshots: usize },
    /// The gate said no update was due
    Skipped { next_check: HktDateTime },
    /// The cycle failed and the failure was recorded
    Failed { kind: &'static str },
}

impl CycleOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Created => "created",
            CycleOutcome::Appended { .. } => "appended",
            CycleOutcome::Skipped { .. } => "skipped",
            CycleOutcome::Failed { .. } => "failed",
        }
    }
}
