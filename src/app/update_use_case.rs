use crate::app::archive::ArchiveStore;
use crate::app::cadence::{next_check_point, should_update_at};
use crate::app::ports::{Clock, WaitTimeSource};
use crate::common::error::{Result, StorageError};
use crate::common::time::{format_timestamp, HktDateTime};
use crate::common::types::{CycleOutcome, DailyPartition, ErrorEntry, Snapshot, Versioned, WaitRecord};
use crate::observability::metrics::CycleMetrics;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// How an invocation decides whether to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Fetch only when a checkpoint has been crossed since the last snapshot
    #[default]
    Check,
    /// Fetch and append on every invocation
    Always,
}

impl std::str::FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "check" => Ok(RunMode::Check),
            // NORMAL was the historical name for unconditional scraping
            "always" | "normal" => Ok(RunMode::Always),
            other => Err(format!("unknown run mode '{}'", other)),
        }
    }
}

pub struct UpdateUseCase {
    pub clock: Arc<dyn Clock>,
    pub source: Arc<dyn WaitTimeSource>,
    pub archive: ArchiveStore,
    pub mode: RunMode,
}

impl UpdateUseCase {
    pub fn new(
        clock: Arc<dyn Clock>,
        source: Arc<dyn WaitTimeSource>,
        archive: ArchiveStore,
        mode: RunMode,
    ) -> Self {
        Self { clock, source, archive, mode }
    }

    /// Runs one cycle and never fails: errors are logged and recorded in the
    /// day's error partition.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let started = self.clock.now();
        let outcome = match self.check_and_update().await {
            Ok(outcome) => outcome,
            Err(e) => {
                let kind = e.kind();
                error!(kind, error = %e, "Check-and-update cycle failed");
                let entry = ErrorEntry {
                    timestamp: self.clock.now(),
                    error: format!("Error checking or updating data: {}", e),
                };
                if let Err(log_err) = self.archive.append_error(started.date_naive(), entry).await {
                    error!(error = %log_err, "Failed to record cycle error");
                }
                CycleOutcome::Failed { kind }
            }
        };
        CycleMetrics::record_outcome(&outcome);
        outcome
    }

    #[instrument(skip(self), fields(mode = ?self.mode))]
    pub async fn check_and_update(&self) -> Result<CycleOutcome> {
        let now = self.clock.now();
        let today = now.date_naive();

        self.archive.ensure_container_exists().await?;

        let current = match self.archive.read_partition(today).await {
            Ok(current) => current,
            Err(StorageError::NotFound(_)) => {
                info!(date = %today, "No partition for today yet");
                let hospitals = self.fetch().await?;
                return self.create_partition(now, hospitals).await;
            }
            Err(StorageError::Corrupt { path, reason }) => {
                warn!(path = %path, reason = %reason, "Partition unreadable, starting over");
                let hospitals = self.fetch().await?;
                return self.create_partition(now, hospitals).await;
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(skipped) = self.skip_if_covered(now, &current.value) {
            return Ok(skipped);
        }

        let hospitals = self.fetch().await?;
        self.append_and_write(now, current, hospitals).await
    }

    /// `Skipped` when the stored partition already covers the latest
    /// checkpoint before `now`.
    fn skip_if_covered(&self, now: HktDateTime, partition: &DailyPartition) -> Option<CycleOutcome> {
        let last = partition.last_timestamp()?;
        let due = match self.mode {
            RunMode::Always => true,
            RunMode::Check => should_update_at(now, last),
        };
        if due {
            return None;
        }
        let next_check = next_check_point(now);
        info!(
            last = %format_timestamp(&last),
            next_check = %format_timestamp(&next_check),
            "Data is up to date, no action needed"
        );
        Some(CycleOutcome::Skipped { next_check })
    }

    async fn fetch(&self) -> Result<Vec<WaitRecord>> {
        let hospitals = self.source.fetch().await?;
        info!(hospitals = hospitals.len(), "Fetched wait times");
        Ok(hospitals)
    }

    async fn create_partition(&self, now: HktDateTime, hospitals: Vec<WaitRecord>) -> Result<CycleOutcome> {
        let mut partition = DailyPartition::new();
        partition.append(Snapshot { timestamp: now, hospitals })?;
        let version = self.archive.write_partition(now.date_naive(), &partition, None).await?;
        self.archive.update_readme(now, &partition).await?;
        info!(at = %format_timestamp(&now), version = %version, "Created partition with first snapshot");
        Ok(CycleOutcome::Created)
    }

    async fn append_and_write(
        &self,
        now: HktDateTime,
        current: Versioned<DailyPartition>,
        hospitals: Vec<WaitRecord>,
    ) -> Result<CycleOutcome> {
        let today = now.date_naive();
        let mut partition = current.value;
        partition.append(Snapshot { timestamp: now, hospitals: hospitals.clone() })?;

        let version = match self.archive.write_partition(today, &partition, Some(&current.version)).await {
            Ok(version) => version,
            Err(StorageError::Conflict { path }) => {
                CycleMetrics::record_conflict();
                warn!(path = %path, "Concurrent write detected, re-reading partition");
                return self.retry_after_conflict(now, hospitals).await;
            }
            Err(e) => return Err(e.into()),
        };

        self.archive.update_readme(now, &partition).await?;
        info!(snapshots = partition.data.len(), version = %version, "Data updated successfully");
        Ok(CycleOutcome::Appended { snapshots: partition.data.len() })
    }

    /// Second and last attempt after a conflicting write. Reuses the records
    /// already fetched instead of hitting the upstream feed again.
    async fn retry_after_conflict(
        &self,
        now: HktDateTime,
        hospitals: Vec<WaitRecord>,
    ) -> Result<CycleOutcome> {
        let today = now.date_naive();
        let fresh = match self.archive.read_partition(today).await {
            Ok(fresh) => fresh,
            Err(StorageError::NotFound(_)) => {
                info!(date = %today, "Partition gone after conflict, recreating");
                return self.create_partition(now, hospitals).await;
            }
            Err(StorageError::Corrupt { path, reason }) => {
                warn!(path = %path, reason = %reason, "Partition unreadable after conflict, starting over");
                return self.create_partition(now, hospitals).await;
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(skipped) = self.skip_if_covered(now, &fresh.value) {
            info!("Another run already stored this checkpoint");
            return Ok(skipped);
        }

        let mut partition = fresh.value;
        partition.append(Snapshot { timestamp: now, hospitals })?;
        let version = self.archive.write_partition(today, &partition, Some(&fresh.version)).await?;
        self.archive.update_readme(now, &partition).await?;
        info!(snapshots = partition.data.len(), version = %version, "Data updated after conflict");
        Ok(CycleOutcome::Appended { snapshots: partition.data.len() })
    }
}
