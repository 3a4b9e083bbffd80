use aed_archiver::app::archive::ArchiveStore;
use aed_archiver::app::ports::{DatasetHost, WaitTimeSource};
use aed_archiver::common::error::{FetchError, StorageError};
use aed_archiver::common::time::{hkt, HktDateTime};
use aed_archiver::common::types::{ErrorPartition, Snapshot};
use aed_archiver::infra::clock::FixedClock;
use aed_archiver::infra::in_memory_host::InMemoryDatasetHost;
use aed_archiver::{CycleOutcome, DailyPartition, RunMode, UpdateUseCase, WaitRecord};
use async_trait::async_trait;
use chrono::{Duration, TimeZone};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const PARTITION: &str = "data_2024-01-01.json";
const ERROR_LOG: &str = "errors/error_2024-01-01.json";

fn at(h: u32, m: u32, s: u32) -> HktDateTime {
    hkt().with_ymd_and_hms(2024, 1, 1, h, m, s).unwrap()
}

fn records() -> Vec<WaitRecord> {
    vec![
        WaitRecord {
            name_en: "Queen Elizabeth Hospital".to_string(),
            name_local: "伊利沙伯医院".to_string(),
            top_wait: "Over 8 hours".to_string(),
            as_of: "01/01/2024 12:00PM".to_string(),
        },
        WaitRecord {
            name_en: "Tuen Mun Hospital".to_string(),
            name_local: "屯门医院".to_string(),
            top_wait: "Over 3 hours".to_string(),
            as_of: "01/01/2024 12:00PM".to_string(),
        },
    ]
}

#[derive(Default)]
struct StaticSource {
    calls: AtomicUsize,
}

#[async_trait]
impl WaitTimeSource for StaticSource {
    async fn fetch(&self) -> Result<Vec<WaitRecord>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(records())
    }
}

struct FailingSource;

#[async_trait]
impl WaitTimeSource for FailingSource {
    async fn fetch(&self) -> Result<Vec<WaitRecord>, FetchError> {
        Err(FetchError::Status(503))
    }
}

/// Rejects uploads of data partitions; everything else goes through.
struct ReadOnlyDataHost {
    inner: InMemoryDatasetHost,
}

#[async_trait]
impl DatasetHost for ReadOnlyDataHost {
    async fn download(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.inner.download(path).await
    }

    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        if path.starts_with("data_") {
            return Err(StorageError::Write { path: path.to_string(), message: "quota exceeded".into() });
        }
        self.inner.upload(path, bytes).await
    }

    async fn ensure_container(&self) -> Result<(), StorageError> {
        self.inner.ensure_container().await
    }
}

/// Simulates another invocation writing the partition between our read and
/// our conditional write.
struct RacingHost {
    inner: InMemoryDatasetHost,
    downloads: AtomicUsize,
    racer: Mutex<Option<Vec<u8>>>,
}

#[async_trait]
impl DatasetHost for RacingHost {
    async fn download(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        if path == PARTITION && self.downloads.fetch_add(1, Ordering::SeqCst) == 1 {
            if let Some(bytes) = self.racer.lock().unwrap().take() {
                self.inner.insert(PARTITION, bytes);
            }
        }
        self.inner.download(path).await
    }

    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        self.inner.upload(path, bytes).await
    }

    async fn ensure_container(&self) -> Result<(), StorageError> {
        self.inner.ensure_container().await
    }
}

fn use_case(
    clock: &Arc<FixedClock>,
    source: Arc<dyn WaitTimeSource>,
    host: Arc<dyn DatasetHost>,
    mode: RunMode,
) -> UpdateUseCase {
    UpdateUseCase::new(clock.clone(), source, ArchiveStore::new(host), mode)
}

fn stored_partition(host: &InMemoryDatasetHost) -> DailyPartition {
    serde_json::from_slice(&host.get(PARTITION).expect("partition written")).unwrap()
}

fn partition_bytes(timestamps: &[HktDateTime]) -> Vec<u8> {
    let partition = DailyPartition {
        data: timestamps
            .iter()
            .map(|t| Snapshot { timestamp: *t, hospitals: records() })
            .collect(),
    };
    serde_json::to_vec(&partition).unwrap()
}

#[tokio::test]
async fn test_missing_partition_creates_one_snapshot() {
    let clock = Arc::new(FixedClock::new(at(12, 5, 0)));
    let host = InMemoryDatasetHost::new();
    let uc = use_case(&clock, Arc::new(StaticSource::default()), Arc::new(host.clone()), RunMode::Check);

    assert_eq!(uc.run_cycle().await, CycleOutcome::Created);

    let partition = stored_partition(&host);
    assert_eq!(partition.data.len(), 1);
    assert_eq!(partition.data[0].timestamp, at(12, 5, 0));
    assert_eq!(partition.data[0].hospitals, records());
    assert!(host.container_created());

    let readme = String::from_utf8(host.get("README.md").unwrap()).unwrap();
    assert!(readme.contains("Last updated: 2024-01-01T12:05:00+08:00"));
}

#[tokio::test]
async fn test_back_to_back_runs_write_one_snapshot() {
    let clock = Arc::new(FixedClock::new(at(12, 5, 0)));
    let host = InMemoryDatasetHost::new();
    let source = Arc::new(StaticSource::default());
    let uc = use_case(&clock, source.clone(), Arc::new(host.clone()), RunMode::Check);

    uc.run_cycle().await;
    clock.advance(Duration::seconds(1));
    let second = uc.run_cycle().await;

    assert_eq!(second, CycleOutcome::Skipped { next_check: at(12, 17, 0) });
    assert_eq!(stored_partition(&host).data.len(), 1);
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_minutely_scheduler_yields_four_snapshots_per_hour() {
    let clock = Arc::new(FixedClock::new(at(12, 0, 30)));
    let host = InMemoryDatasetHost::new();
    host.insert(PARTITION, partition_bytes(&[at(11, 47, 10)]));
    let uc = use_case(&clock, Arc::new(StaticSource::default()), Arc::new(host.clone()), RunMode::Check);

    for _ in 0..60 {
        uc.run_cycle().await;
        clock.advance(Duration::minutes(1));
    }

    let stamps: Vec<HktDateTime> = stored_partition(&host).data.iter().map(|s| s.timestamp).collect();
    assert_eq!(
        stamps,
        vec![at(11, 47, 10), at(12, 2, 30), at(12, 17, 30), at(12, 32, 30), at(12, 47, 30)]
    );
}

#[tokio::test]
async fn test_readme_untouched_on_skip() {
    let clock = Arc::new(FixedClock::new(at(12, 5, 0)));
    let host = InMemoryDatasetHost::new();
    host.insert(PARTITION, partition_bytes(&[at(12, 3, 0)]));
    host.insert("README.md", b"old".to_vec());
    let uc = use_case(&clock, Arc::new(StaticSource::default()), Arc::new(host.clone()), RunMode::Check);

    assert!(matches!(uc.run_cycle().await, CycleOutcome::Skipped { .. }));
    assert_eq!(host.get("README.md").unwrap(), b"old");
}

#[tokio::test]
async fn test_empty_partition_appends_unconditionally() {
    let clock = Arc::new(FixedClock::new(at(12, 5, 0)));
    let host = InMemoryDatasetHost::new();
    host.insert(PARTITION, br#"{"data": []}"#.to_vec());
    let uc = use_case(&clock, Arc::new(StaticSource::default()), Arc::new(host.clone()), RunMode::Check);

    assert_eq!(uc.run_cycle().await, CycleOutcome::Appended { snapshots: 1 });
    assert_eq!(stored_partition(&host).data.len(), 1);
}

#[tokio::test]
async fn test_corrupt_partition_is_replaced() {
    let clock = Arc::new(FixedClock::new(at(12, 5, 0)));
    let host = InMemoryDatasetHost::new();
    host.insert(PARTITION, b"{\"data\": [{\"timestamp\": 42}]}".to_vec());
    let uc = use_case(&clock, Arc::new(StaticSource::default()), Arc::new(host.clone()), RunMode::Check);

    assert_eq!(uc.run_cycle().await, CycleOutcome::Created);
    assert_eq!(stored_partition(&host).data.len(), 1);
}

#[tokio::test]
async fn test_always_mode_appends_every_call() {
    let clock = Arc::new(FixedClock::new(at(12, 5, 0)));
    let host = InMemoryDatasetHost::new();
    let uc = use_case(&clock, Arc::new(StaticSource::default()), Arc::new(host.clone()), RunMode::Always);

    uc.run_cycle().await;
    clock.advance(Duration::seconds(10));
    uc.run_cycle().await;
    clock.advance(Duration::seconds(10));
    assert_eq!(uc.run_cycle().await, CycleOutcome::Appended { snapshots: 3 });
}

#[tokio::test]
async fn test_fetch_failure_is_logged_not_raised() {
    let clock = Arc::new(FixedClock::new(at(12, 5, 0)));
    let host = InMemoryDatasetHost::new();
    let uc = use_case(&clock, Arc::new(FailingSource), Arc::new(host.clone()), RunMode::Check);

    assert_eq!(uc.run_cycle().await, CycleOutcome::Failed { kind: "fetch_status" });
    assert!(host.get(PARTITION).is_none());

    let log: ErrorPartition = serde_json::from_slice(&host.get(ERROR_LOG).unwrap()).unwrap();
    assert_eq!(log.errors.len(), 1);
    assert_eq!(log.errors[0].timestamp, at(12, 5, 0));
    assert!(log.errors[0].error.contains("503"));
}

#[tokio::test]
async fn test_write_failure_is_logged_not_raised() {
    let clock = Arc::new(FixedClock::new(at(12, 5, 0)));
    let inner = InMemoryDatasetHost::new();
    let host = Arc::new(ReadOnlyDataHost { inner: inner.clone() });
    let uc = use_case(&clock, Arc::new(StaticSource::default()), host, RunMode::Check);

    assert_eq!(uc.run_cycle().await, CycleOutcome::Failed { kind: "storage_write" });
    let log: ErrorPartition = serde_json::from_slice(&inner.get(ERROR_LOG).unwrap()).unwrap();
    assert!(log.errors[0].error.contains("quota exceeded"));
    assert!(inner.get("README.md").is_none());
}

#[tokio::test]
async fn test_concurrent_writer_covering_checkpoint_wins() {
    let clock = Arc::new(FixedClock::new(at(12, 18, 0)));
    let inner = InMemoryDatasetHost::new();
    inner.insert(PARTITION, partition_bytes(&[at(12, 2, 30)]));
    let host = Arc::new(RacingHost {
        inner: inner.clone(),
        downloads: AtomicUsize::new(0),
        racer: Mutex::new(Some(partition_bytes(&[at(12, 2, 30), at(12, 17, 40)]))),
    });
    let uc = use_case(&clock, Arc::new(StaticSource::default()), host, RunMode::Check);

    assert_eq!(uc.run_cycle().await, CycleOutcome::Skipped { next_check: at(12, 32, 0) });

    let stamps: Vec<HktDateTime> = stored_partition(&inner).data.iter().map(|s| s.timestamp).collect();
    assert_eq!(stamps, vec![at(12, 2, 30), at(12, 17, 40)]);
}

#[tokio::test]
async fn test_concurrent_writer_not_covering_checkpoint_is_merged() {
    let clock = Arc::new(FixedClock::new(at(12, 18, 0)));
    let inner = InMemoryDatasetHost::new();
    inner.insert(PARTITION, partition_bytes(&[at(12, 2, 30)]));
    // the racer rewrote the file without adding anything past 12:17
    let host = Arc::new(RacingHost {
        inner: inner.clone(),
        downloads: AtomicUsize::new(0),
        racer: Mutex::new(Some(partition_bytes(&[at(12, 2, 30), at(12, 3, 0)]))),
    });
    let uc = use_case(&clock, Arc::new(StaticSource::default()), host, RunMode::Check);

    assert_eq!(uc.run_cycle().await, CycleOutcome::Appended { snapshots: 3 });
    let stamps: Vec<HktDateTime> = stored_partition(&inner).data.iter().map(|s| s.timestamp).collect();
    assert_eq!(stamps, vec![at(12, 2, 30), at(12, 3, 0), at(12, 18, 0)]);
}

#[tokio::test]
async fn test_concurrent_writer_leaving_garbage_is_replaced() {
    let clock = Arc::new(FixedClock::new(at(12, 18, 0)));
    let inner = InMemoryDatasetHost::new();
    inner.insert(PARTITION, partition_bytes(&[at(12, 2, 30)]));
    let host = Arc::new(RacingHost {
        inner: inner.clone(),
        downloads: AtomicUsize::new(0),
        racer: Mutex::new(Some(b"{\"data\": [trunc".to_vec())),
    });
    let source = Arc::new(StaticSource::default());
    let uc = use_case(&clock, source.clone(), host, RunMode::Check);

    assert_eq!(uc.run_cycle().await, CycleOutcome::Created);

    let partition = stored_partition(&inner);
    assert_eq!(partition.data.len(), 1);
    assert_eq!(partition.data[0].timestamp, at(12, 18, 0));
    // the records fetched before the conflict are reused
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    assert!(inner.get(ERROR_LOG).is_none());
}
