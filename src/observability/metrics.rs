//! Cycle metrics for the archiver.
//!
//! The job is short-lived, so nothing scrapes it. Metrics are recorded into an
//! in-process Prometheus recorder and, when a Pushgateway is configured,
//! pushed once at the end of the run.

use crate::common::types::CycleOutcome;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::{Once, OnceLock};
use tracing::{info, warn};

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static INIT: Once = Once::new();

const CYCLES_TOTAL: &str = "aed_cycles_total";
const CONFLICTS_TOTAL: &str = "aed_storage_conflicts_total";
const SNAPSHOTS_GAUGE: &str = "aed_partition_snapshots";

/// Installs the Prometheus recorder. Idempotent.
pub fn init_metrics() {
    INIT.call_once(|| match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = HANDLE.set(handle);
            CycleMetrics::register();
        }
        Err(e) => warn!("Failed to install Prometheus recorder: {}", e),
    });
}

pub fn get_handle() -> Option<&'static PrometheusHandle> {
    HANDLE.get()
}

pub struct CycleMetrics;

impl CycleMetrics {
    fn register() {
        for outcome in ["created", "appended", "skipped", "failed"] {
            let _ = ::metrics::counter!(CYCLES_TOTAL, "outcome" => outcome);
        }
        let _ = ::metrics::counter!(CONFLICTS_TOTAL);
    }

    pub fn record_outcome(outcome: &CycleOutcome) {
        ::metrics::counter!(CYCLES_TOTAL, "outcome" => outcome.label()).increment(1);
        match outcome {
            CycleOutcome::Created => ::metrics::gauge!(SNAPSHOTS_GAUGE).set(1.0),
            CycleOutcome::Appended { snapshots } => {
                ::metrics::gauge!(SNAPSHOTS_GAUGE).set(*snapshots as f64)
            }
            CycleOutcome::Failed { kind } => {
                ::metrics::counter!("aed_cycle_errors_total", "kind" => *kind).increment(1)
            }
            CycleOutcome::Skipped { .. } => {}
        }
    }

    pub fn record_conflict() {
        ::metrics::counter!(CONFLICTS_TOTAL).increment(1);
    }
}

/// Pushes the current snapshot to a Prometheus Pushgateway.
pub async fn push_metrics(pushgateway_url: &str) -> Result<(), reqwest::Error> {
    let Some(handle) = get_handle() else {
        return Ok(());
    };
    let push_url = format!("{}/metrics/job/aed_archiver", pushgateway_url.trim_end_matches('/'));
    reqwest::Client::new()
        .post(&push_url)
        .header("Content-Type", "text/plain; version=0.0.4")
        .body(handle.render())
        .send()
        .await?
        .error_for_status()?;
    info!(url = %push_url, "Pushed metrics");
    Ok(())
}
