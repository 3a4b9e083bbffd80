//! Archives Hong Kong A&E wait times into one JSON partition per HKT day,
//! fetching only when a quarter-hour checkpoint has passed since the last
//! stored snapshot.

pub mod app;
pub mod common;
pub mod config;
pub mod infra;
pub mod observability;

pub use app::update_use_case::{RunMode, UpdateUseCase};
pub use common::types::{CycleOutcome, DailyPartition, Snapshot, WaitRecord};
