/// Upstream feed and archive layout constants shared across the application

// Hospital Authority A&E wait time feed
pub const DEFAULT_SOURCE_URL: &str = "https://www.ha.org.hk/aedwt/data/aedWtData.json";
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

// Archive container defaults
pub const DEFAULT_BUCKET: &str = "aed-wait-time-data";
pub const DEFAULT_LOCAL_ROOT: &str = "data";

// File names inside the container
pub const README_PATH: &str = "README.md";
pub const ERRORS_DIR: &str = "errors";

/// Minutes past each hour at which a new snapshot becomes due
pub const CHECK_POINT_MINUTES: [u32; 4] = [2, 17, 32, 47];

/// Hong Kong Time offset from UTC, in seconds
pub const HKT_OFFSET_SECS: i32 = 8 * 60 * 60;

/// Path of the day's data partition, e.g. `data_2024-01-01.json`
pub fn partition_path(date: chrono::NaiveDate) -> String {
    format!("data_{}.json", date.format("%Y-%m-%d"))
}

/// Path of the day's error log, e.g. `errors/error_2024-01-01.json`
pub fn error_partition_path(date: chrono::NaiveDate) -> String {
    format!("{}/error_{}.json", ERRORS_DIR, date.format("%Y-%m-%d"))
}
