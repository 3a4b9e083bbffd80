use thiserror::Error;

/// Failures talking to the upstream wait-time feed.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream request timed out after {0}s")]
    Timeout(u64),

    #[error("upstream returned status {0}")]
    Status(u16),

    #[error("malformed upstream payload: {0}")]
    Malformed(String),
}

/// Failures reading or writing the archive container.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("corrupt content at {path}: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("read failed for {path}: {message}")]
    Read { path: String, message: String },

    #[error("write failed for {path}: {message}")]
    Write { path: String, message: String },

    #[error("{path} changed since it was read")]
    Conflict { path: String },

    #[error("snapshot at {incoming} is older than the last stored snapshot at {last}")]
    OutOfOrder { last: String, incoming: String },
}

/// Startup configuration failures. These are fatal, unlike cycle errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Anything that aborts a single check-and-update cycle.
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("storage failed: {0}")]
    Storage(#[from] StorageError),
}

impl CycleError {
    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            CycleError::Fetch(FetchError::Timeout(_)) => "fetch_timeout",
            CycleError::Fetch(FetchError::Status(_)) => "fetch_status",
            CycleError::Fetch(FetchError::Malformed(_)) => "fetch_malformed",
            CycleError::Fetch(FetchError::Http(_)) => "fetch_http",
            CycleError::Storage(StorageError::Conflict { .. }) => "storage_conflict",
            CycleError::Storage(StorageError::Write { .. }) => "storage_write",
            CycleError::Storage(_) => "storage",
        }
    }
}

pub type Result<T> = std::result::Result<T, CycleError>;
