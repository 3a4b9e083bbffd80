use crate::app::update_use_case::RunMode;
use crate::common::constants::{
    DEFAULT_BUCKET, DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_LOCAL_ROOT, DEFAULT_SOURCE_URL,
};
use crate::common::error::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Supabase,
    Local,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub url: String,
    pub timeout_seconds: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOURCE_URL.to_string(),
            timeout_seconds: DEFAULT_FETCH_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub backend: Backend,
    /// Supabase project URL, e.g. `https://xyz.supabase.co`
    pub base_url: Option<String>,
    pub bucket: String,
    /// Directory used by the local backend
    pub root: PathBuf,
    /// Never read from the file; only from the environment
    #[serde(skip)]
    pub token: Option<String>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Supabase,
            base_url: None,
            bucket: DEFAULT_BUCKET.to_string(),
            root: PathBuf::from(DEFAULT_LOCAL_ROOT),
            token: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub archive: ArchiveConfig,
    pub mode: RunMode,
    pub pushgateway_url: Option<String>,
}

impl Config {
    /// Loads `path` if it exists (defaults otherwise), then applies environment
    /// overrides and validates.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
        let mut config = if config_path.exists() {
            let content = fs::read_to_string(config_path).map_err(|e| ConfigError::Io {
                path: config_path.display().to_string(),
                source: e,
            })?;
            Self::from_toml(&content)?
        } else if path.is_some() {
            // an explicitly requested file must exist
            return Err(ConfigError::Io {
                path: config_path.display().to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        } else {
            Config::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Applies `AED_*`, `ARCHIVE_*`, `SCRAPE_MODE` and `PUSHGATEWAY_URL` overrides.
    pub fn apply_env<F>(&mut self, get: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = get("AED_SOURCE_URL") {
            self.source.url = url;
        }
        if let Some(secs) = get("AED_FETCH_TIMEOUT_SECS") {
            self.source.timeout_seconds = secs
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("AED_FETCH_TIMEOUT_SECS='{}'", secs)))?;
        }
        if let Some(backend) = get("ARCHIVE_BACKEND") {
            self.archive.backend = match backend.trim().to_ascii_lowercase().as_str() {
                "supabase" => Backend::Supabase,
                "local" => Backend::Local,
                other => return Err(ConfigError::Invalid(format!("unknown archive backend '{}'", other))),
            };
        }
        if let Some(base_url) = get("ARCHIVE_BASE_URL") {
            self.archive.base_url = Some(base_url);
        }
        if let Some(bucket) = get("ARCHIVE_BUCKET") {
            self.archive.bucket = bucket;
        }
        if let Some(root) = get("ARCHIVE_ROOT") {
            self.archive.root = PathBuf::from(root);
        }
        self.archive.token = get("ARCHIVE_TOKEN").filter(|t| !t.trim().is_empty());
        if let Some(mode) = get("SCRAPE_MODE") {
            self.mode = mode.parse().map_err(ConfigError::Invalid)?;
        }
        if let Some(url) = get("PUSHGATEWAY_URL") {
            self.pushgateway_url = Some(url);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.timeout_seconds == 0 {
            return Err(ConfigError::Invalid("source.timeout_seconds must be positive".into()));
        }
        if self.archive.backend == Backend::Supabase {
            if self.archive.token.is_none() {
                return Err(ConfigError::MissingEnv("ARCHIVE_TOKEN"));
            }
            if self.archive.base_url.is_none() {
                return Err(ConfigError::MissingEnv("ARCHIVE_BASE_URL"));
            }
        }
        if self.archive.bucket.trim().is_empty() {
            return Err(ConfigError::Invalid("archive.bucket must not be empty".into()));
        }
        Ok(())
    }
}
