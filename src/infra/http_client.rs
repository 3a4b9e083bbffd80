use crate::app::ports::WaitTimeSource;
use crate::common::error::FetchError;
use crate::common::types::WaitRecord;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Deserialize, Debug)]
struct FeedResponse {
    result: FeedResult,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct FeedResult {
    hosp_data: Vec<HospData>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct HospData {
    hosp_name_en: String,
    hosp_name_gb: String,
    top_wait: String,
    hosp_time_en: String,
}

impl From<HospData> for WaitRecord {
    fn from(h: HospData) -> Self {
        WaitRecord {
            name_en: h.hosp_name_en,
            name_local: h.hosp_name_gb,
            top_wait: h.top_wait,
            as_of: h.hosp_time_en,
        }
    }
}

/// Maps the upstream feed body onto archive records, preserving feed order.
pub fn parse_wait_times(bytes: &[u8]) -> Result<Vec<WaitRecord>, FetchError> {
    let feed: FeedResponse =
        serde_json::from_slice(bytes).map_err(|e| FetchError::Malformed(e.to_string()))?;
    Ok(feed.result.hosp_data.into_iter().map(WaitRecord::from).collect())
}

pub struct ReqwestWaitTimeSource {
    client: reqwest::Client,
    url: String,
    timeout_secs: u64,
}

impl ReqwestWaitTimeSource {
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self::with_client(client, url, timeout_secs))
    }

    /// Uses a preconfigured client; `timeout_secs` should match its timeout.
    pub fn with_client(client: reqwest::Client, url: impl Into<String>, timeout_secs: u64) -> Self {
        Self { client, url: url.into(), timeout_secs }
    }
}

#[async_trait]
impl WaitTimeSource for ReqwestWaitTimeSource {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn fetch(&self) -> Result<Vec<WaitRecord>, FetchError> {
        let timed_out = |e: reqwest::Error| {
            if e.is_timeout() {
                FetchError::Timeout(self.timeout_secs)
            } else {
                FetchError::Http(e)
            }
        };

        let resp = self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(timed_out)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let bytes = resp.bytes().await.map_err(timed_out)?;
        debug!(bytes = bytes.len(), "Received feed body");
        parse_wait_times(&bytes)
    }
}
