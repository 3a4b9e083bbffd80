use crate::app::ports::DatasetHost;
use crate::common::error::StorageError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use tracing::{debug, info};

/// Archive container backed by a Supabase Storage bucket.
///
/// Objects live at `{base_url}/storage/v1/object/{bucket}/{path}`. Uploads are
/// upserts, so writing a partition is a full overwrite.
pub struct SupabaseDatasetHost {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
    token: String,
}

impl SupabaseDatasetHost {
    pub fn new(base_url: &str, bucket: &str, token: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, bucket, token)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str, bucket: &str, token: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            token: token.to_string(),
        }
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, path.trim_start_matches('/'))
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("Authorization", format!("Bearer {}", self.token))
            .header("apikey", self.token.clone())
    }
}

/// Supabase answers 400 with a "not_found" body for missing objects on some
/// versions and plain 404 on others.
fn is_missing(status: StatusCode, body: &str) -> bool {
    let body = body.to_ascii_lowercase();
    status == StatusCode::NOT_FOUND
        || (status == StatusCode::BAD_REQUEST && (body.contains("not_found") || body.contains("not found")))
}

fn already_exists(status: StatusCode, body: &str) -> bool {
    status == StatusCode::CONFLICT
        || (status == StatusCode::BAD_REQUEST && body.to_ascii_lowercase().contains("already exists"))
}

#[async_trait]
impl DatasetHost for SupabaseDatasetHost {
    async fn download(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let read_err = |message: String| StorageError::Read { path: path.to_string(), message };
        let resp = self
            .authed(self.client.get(self.object_url(path)))
            .send()
            .await
            .map_err(|e| read_err(e.to_string()))?;
        let status = resp.status();
        if status.is_success() {
            let bytes = resp.bytes().await.map_err(|e| read_err(e.to_string()))?;
            debug!(path, bytes = bytes.len(), "Downloaded object");
            return Ok(bytes.to_vec());
        }
        let body = resp.text().await.unwrap_or_default();
        if is_missing(status, &body) {
            return Err(StorageError::NotFound(path.to_string()));
        }
        Err(read_err(format!("status {}: {}", status, body)))
    }

    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let write_err = |message: String| StorageError::Write { path: path.to_string(), message };
        let content_type = if path.ends_with(".md") {
            "text/markdown; charset=utf-8"
        } else {
            "application/json; charset=utf-8"
        };
        let resp = self
            .authed(self.client.post(self.object_url(path)))
            .header("x-upsert", "true")
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| write_err(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(write_err(format!("status {}: {}", status, body)));
        }
        debug!(path, "Uploaded object");
        Ok(())
    }

    async fn ensure_container(&self) -> Result<(), StorageError> {
        let url = format!("{}/storage/v1/bucket", self.base_url);
        let resp = self
            .authed(self.client.post(url))
            .json(&json!({ "id": self.bucket, "name": self.bucket, "public": true }))
            .send()
            .await
            .map_err(|e| StorageError::Write { path: self.bucket.clone(), message: e.to_string() })?;
        let status = resp.status();
        if status.is_success() {
            info!(bucket = %self.bucket, "Created archive bucket");
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        if already_exists(status, &body) {
            return Ok(());
        }
        Err(StorageError::Write {
            path: self.bucket.clone(),
            message: format!("bucket create returned {}: {}", status, body),
        })
    }
}
