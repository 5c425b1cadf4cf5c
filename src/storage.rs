use crate::config::StorageConfig;
use crate::types::{BriefingError, Category, Edition, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

/// Trait for the durable object store holding rendered audio. `put` must
/// overwrite any existing object at the same key so reruns replace their
/// previous upload instead of accumulating copies.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Upload `bytes` at `key`, overwriting on conflict. Returns a
    /// publicly resolvable URL for the object.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String>;
}

/// Deterministic audio key for one briefing slot. Reruns of the same
/// `(category, date, edition)` land on the same key by construction.
pub fn audio_object_key(category: Category, date: NaiveDate, edition: Edition) -> String {
    format!("{}/{}-{}.mp3", category, date.format("%Y-%m-%d"), edition)
}

/// Object storage over an S3-compatible REST surface: one PUT per upload
/// with an upsert header, bearer-token auth, and public URLs composed
/// from a configured base.
pub struct HttpObjectStorage {
    client: Client,
    endpoint: String,
    bucket: String,
    access_token: String,
    public_base_url: String,
}

impl HttpObjectStorage {
    pub fn new(config: &StorageConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            bucket: config.bucket.clone(),
            access_token: config.access_token.clone(),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ObjectStorage for HttpObjectStorage {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        let upload_url = format!("{}/{}/{}", self.endpoint, self.bucket, key);
        debug!("Uploading {} bytes to {}", bytes.len(), upload_url);

        let response = self
            .client
            .put(&upload_url)
            .bearer_auth(&self.access_token)
            .header("x-upsert", "true")
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| BriefingError::Publish(format!("upload failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(BriefingError::Publish(format!(
                "storage returned {}: {}",
                status,
                detail.chars().take(200).collect::<String>()
            )));
        }

        let public_url = format!("{}/{}/{}", self.public_base_url, self.bucket, key);
        info!("Uploaded audio object: {}", public_url);
        Ok(public_url)
    }
}

/// In-memory store for tests. Overwrites by key like the real store and
/// can be told to fail to exercise the degraded-upload path.
pub struct MemoryObjectStorage {
    fail: bool,
    pub objects: tokio::sync::Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStorage {
    pub fn new() -> Self {
        Self {
            fail: false,
            objects: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            objects: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    pub async fn object_count(&self) -> usize {
        self.objects.lock().await.len()
    }
}

impl Default for MemoryObjectStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String> {
        if self.fail {
            return Err(BriefingError::Publish("mock storage failure".to_string()));
        }

        self.objects.lock().await.insert(key.to_string(), bytes);
        Ok(format!("https://storage.test/{}", key))
    }
}
