use crate::types::{BriefingError, Result};
use backoff::backoff::Backoff;
use backoff::exponential::ExponentialBackoff;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

/// Knobs for fetching feed documents over HTTP.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "briefcast/0.1".to_string(),
            timeout_seconds: 10,
            max_retries: 2,
            retry_delay_ms: 500,
            max_redirects: 5,
        }
    }
}

/// Thin HTTP wrapper shared by all feed sources in a run. Retries
/// transient failures with exponential backoff; the per-request timeout
/// keeps one slow host from eating the aggregator's budget.
pub struct DocumentFetcher {
    client: Client,
    config: FetchConfig,
}

impl DocumentFetcher {
    pub fn new(config: FetchConfig) -> Self {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    /// Fetch the document body at `url`, retrying server errors, rate
    /// limits, and connection failures up to `max_retries` times. Client
    /// errors (4xx) fail immediately.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: Duration::from_millis(self.config.retry_delay_ms),
            initial_interval: Duration::from_millis(self.config.retry_delay_ms),
            max_interval: Duration::from_millis(self.config.retry_delay_ms * 8),
            multiplier: 2.0,
            max_elapsed_time: Some(Duration::from_secs(self.config.timeout_seconds * 2)),
            ..Default::default()
        };

        let mut last_error = BriefingError::SourceUnavailable {
            source_name: url.to_string(),
            reason: "no fetch attempt completed".to_string(),
        };

        for attempt in 0..=self.config.max_retries {
            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    match response.error_for_status() {
                        Ok(response) => {
                            let body = response.text().await?;
                            debug!("Fetched {} ({} bytes)", url, body.len());
                            return Ok(body);
                        }
                        Err(e) if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS => {
                            last_error = e.into();
                        }
                        // 4xx responses are not transient; retrying won't help.
                        Err(e) => return Err(e.into()),
                    }
                }
                Err(e) => {
                    last_error = e.into();
                }
            }

            if attempt < self.config.max_retries {
                if let Some(delay) = backoff.next_backoff() {
                    warn!("Attempt {} failed for {}, retrying in {:?}", attempt + 1, url, delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }

        Err(last_error)
    }
}
