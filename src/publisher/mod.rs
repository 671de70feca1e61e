//! Video publishing.
//!
//! `VideoPublisher` uploads one file; the functions here drive it over the
//! catalog with retries and record the outcome of every attempt.

pub mod vk;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

use crate::catalog::{Catalog, RecordFilter, VideoRecord};
use crate::config::PublisherConfig;

pub use vk::VkPublisher;

/// VK error codes worth another attempt: unknown error, rate limits,
/// flood control, internal server error.
const TRANSIENT_API_CODES: [i64; 4] = [1, 6, 9, 10];

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("VK API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Publisher not configured: {0}")]
    NotConfigured(String),
}

impl PublishError {
    /// Whether retrying the same upload may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            PublishError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_request()
                    || e.status().is_some_and(|status| status.is_server_error())
            }
            PublishError::Status { status, .. } => *status >= 500,
            PublishError::Api { code, .. } => TRANSIENT_API_CODES.contains(code),
            PublishError::Io(_) | PublishError::InvalidResponse(_) | PublishError::NotConfigured(_) => false,
        }
    }
}

/// One video to upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRequest {
    pub file_path: PathBuf,
    pub title: String,
    pub description: String,
}

impl UploadRequest {
    pub fn from_record(record: &VideoRecord) -> Self {
        Self {
            file_path: record.file_path.clone(),
            title: record.title.clone(),
            description: record.caption.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublishedVideo {
    pub owner_id: i64,
    pub video_id: i64,
    pub url: String,
    pub post_url: Option<String>,
}

#[async_trait]
pub trait VideoPublisher: Send + Sync {
    async fn publish(&self, request: &UploadRequest) -> Result<PublishedVideo, PublishError>;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub max_retries: u32,
    /// Delay before the second attempt; doubles after each failure
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &PublisherConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_secs(config.retry_base_delay_secs),
        }
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2_u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Upload with exponential backoff. Only transient errors are retried.
pub async fn publish_with_retry(
    publisher: &dyn VideoPublisher,
    request: &UploadRequest,
    policy: &RetryPolicy,
) -> Result<PublishedVideo, PublishError> {
    let attempts = policy.max_retries.max(1);
    let mut attempt = 0;

    loop {
        match publisher.publish(request).await {
            Ok(video) => return Ok(video),
            Err(e) if e.is_transient() && attempt + 1 < attempts => {
                let delay = policy.delay(attempt);
                warn!(
                    "Upload attempt {} for {} failed: {}, retrying in {:?}",
                    attempt + 1,
                    request.file_path.display(),
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    pub limit: Option<usize>,
    pub dry_run: bool,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PublishReport {
    pub attempted: usize,
    pub published: usize,
    pub failed: usize,
    /// Records listed but not uploaded in a dry run
    pub skipped: usize,
    /// (record id, video URL) for every successful upload
    pub urls: Vec<(u64, String)>,
}

/// Upload pending catalog records in id order, recording each outcome.
pub async fn publish_pending(
    catalog: &Catalog,
    publisher: &dyn VideoPublisher,
    filter: &RecordFilter,
    options: &PublishOptions,
) -> Result<PublishReport> {
    let start_time = Instant::now();
    let mut records = catalog.pending(filter).await;
    if let Some(limit) = options.limit {
        records.truncate(limit);
    }

    info!("🚀 Publishing {} pending videos{}", records.len(), if options.dry_run { " (dry run)" } else { "" });

    let mut report = PublishReport::default();
    for (index, record) in records.iter().enumerate() {
        if options.dry_run {
            info!("🔎 Would upload #{} {}: {}", record.id, record.file_path.display(), record.title);
            report.skipped += 1;
            continue;
        }

        info!("📤 Uploading {}/{}: #{} {}", index + 1, records.len(), record.id, record.title);
        report.attempted += 1;

        match publish_with_retry(publisher, &UploadRequest::from_record(record), &options.retry).await {
            Ok(video) => {
                info!("✅ #{} published: {}", record.id, video.url);
                catalog
                    .mark_published(record.id, video.url.clone(), video.post_url)
                    .await?;
                report.published += 1;
                report.urls.push((record.id, video.url));
            }
            Err(e) => {
                warn!("❌ #{} failed: {}", record.id, e);
                catalog.mark_failed(record.id, e.to_string()).await?;
                report.failed += 1;
            }
        }
    }

    info!(
        "📊 Publishing finished in {:.2}s: {} published, {} failed",
        start_time.elapsed().as_secs_f64(),
        report.published,
        report.failed
    );
    Ok(report)
}

/// Upload a list of files outside the catalog. Failed uploads map to `None`.
pub async fn publish_batch(
    publisher: &dyn VideoPublisher,
    requests: &[UploadRequest],
    policy: &RetryPolicy,
) -> HashMap<PathBuf, Option<String>> {
    let mut results = HashMap::with_capacity(requests.len());
    for request in requests {
        let url = match publish_with_retry(publisher, request, policy).await {
            Ok(video) => Some(video.url),
            Err(e) => {
                warn!("❌ {} failed: {}", request.file_path.display(), e);
                None
            }
        };
        results.insert(request.file_path.clone(), url);
    }
    results
}
