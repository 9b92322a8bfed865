//! Mock delivery client for testing
//!
//! Records every upload and post so tests can check exactly what would
//! have reached the platform, and can be told to fail uploads for
//! particular files or every post.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use super::{ensure_content, DeliveryClient, MediaHandle, PostReceipt};
use crate::error::{DeliveryError, Result};
use crate::types::{Account, AccountId};

/// A post the mock accepted
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPost {
    pub account_id: AccountId,
    pub text: Option<String>,
    pub media_ids: Vec<String>,
    pub remote_id: String,
}

/// Configuration for mock delivery behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub name: String,

    /// Error returned by every `create_post` call
    pub post_error: Option<DeliveryError>,

    /// File names whose upload fails
    pub failing_uploads: Vec<String>,

    /// Delay before completing operations (simulates network latency)
    pub delay: Duration,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            post_error: None,
            failing_uploads: vec![],
            delay: Duration::from_millis(0),
        }
    }
}

/// Mock delivery client; clones share their recorded calls
#[derive(Debug, Clone)]
pub struct MockDelivery {
    config: MockConfig,
    next_id: Arc<AtomicU64>,
    uploads: Arc<Mutex<Vec<PathBuf>>>,
    posts: Arc<Mutex<Vec<RecordedPost>>>,
}

impl MockDelivery {
    pub fn new(config: MockConfig) -> Self {
        Self {
            config,
            next_id: Arc::new(AtomicU64::new(1)),
            uploads: Arc::new(Mutex::new(Vec::new())),
            posts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A client that accepts everything
    pub fn success() -> Self {
        Self::new(MockConfig::default())
    }

    /// A client whose posts always fail with `error`
    pub fn post_failure(error: DeliveryError) -> Self {
        Self::new(MockConfig {
            post_error: Some(error),
            ..Default::default()
        })
    }

    /// A client that fails uploads of the named files
    pub fn failing_uploads(names: &[&str]) -> Self {
        Self::new(MockConfig {
            failing_uploads: names.iter().map(|n| n.to_string()).collect(),
            ..Default::default()
        })
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self::new(MockConfig {
            delay,
            ..Default::default()
        })
    }

    /// Paths of attempted uploads, including failed ones
    pub fn uploads(&self) -> Vec<PathBuf> {
        self.uploads.lock().map(|u| u.clone()).unwrap_or_default()
    }

    pub fn posts(&self) -> Vec<RecordedPost> {
        self.posts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn post_call_count(&self) -> usize {
        self.posts().len()
    }

    fn remote_id(&self) -> String {
        format!("{}", 1_000 + self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl DeliveryClient for MockDelivery {
    async fn upload_media(&self, _account: &Account, path: &Path) -> Result<MediaHandle> {
        if let Ok(mut uploads) = self.uploads.lock() {
            uploads.push(path.to_path_buf());
        }

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if self.config.failing_uploads.iter().any(|f| f == file_name) {
            return Err(DeliveryError::Upload(format!("mock upload rejected {}", file_name)).into());
        }

        Ok(MediaHandle {
            media_id: format!("media-{}", self.remote_id()),
        })
    }

    async fn create_post(
        &self,
        account: &Account,
        text: Option<&str>,
        media: &[MediaHandle],
    ) -> Result<PostReceipt> {
        ensure_content(text, media)?;

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        if let Some(error) = &self.config.post_error {
            return Err(error.clone().into());
        }

        let remote_id = self.remote_id();
        if let Ok(mut posts) = self.posts.lock() {
            posts.push(RecordedPost {
                account_id: account.id,
                text: text.map(str::to_string),
                media_ids: media.iter().map(|m| m.media_id.clone()).collect(),
                remote_id: remote_id.clone(),
            });
        }

        Ok(PostReceipt {
            id: remote_id,
            text: text.map(str::to_string),
        })
    }

    fn name(&self) -> &str {
        &self.config.name
    }
}
