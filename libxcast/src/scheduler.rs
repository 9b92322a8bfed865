//! Scheduler loop
//!
//! Each tick polls the store for due posts and delivers them, a few at a
//! time. Every post is handled on its own: it is claimed, its media are
//! resolved and uploaded, the post is created, and the outcome is written
//! back. A failure is recorded against that post only and never stops the
//! tick.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::delivery::DeliveryClient;
use crate::error::{Result, XcastError};
use crate::media::MediaLibrary;
use crate::store::PostStore;
use crate::types::{Post, PostState};

/// Tries at recording a delivered post before leaving it to the lease
const COMMIT_ATTEMPTS: u32 = 3;
const COMMIT_BACKOFF: Duration = Duration::from_millis(200);

/// Counts for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Posts that were due when the tick started
    pub due: usize,
    pub sent: usize,
    /// Posts whose attempt failed, whether they will be retried or not
    pub failed: usize,
    /// Posts another worker had claimed
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Sent,
    Failed,
    Skipped,
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub max_attempts: Option<u32>,
    pub concurrency: usize,
    pub claim_lease: i64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self::from(&SchedulerConfig::default())
    }
}

impl From<&SchedulerConfig> for SchedulerSettings {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            concurrency: config.concurrency.max(1),
            claim_lease: config.claim_lease,
        }
    }
}

pub struct Scheduler {
    store: PostStore,
    media: MediaLibrary,
    client: Arc<dyn DeliveryClient>,
    settings: SchedulerSettings,
    worker_id: String,
}

impl Scheduler {
    pub fn new(
        store: PostStore,
        media: MediaLibrary,
        client: Arc<dyn DeliveryClient>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            store,
            media,
            client,
            settings,
            worker_id: format!("xcast-{}", uuid::Uuid::new_v4()),
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Deliver everything due at `now`
    ///
    /// Only a failure to poll the store is returned as an error; delivery
    /// problems are recorded per post.
    pub async fn tick(&self, now: i64) -> Result<TickReport> {
        let due = self.store.due_unsent(now).await?;
        let mut report = TickReport {
            due: due.len(),
            ..Default::default()
        };

        if due.is_empty() {
            debug!("No posts due");
            return Ok(report);
        }

        info!(
            due = report.due,
            client = self.client.name(),
            "Found {} post(s) due for posting",
            report.due
        );

        let outcomes: Vec<Outcome> = stream::iter(due)
            .map(|post| self.deliver(post, now))
            .buffer_unordered(self.settings.concurrency)
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                Outcome::Sent => report.sent += 1,
                Outcome::Failed => report.failed += 1,
                Outcome::Skipped => report.skipped += 1,
            }
        }

        info!(
            sent = report.sent,
            failed = report.failed,
            skipped = report.skipped,
            "Tick finished"
        );
        Ok(report)
    }

    /// Tick every `interval` until `shutdown` is set
    pub async fn run(&self, interval: Duration, shutdown: Arc<AtomicBool>) {
        info!(
            worker = %self.worker_id,
            interval_secs = interval.as_secs(),
            "Scheduler started"
        );

        loop {
            if shutdown.load(Ordering::Relaxed) {
                info!("Shutdown requested, stopping scheduler");
                break;
            }

            if let Err(e) = self.tick(chrono::Utc::now().timestamp()).await {
                error!("Error processing posts: {}", e);
            }

            // Sleep until next poll (check shutdown every second)
            for _ in 0..interval.as_secs().max(1) {
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
                sleep(Duration::from_secs(1)).await;
            }
        }
    }

    #[tracing::instrument(skip(self, post, now), fields(post_id = post.id, account_id = post.account_id))]
    async fn deliver(&self, post: Post, now: i64) -> Outcome {
        match self
            .store
            .claim(post.id, &self.worker_id, now, self.settings.claim_lease)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                debug!("Post claimed elsewhere, skipping");
                return Outcome::Skipped;
            }
            Err(e) => {
                error!("Could not claim post: {}", e);
                return Outcome::Skipped;
            }
        }

        let account = match self.store.database().get_account(post.account_id).await {
            Ok(Some(account)) => account,
            Ok(None) => {
                let reason = format!("account {} not found", post.account_id);
                return self.fail(&post, &reason).await;
            }
            Err(e) => return self.fail(&post, &e.to_string()).await,
        };

        let resolution = self.media.resolve(post.account_id, &post.image_names).await;
        if !resolution.dropped.is_empty() {
            warn!(dropped = ?resolution.dropped, "More than 4 images, extra ones are not attached");
        }
        if !resolution.missing.is_empty() {
            warn!(missing = ?resolution.missing, "Images not found");
        }

        let mut handles = Vec::with_capacity(resolution.resolved.len());
        for path in &resolution.resolved {
            match self.client.upload_media(&account, path).await {
                Ok(handle) => handles.push(handle),
                Err(e) => warn!(file = %path.display(), "Skipping image: {}", e),
            }
        }

        let text = post.text();
        if text.is_none() && handles.is_empty() {
            let reason = if post.image_names.is_empty() {
                "no usable content: text is empty".to_string()
            } else {
                "no usable content: text is empty and no image could be attached".to_string()
            };
            return self.fail(&post, &reason).await;
        }

        let receipt = match self.client.create_post(&account, text, &handles).await {
            Ok(receipt) => receipt,
            Err(e) => {
                if let XcastError::Delivery(d) = &e {
                    if d.is_transient() {
                        info!("Transient delivery failure, will retry: {}", d);
                    }
                }
                return self.fail(&post, &e.to_string()).await;
            }
        };

        let committed =
            commit_with_retry(|| self.store.mark_sent(post.id, now, Some(&receipt.id))).await;
        match committed {
            Ok(()) => {
                info!(
                    remote_id = %receipt.id,
                    media = handles.len(),
                    "Post delivered"
                );
                Outcome::Sent
            }
            Err(e) => {
                // Still claimed: sent again once the lease expires
                error!(remote_id = %receipt.id, "Post delivered but could not be marked sent: {}", e);
                Outcome::Failed
            }
        }
    }

    async fn fail(&self, post: &Post, reason: &str) -> Outcome {
        match self
            .store
            .record_failure(post.id, reason, self.settings.max_attempts)
            .await
        {
            Ok(PostState::Failed) => {
                error!(attempts = post.attempts + 1, "Giving up on post: {}", reason);
            }
            Ok(_) => {
                warn!(attempts = post.attempts + 1, "Post failed, will retry next tick: {}", reason);
            }
            Err(e) => {
                error!("Could not record failure ({}): {}", reason, e);
                if let Err(e) = self.store.release(post.id, &self.worker_id).await {
                    error!("Could not release claim: {}", e);
                }
            }
        }
        Outcome::Failed
    }
}

/// Run `commit`, retrying database failures with a growing pause
///
/// Conflicts and missing rows are returned at once.
async fn commit_with_retry<F, Fut>(mut commit: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut attempt = 1;
    loop {
        match commit().await {
            Err(XcastError::Database(e)) if attempt < COMMIT_ATTEMPTS => {
                warn!(attempt, "Could not mark post sent, retrying: {}", e);
                sleep(COMMIT_BACKOFF * attempt).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}
