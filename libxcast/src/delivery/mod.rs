//! Delivery to the X API
//!
//! [`DeliveryClient`] is the seam between the scheduler and the outside
//! world: [`x::XClient`] talks to the real API, [`mock::MockDelivery`]
//! records calls for tests.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::Account;

pub mod mock;
pub mod oauth;
pub mod x;

pub use mock::MockDelivery;
pub use x::XClient;

/// An uploaded media item, referenced when creating a post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaHandle {
    pub media_id: String,
}

/// What the platform returned for a created post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostReceipt {
    pub id: String,
    pub text: Option<String>,
}

#[async_trait]
pub trait DeliveryClient: Send + Sync {
    /// Upload one media file for the account
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Upload` when the file cannot be read or the
    /// platform rejects it.
    async fn upload_media(&self, account: &Account, path: &Path) -> Result<MediaHandle>;

    /// Publish a post with optional text and previously uploaded media
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` when there is neither text nor media, and a
    /// `DeliveryError` for upstream failures.
    async fn create_post(
        &self,
        account: &Account,
        text: Option<&str>,
        media: &[MediaHandle],
    ) -> Result<PostReceipt>;

    /// Client name for logs
    fn name(&self) -> &str;
}

/// Shared check for an empty post
pub(crate) fn ensure_content(text: Option<&str>, media: &[MediaHandle]) -> Result<()> {
    let has_text = text.map(|t| !t.trim().is_empty()).unwrap_or(false);
    if !has_text && media.is_empty() {
        return Err(crate::error::XcastError::InvalidInput(
            "post needs text or at least one media item".to_string(),
        ));
    }
    Ok(())
}
