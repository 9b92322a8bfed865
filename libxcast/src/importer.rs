//! Bulk import of scheduled posts
//!
//! Items are validated one by one; every valid item is inserted in a
//! single transaction and every invalid one is reported with its index.

use chrono::Utc;
use serde::Serialize;

use crate::error::{ItemError, Result, XcastError};
use crate::store::{PostStore, ValidPost};
use crate::types::{AccountId, NewPost, PostId};

/// Largest batch accepted in one call
pub const MAX_BATCH: usize = 100;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub created_count: usize,
    pub total: usize,
    pub created_ids: Vec<PostId>,
    pub errors: Vec<ItemError>,
}

#[derive(Clone)]
pub struct Importer {
    store: PostStore,
}

impl Importer {
    pub fn new(store: PostStore) -> Self {
        Self { store }
    }

    /// Queue up to [`MAX_BATCH`] posts, keeping the valid ones
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an empty or oversized batch (nothing is inserted),
    /// `BatchRejected` when no item passes validation.
    pub async fn import_batch(&self, account_id: AccountId, items: &[NewPost]) -> Result<ImportReport> {
        if items.is_empty() {
            return Err(XcastError::InvalidInput("batch is empty".to_string()));
        }
        if items.len() > MAX_BATCH {
            return Err(XcastError::InvalidInput(format!(
                "at most {} posts per batch, got {}",
                MAX_BATCH,
                items.len()
            )));
        }

        let now = Utc::now();
        let mut valid: Vec<ValidPost> = Vec::with_capacity(items.len());
        let mut errors = Vec::new();

        for (index, item) in items.iter().enumerate() {
            match self.store.validate(item, now) {
                Ok(post) => valid.push(post),
                Err(e) => errors.push(ItemError {
                    index,
                    reason: item_reason(e),
                }),
            }
        }

        if valid.is_empty() {
            tracing::warn!(account_id, rejected = errors.len(), "Bulk import rejected every item");
            return Err(XcastError::BatchRejected { errors });
        }

        let created_ids = self
            .store
            .insert_all(account_id, &valid, now.timestamp())
            .await?;

        tracing::info!(
            account_id,
            created = created_ids.len(),
            rejected = errors.len(),
            "Bulk import finished"
        );

        Ok(ImportReport {
            created_count: created_ids.len(),
            total: items.len(),
            created_ids,
            errors,
        })
    }
}

fn item_reason(error: XcastError) -> String {
    match error {
        XcastError::InvalidInput(reason) => reason,
        other => other.to_string(),
    }
}
