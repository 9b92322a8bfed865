//! Post store
//!
//! Durable queue of scheduled posts. Every state change goes through
//! [`PostState::next`] and is written as a single guarded UPDATE, so
//! `posted_at` is set exactly when a post is sent.

use chrono::{DateTime, FixedOffset, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::db::{decode_list, encode_list, Database};
use crate::error::{DbError, Result, XcastError};
use crate::scheduling::parse_schedule;
use crate::types::{AccountId, NewPost, Post, PostId, PostState, Transition};

const POST_COLUMNS: &str = "id, account_id, content, image_names, state, scheduled_at, \
     posted_at, remote_id, attempts, last_error, created_at";

/// A post that passed validation and is ready to insert
#[derive(Debug, Clone, PartialEq)]
pub struct ValidPost {
    pub content: Option<String>,
    pub image_names: Vec<String>,
    pub scheduled_at: i64,
}

/// Seconds a delivery claim stays valid unless configured otherwise
pub const DEFAULT_CLAIM_LEASE: i64 = 600;

#[derive(Clone)]
pub struct PostStore {
    db: Database,
    offset: FixedOffset,
    claim_lease: i64,
}

impl PostStore {
    /// `offset` is used for schedule strings without an explicit zone
    pub fn new(db: Database, offset: FixedOffset) -> Self {
        Self {
            db,
            offset,
            claim_lease: DEFAULT_CLAIM_LEASE,
        }
    }

    /// Lease after which a claimed post may be deleted again
    ///
    /// Should match the lease the scheduler claims with.
    pub fn with_claim_lease(mut self, lease: i64) -> Self {
        self.claim_lease = lease;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Check a submitted post and resolve its schedule
    ///
    /// Blank text is treated as absent; image names are trimmed and blanks
    /// dropped. At least one of text or images must remain.
    pub fn validate(&self, post: &NewPost, now: DateTime<Utc>) -> Result<ValidPost> {
        let content = post
            .content
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .map(str::to_string);

        let image_names: Vec<String> = post
            .image_names
            .iter()
            .map(|n| n.trim())
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect();

        if content.is_none() && image_names.is_empty() {
            return Err(XcastError::InvalidInput(
                "post needs text or at least one image".to_string(),
            ));
        }

        let scheduled_at = parse_schedule(&post.scheduled_at, now, self.offset)?;

        Ok(ValidPost {
            content,
            image_names,
            scheduled_at,
        })
    }

    /// Validate and queue a single post
    pub async fn enqueue(&self, account_id: AccountId, post: &NewPost) -> Result<PostId> {
        let now = Utc::now();
        let valid = self.validate(post, now)?;
        let ids = self.insert_all(account_id, &[valid], now.timestamp()).await?;
        ids.into_iter()
            .next()
            .ok_or_else(|| XcastError::Conflict("post was not inserted".to_string()))
    }

    /// Insert validated posts in one transaction
    pub async fn insert_all(
        &self,
        account_id: AccountId,
        posts: &[ValidPost],
        now: i64,
    ) -> Result<Vec<PostId>> {
        let mut tx = self.db.pool().begin().await.map_err(DbError::SqlxError)?;
        let mut ids = Vec::with_capacity(posts.len());

        for post in posts {
            let result = sqlx::query(
                r#"
                INSERT INTO posts (account_id, content, image_names, state, scheduled_at, created_at)
                VALUES (?, ?, ?, 'pending', ?, ?)
                "#,
            )
            .bind(account_id)
            .bind(&post.content)
            .bind(encode_list(&post.image_names)?)
            .bind(post.scheduled_at)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(DbError::SqlxError)?;

            ids.push(result.last_insert_rowid());
        }

        tx.commit().await.map_err(DbError::SqlxError)?;
        Ok(ids)
    }

    pub async fn get(&self, post_id: PostId) -> Result<Option<Post>> {
        let row = sqlx::query(&format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS))
            .bind(post_id)
            .fetch_optional(self.db.pool())
            .await
            .map_err(DbError::SqlxError)?;

        row.as_ref().map(post_from_row).transpose()
    }

    async fn require(&self, post_id: PostId) -> Result<Post> {
        self.get(post_id)
            .await?
            .ok_or_else(|| XcastError::not_found("post", post_id))
    }

    /// All posts of an account, soonest first
    pub async fn list_for_account(&self, account_id: AccountId) -> Result<Vec<Post>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM posts WHERE account_id = ? ORDER BY scheduled_at, id",
            POST_COLUMNS
        ))
        .bind(account_id)
        .fetch_all(self.db.pool())
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter().map(post_from_row).collect()
    }

    /// Pending posts scheduled at or before `now`, oldest first
    pub async fn due_unsent(&self, now: i64) -> Result<Vec<Post>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM posts WHERE state = 'pending' AND scheduled_at <= ? \
             ORDER BY scheduled_at, id",
            POST_COLUMNS
        ))
        .bind(now)
        .fetch_all(self.db.pool())
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter().map(post_from_row).collect()
    }

    /// Take the delivery lease on a pending post
    ///
    /// Returns `false` when the post is no longer pending or another worker
    /// holds a lease younger than `lease` seconds.
    pub async fn claim(&self, post_id: PostId, worker: &str, now: i64, lease: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE posts SET claimed_by = ?, claimed_at = ?
            WHERE id = ? AND state = 'pending'
              AND (claimed_by IS NULL OR claimed_at < ?)
            "#,
        )
        .bind(worker)
        .bind(now)
        .bind(post_id)
        .bind(now - lease)
        .execute(self.db.pool())
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }

    /// Drop a lease without recording anything
    pub async fn release(&self, post_id: PostId, worker: &str) -> Result<()> {
        sqlx::query(
            "UPDATE posts SET claimed_by = NULL, claimed_at = NULL WHERE id = ? AND claimed_by = ?",
        )
        .bind(post_id)
        .bind(worker)
        .execute(self.db.pool())
        .await
        .map_err(DbError::SqlxError)?;
        Ok(())
    }

    /// Record a successful delivery
    pub async fn mark_sent(&self, post_id: PostId, sent_at: i64, remote_id: Option<&str>) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET state = 'sent', posted_at = ?, remote_id = ?, last_error = NULL,
                claimed_by = NULL, claimed_at = NULL
            WHERE id = ? AND state = 'pending'
            "#,
        )
        .bind(sent_at)
        .bind(remote_id)
        .bind(post_id)
        .execute(self.db.pool())
        .await
        .map_err(DbError::SqlxError)?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        // Nothing changed: report why
        let post = self.require(post_id).await?;
        post.state.next(Transition::Deliver)?;
        Err(XcastError::Conflict(format!(
            "post {} changed while being marked sent",
            post_id
        )))
    }

    /// Count a failed attempt and return the resulting state
    pub async fn record_failure(
        &self,
        post_id: PostId,
        error: &str,
        max_attempts: Option<u32>,
    ) -> Result<PostState> {
        let post = self.require(post_id).await?;
        let attempts = post.attempts.saturating_add(1);
        let next = post.state.next(Transition::Fail {
            attempts,
            max_attempts,
        })?;

        let result = sqlx::query(
            r#"
            UPDATE posts
            SET state = ?, attempts = ?, last_error = ?, claimed_by = NULL, claimed_at = NULL
            WHERE id = ? AND state = 'pending'
            "#,
        )
        .bind(next.as_str())
        .bind(i64::from(attempts))
        .bind(error)
        .bind(post_id)
        .execute(self.db.pool())
        .await
        .map_err(DbError::SqlxError)?;

        if result.rows_affected() == 0 {
            return Err(XcastError::Conflict(format!(
                "post {} is no longer pending",
                post_id
            )));
        }
        Ok(next)
    }

    /// Put a failed post back in the queue with a fresh attempt count
    pub async fn requeue(&self, post_id: PostId) -> Result<()> {
        let post = self.require(post_id).await?;
        post.state.next(Transition::Requeue)?;

        sqlx::query(
            r#"
            UPDATE posts SET state = 'pending', attempts = 0, last_error = NULL
            WHERE id = ? AND state = 'failed'
            "#,
        )
        .bind(post_id)
        .execute(self.db.pool())
        .await
        .map_err(DbError::SqlxError)?;
        Ok(())
    }

    /// Remove an unsent post
    ///
    /// A post claimed by a scheduler less than the claim lease before `now`
    /// is being delivered and cannot be removed.
    pub async fn delete(&self, post_id: PostId, now: i64) -> Result<()> {
        let post = self.require(post_id).await?;
        if !post.state.can_delete() {
            return Err(XcastError::Conflict(format!(
                "post {} was already sent",
                post_id
            )));
        }

        let result = sqlx::query(
            r#"
            DELETE FROM posts
            WHERE id = ? AND state != 'sent'
              AND (claimed_by IS NULL OR claimed_at < ?)
            "#,
        )
        .bind(post_id)
        .bind(now - self.claim_lease)
        .execute(self.db.pool())
        .await
        .map_err(DbError::SqlxError)?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        match self.get(post_id).await? {
            Some(post) if post.is_posted() => Err(XcastError::Conflict(format!(
                "post {} was sent while being deleted",
                post_id
            ))),
            Some(_) => Err(XcastError::Conflict(format!(
                "post {} is being delivered",
                post_id
            ))),
            None => Err(XcastError::not_found("post", post_id)),
        }
    }

    /// Last sent and next pending timestamps for an account
    pub async fn account_activity(&self, account_id: AccountId) -> Result<(Option<i64>, Option<i64>)> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT MAX(posted_at) FROM posts WHERE account_id = ? AND state = 'sent') AS last_posted,
                (SELECT MIN(scheduled_at) FROM posts WHERE account_id = ? AND state = 'pending') AS next_scheduled
            "#,
        )
        .bind(account_id)
        .bind(account_id)
        .fetch_one(self.db.pool())
        .await
        .map_err(DbError::SqlxError)?;

        Ok((row.get("last_posted"), row.get("next_scheduled")))
    }
}

fn post_from_row(r: &SqliteRow) -> Result<Post> {
    let state: String = r.get("state");
    let state = PostState::parse(&state).ok_or_else(|| DbError::Corrupt {
        column: "posts.state",
        reason: format!("unknown state '{}'", state),
    })?;

    Ok(Post {
        id: r.get("id"),
        account_id: r.get("account_id"),
        content: r.get("content"),
        image_names: decode_list("posts.image_names", r.get("image_names"))?,
        state,
        scheduled_at: r.get("scheduled_at"),
        posted_at: r.get("posted_at"),
        remote_id: r.get("remote_id"),
        attempts: r.get::<i64, _>("attempts").try_into().unwrap_or(u32::MAX),
        last_error: r.get("last_error"),
        created_at: r.get("created_at"),
    })
}
