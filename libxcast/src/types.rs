//! Core types for xcast

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Result, XcastError};

pub type AccountId = i64;
pub type PostId = i64;

/// Placeholder shown instead of credential values
pub const MASK: &str = "****";

/// A stored account; the credential fields hold vault ciphertext
#[derive(Debug, Clone)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub api_key: String,
    pub api_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
    pub created_at: i64,
}

/// Registration payload with plaintext credentials
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewAccount {
    pub name: String,
    pub api_key: String,
    pub api_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

impl NewAccount {
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("name", &self.name),
            ("api_key", &self.api_key),
            ("api_secret", &self.api_secret),
            ("access_token", &self.access_token),
            ("access_token_secret", &self.access_token_secret),
        ];
        let missing: Vec<&str> = fields
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(XcastError::InvalidInput(format!(
                "missing required fields: {}",
                missing.join(", ")
            )))
        }
    }
}

/// Partial account update; `None` or [`MASK`] leaves a field unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountUpdate {
    pub name: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub access_token: Option<String>,
    pub access_token_secret: Option<String>,
}

impl AccountUpdate {
    /// The new value for a field, or `None` when it should stay as is
    pub fn changed(value: &Option<String>) -> Option<&str> {
        value
            .as_deref()
            .filter(|v| *v != MASK && !v.trim().is_empty())
    }
}

/// What API responses show for an account
#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    pub id: AccountId,
    pub name: String,
    pub api_key: &'static str,
    pub api_secret: &'static str,
    pub access_token: &'static str,
    pub access_token_secret: &'static str,
    pub last_posted_at: Option<i64>,
    pub next_scheduled_at: Option<i64>,
}

impl AccountSummary {
    pub fn masked(account: &Account) -> Self {
        Self {
            id: account.id,
            name: account.name.clone(),
            api_key: MASK,
            api_secret: MASK,
            access_token: MASK,
            access_token_secret: MASK,
            last_posted_at: None,
            next_scheduled_at: None,
        }
    }

    pub fn with_activity(mut self, last_posted_at: Option<i64>, next_scheduled_at: Option<i64>) -> Self {
        self.last_posted_at = last_posted_at;
        self.next_scheduled_at = next_scheduled_at;
        self
    }
}

/// Delivery state of a post
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PostState {
    /// Queued, waiting for its time or for a retry
    Pending,
    /// Delivered upstream
    Sent,
    /// Gave up after the configured number of attempts
    Failed,
}

/// Events that move a post between states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Deliver,
    Fail { attempts: u32, max_attempts: Option<u32> },
    Requeue,
}

impl PostState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostState::Pending => "pending",
            PostState::Sent => "sent",
            PostState::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PostState::Pending),
            "sent" => Some(PostState::Sent),
            "failed" => Some(PostState::Failed),
            _ => None,
        }
    }

    /// Apply a transition, rejecting anything that is not allowed from here
    pub fn next(self, transition: Transition) -> Result<PostState> {
        match (self, transition) {
            (PostState::Pending, Transition::Deliver) => Ok(PostState::Sent),
            (PostState::Pending, Transition::Fail { attempts, max_attempts }) => {
                match max_attempts {
                    Some(max) if attempts >= max => Ok(PostState::Failed),
                    _ => Ok(PostState::Pending),
                }
            }
            (PostState::Failed, Transition::Requeue) => Ok(PostState::Pending),
            (state, transition) => Err(XcastError::Conflict(format!(
                "cannot apply {:?} to a {} post",
                transition,
                state.as_str()
            ))),
        }
    }

    /// Sent posts are history and stay put
    pub fn can_delete(&self) -> bool {
        !matches!(self, PostState::Sent)
    }
}

impl std::fmt::Display for PostState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    pub id: PostId,
    pub account_id: AccountId,
    pub content: Option<String>,
    pub image_names: Vec<String>,
    pub state: PostState,
    pub scheduled_at: i64,
    pub posted_at: Option<i64>,
    pub remote_id: Option<String>,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: i64,
}

impl Post {
    pub fn is_posted(&self) -> bool {
        self.state == PostState::Sent
    }

    /// Text content if it has anything besides whitespace
    pub fn text(&self) -> Option<&str> {
        self.content.as_deref().filter(|c| !c.trim().is_empty())
    }
}

/// A post as submitted for queueing, before validation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPost {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub image_names: Vec<String>,
    pub scheduled_at: String,
}

impl NewPost {
    pub fn text(content: &str, scheduled_at: &str) -> Self {
        Self {
            content: Some(content.to_string()),
            image_names: vec![],
            scheduled_at: scheduled_at.to_string(),
        }
    }
}

/// Reusable text snippets for one account
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CsvTextBank {
    pub account_id: AccountId,
    pub texts: Vec<String>,
    pub updated_at: Option<i64>,
}

impl CsvTextBank {
    pub fn count(&self) -> usize {
        self.texts.len()
    }
}

/// A named recurring time-of-day pattern
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HourlySchedule {
    pub id: i64,
    pub account_id: AccountId,
    pub name: String,
    /// "HH:MM", sorted and unique
    pub hours: Vec<String>,
    pub start_date: Option<NaiveDate>,
    pub is_active: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewHourlySchedule {
    pub name: String,
    pub hours: Vec<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HourlyScheduleUpdate {
    pub name: Option<String>,
    pub hours: Option<Vec<String>>,
    pub start_date: Option<NaiveDate>,
    pub is_active: Option<bool>,
}

fn default_true() -> bool {
    true
}

/// Supported image MIME types for attachments
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ImageMimeType {
    Jpeg,
    Png,
    Gif,
    WebP,
}

impl ImageMimeType {
    /// Detect MIME type from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detect MIME type from a file name or path
    pub fn from_path(path: &std::path::Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
        }
    }

    /// Media category the upload endpoint expects
    pub fn media_category(&self) -> &'static str {
        match self {
            Self::Gif => "tweet_gif",
            _ => "tweet_image",
        }
    }
}

impl std::fmt::Display for ImageMimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
