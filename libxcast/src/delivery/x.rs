//! X (Twitter) API client
//!
//! Media goes through the v1.1 upload endpoint, posts through v2
//! `/2/tweets`. Both use OAuth 1.0a user-context signing with the
//! account's decrypted credentials, which are opened per request and
//! dropped as soon as the header is built.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{multipart, Client, StatusCode};
use serde::Deserialize;

use super::oauth::{self, OAuthKeys};
use super::{ensure_content, DeliveryClient, MediaHandle, PostReceipt};
use crate::config::DeliveryConfig;
use crate::error::{DeliveryError, Result};
use crate::types::{Account, ImageMimeType};
use crate::vault::CredentialVault;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    media_id_string: String,
}

#[derive(Debug, Deserialize)]
struct CreateTweetResponse {
    data: TweetData,
}

#[derive(Debug, Deserialize)]
struct TweetData {
    id: String,
    #[serde(default)]
    text: Option<String>,
}

pub struct XClient {
    http: Client,
    vault: Arc<CredentialVault>,
    api_base: String,
    upload_base: String,
}

impl XClient {
    pub fn new(vault: Arc<CredentialVault>, config: &DeliveryConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("xcast/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DeliveryError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            vault,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            upload_base: config.upload_base.trim_end_matches('/').to_string(),
        })
    }

    fn upload_url(&self) -> String {
        format!("{}/1.1/media/upload.json", self.upload_base)
    }

    fn tweets_url(&self) -> String {
        format!("{}/2/tweets", self.api_base)
    }

    /// Signed `Authorization` header for a POST without signed body params
    fn sign_post(&self, account: &Account, url: &str) -> Result<String> {
        let credentials = self.vault.open(account)?;
        let keys = OAuthKeys {
            consumer_key: credentials.api_key(),
            consumer_secret: credentials.api_secret(),
            token: credentials.access_token(),
            token_secret: credentials.access_token_secret(),
        };

        oauth::authorization_header(
            "POST",
            url,
            &keys,
            &[],
            &oauth::nonce(),
            chrono::Utc::now().timestamp(),
        )
    }
}

#[async_trait]
impl DeliveryClient for XClient {
    async fn upload_media(&self, account: &Account, path: &Path) -> Result<MediaHandle> {
        let mime = ImageMimeType::from_path(path).ok_or_else(|| {
            DeliveryError::Upload(format!("unsupported media type: {}", path.display()))
        })?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| DeliveryError::Upload(format!("cannot read {}: {}", path.display(), e)))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("media")
            .to_string();

        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime.as_str())
            .map_err(|e| DeliveryError::Upload(e.to_string()))?;
        let form = multipart::Form::new()
            .text("media_category", mime.media_category())
            .part("media", part);

        let url = self.upload_url();
        let authorization = self.sign_post(account, &url)?;

        let response = self
            .http
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .multipart(form)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(status, body, DeliveryError::Upload).into());
        }

        let upload: UploadResponse = response
            .json()
            .await
            .map_err(|e| DeliveryError::Upload(format!("unexpected upload response: {}", e)))?;

        tracing::debug!(account_id = account.id, media_id = %upload.media_id_string, "Uploaded media");

        Ok(MediaHandle {
            media_id: upload.media_id_string,
        })
    }

    async fn create_post(
        &self,
        account: &Account,
        text: Option<&str>,
        media: &[MediaHandle],
    ) -> Result<PostReceipt> {
        ensure_content(text, media)?;

        let mut body = serde_json::json!({});
        if let Some(text) = text.filter(|t| !t.trim().is_empty()) {
            body["text"] = serde_json::json!(text);
        }
        if !media.is_empty() {
            let ids: Vec<&str> = media.iter().map(|m| m.media_id.as_str()).collect();
            body["media"] = serde_json::json!({ "media_ids": ids });
        }

        let url = self.tweets_url();
        let authorization = self.sign_post(account, &url)?;

        let response = self
            .http
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(status, body, DeliveryError::Posting).into());
        }

        let created: CreateTweetResponse = response
            .json()
            .await
            .map_err(|e| DeliveryError::Posting(format!("unexpected response: {}", e)))?;

        Ok(PostReceipt {
            id: created.data.id,
            text: created.data.text,
        })
    }

    fn name(&self) -> &str {
        "x"
    }
}

fn map_transport_error(e: reqwest::Error) -> DeliveryError {
    if e.is_timeout() {
        DeliveryError::Network(format!("request timed out: {}", e))
    } else {
        DeliveryError::Network(e.to_string())
    }
}

/// Classify a non-success response; `other` wraps anything not auth or rate limit
fn map_status(status: StatusCode, body: String, other: fn(String) -> DeliveryError) -> DeliveryError {
    let message = if body.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, body)
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DeliveryError::Authentication(message),
        StatusCode::TOO_MANY_REQUESTS => DeliveryError::RateLimit(message),
        _ => other(message),
    }
}
