//! Queue management for an account's posts

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use libxcast::types::{AccountId, PostId};
use libxcast::{ImportReport, NewPost, Post, XcastError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::error::AppResult;
use crate::extract::AppJson;
use crate::state::AppState;

#[derive(Serialize)]
pub struct PostList {
    pub account_name: String,
    pub tweets: Vec<Post>,
}

#[derive(Deserialize)]
pub struct BulkRequest {
    pub tweets: Vec<NewPost>,
}

/// Load a post and check that it belongs to the account in the path
async fn owned_post(state: &AppState, account_id: AccountId, post_id: PostId) -> AppResult<Post> {
    match state.store.get(post_id).await? {
        Some(post) if post.account_id == account_id => Ok(post),
        _ => Err(XcastError::not_found("post", post_id).into()),
    }
}

/// GET /accounts/{id}/tweets
pub async fn list_posts(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
) -> AppResult<Json<PostList>> {
    let account = state.db.require_account(id).await?;
    let tweets = state.store.list_for_account(id).await?;

    Ok(Json(PostList {
        account_name: account.name,
        tweets,
    }))
}

/// POST /accounts/{id}/tweets
pub async fn create_post(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
    AppJson(post): AppJson<NewPost>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    state.db.require_account(id).await?;
    let post_id = state.store.enqueue(id, &post).await?;

    info!(account_id = id, post_id, "Post queued");
    Ok((StatusCode::CREATED, Json(json!({ "id": post_id }))))
}

/// POST /accounts/{id}/bulk-tweets
pub async fn bulk_create(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
    AppJson(request): AppJson<BulkRequest>,
) -> AppResult<Json<ImportReport>> {
    state.db.require_account(id).await?;
    let report = state.importer.import_batch(id, &request.tweets).await?;

    info!(
        account_id = id,
        created = report.created_count,
        total = report.total,
        "Bulk import finished"
    );
    Ok(Json(report))
}

/// DELETE /accounts/{id}/tweets/{tid}
pub async fn delete_post(
    State(state): State<AppState>,
    Path((id, tid)): Path<(AccountId, PostId)>,
) -> AppResult<Json<serde_json::Value>> {
    owned_post(&state, id, tid).await?;
    state.store.delete(tid, Utc::now().timestamp()).await?;
    Ok(super::success())
}

/// POST /accounts/{id}/tweets/{tid}/retry
pub async fn retry_post(
    State(state): State<AppState>,
    Path((id, tid)): Path<(AccountId, PostId)>,
) -> AppResult<Json<serde_json::Value>> {
    owned_post(&state, id, tid).await?;
    state.store.requeue(tid).await?;

    info!(account_id = id, post_id = tid, "Post requeued");
    Ok(super::success())
}
