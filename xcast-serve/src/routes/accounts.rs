//! Account registration and dashboard summaries

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use libxcast::types::{Account, AccountId, AccountUpdate};
use libxcast::{AccountSummary, NewAccount, PostReceipt};
use tracing::info;

use crate::error::AppResult;
use crate::extract::AppJson;
use crate::state::AppState;

const TEST_TWEET: &str = "Hello World!";

async fn summarize(state: &AppState, account: &Account) -> AppResult<AccountSummary> {
    let (last_posted_at, next_scheduled_at) = state.store.account_activity(account.id).await?;
    Ok(AccountSummary::masked(account).with_activity(last_posted_at, next_scheduled_at))
}

/// GET /accounts
pub async fn list_accounts(State(state): State<AppState>) -> AppResult<Json<Vec<AccountSummary>>> {
    let accounts = state.db.list_accounts().await?;

    let mut summaries = Vec::with_capacity(accounts.len());
    for account in &accounts {
        summaries.push(summarize(&state, account).await?);
    }
    Ok(Json(summaries))
}

/// POST /accounts
pub async fn create_account(
    State(state): State<AppState>,
    AppJson(registration): AppJson<NewAccount>,
) -> AppResult<(StatusCode, Json<AccountSummary>)> {
    registration.validate()?;

    let sealed = state.vault.seal(&registration)?;
    let account = state
        .db
        .create_account(
            registration.name.trim(),
            &sealed,
            chrono::Utc::now().timestamp(),
        )
        .await?;

    info!(account_id = account.id, "Account registered");
    Ok((StatusCode::CREATED, Json(AccountSummary::masked(&account))))
}

/// GET /accounts/{id}
pub async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
) -> AppResult<Json<AccountSummary>> {
    let account = state.db.require_account(id).await?;
    Ok(Json(summarize(&state, &account).await?))
}

/// PUT /accounts/{id}
///
/// Fields left out, blank, or sent back as `****` keep their stored value.
pub async fn update_account(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
    AppJson(update): AppJson<AccountUpdate>,
) -> AppResult<Json<serde_json::Value>> {
    let sealed = state.vault.seal_update(&update)?;
    state.db.update_account(id, &sealed).await?;

    info!(account_id = id, "Account updated");
    Ok(super::success())
}

/// POST /accounts/{id}/test-tweet
pub async fn test_tweet(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
) -> AppResult<Json<PostReceipt>> {
    let account = state.db.require_account(id).await?;
    let receipt = state
        .delivery
        .create_post(&account, Some(TEST_TWEET), &[])
        .await?;

    info!(account_id = id, remote_id = %receipt.id, "Test post sent");
    Ok(Json(receipt))
}
