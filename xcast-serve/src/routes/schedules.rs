//! Hourly schedule templates and their expansion into queued posts

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use libxcast::hourly;
use libxcast::types::{AccountId, HourlySchedule, HourlyScheduleUpdate, NewHourlySchedule};
use libxcast::{ImportReport, XcastError};
use serde::Deserialize;
use tracing::info;

use crate::error::AppResult;
use crate::extract::AppJson;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ApplyRequest {
    /// Texts to place on the slots; the account's CSV text bank when absent
    #[serde(default)]
    pub texts: Option<Vec<String>>,
}

/// GET /accounts/{id}/hourly-schedules
pub async fn list_schedules(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
) -> AppResult<Json<Vec<HourlySchedule>>> {
    state.db.require_account(id).await?;
    Ok(Json(state.db.list_hourly_schedules(id).await?))
}

/// POST /accounts/{id}/hourly-schedules
pub async fn create_schedule(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
    AppJson(schedule): AppJson<NewHourlySchedule>,
) -> AppResult<(StatusCode, Json<HourlySchedule>)> {
    state.db.require_account(id).await?;
    let created = state
        .db
        .create_hourly_schedule(id, &schedule, chrono::Utc::now().timestamp())
        .await?;

    info!(account_id = id, schedule_id = created.id, "Hourly schedule created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /accounts/{id}/hourly-schedules/{sid}
pub async fn update_schedule(
    State(state): State<AppState>,
    Path((id, sid)): Path<(AccountId, i64)>,
    AppJson(update): AppJson<HourlyScheduleUpdate>,
) -> AppResult<Json<HourlySchedule>> {
    Ok(Json(state.db.update_hourly_schedule(id, sid, &update).await?))
}

/// DELETE /accounts/{id}/hourly-schedules/{sid}
pub async fn delete_schedule(
    State(state): State<AppState>,
    Path((id, sid)): Path<(AccountId, i64)>,
) -> AppResult<Json<serde_json::Value>> {
    state.db.delete_hourly_schedule(id, sid).await?;
    Ok(super::success())
}

/// POST /accounts/{id}/hourly-schedules/{sid}/apply
///
/// Queues one post per text on the schedule's next free slots.
pub async fn apply_schedule(
    State(state): State<AppState>,
    Path((id, sid)): Path<(AccountId, i64)>,
    AppJson(request): AppJson<ApplyRequest>,
) -> AppResult<Json<ImportReport>> {
    let schedule = state.db.get_hourly_schedule(id, sid).await?;
    if !schedule.is_active {
        return Err(XcastError::InvalidInput(format!("hourly schedule {} is inactive", sid)).into());
    }

    let texts: Vec<String> = match request.texts {
        Some(texts) => texts,
        None => state.db.get_csv_texts(id).await?.texts,
    }
    .into_iter()
    .filter(|t| !t.trim().is_empty())
    .collect();

    if texts.is_empty() {
        return Err(XcastError::InvalidInput("no texts to schedule".to_string()).into());
    }

    let posts = hourly::plan_posts(
        &schedule,
        &texts,
        chrono::Utc::now().timestamp(),
        state.store.offset(),
    );
    let report = state.importer.import_batch(id, &posts).await?;

    info!(
        account_id = id,
        schedule_id = sid,
        created = report.created_count,
        "Hourly schedule applied"
    );
    Ok(Json(report))
}
