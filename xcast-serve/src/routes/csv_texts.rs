use axum::extract::{Path, State};
use axum::Json;
use libxcast::types::{AccountId, CsvTextBank};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::extract::AppJson;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SaveTexts {
    pub texts: Vec<String>,
}

#[derive(Serialize)]
pub struct TextsResponse {
    pub texts: Vec<String>,
    pub count: usize,
    pub updated_at: Option<i64>,
}

impl From<CsvTextBank> for TextsResponse {
    fn from(bank: CsvTextBank) -> Self {
        Self {
            count: bank.count(),
            texts: bank.texts,
            updated_at: bank.updated_at,
        }
    }
}

/// GET /accounts/{id}/csv-texts
pub async fn get_texts(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
) -> AppResult<Json<TextsResponse>> {
    state.db.require_account(id).await?;
    Ok(Json(state.db.get_csv_texts(id).await?.into()))
}

/// POST /accounts/{id}/csv-texts
pub async fn save_texts(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
    AppJson(request): AppJson<SaveTexts>,
) -> AppResult<Json<TextsResponse>> {
    state.db.require_account(id).await?;
    let bank = state
        .db
        .save_csv_texts(id, &request.texts, chrono::Utc::now().timestamp())
        .await?;
    Ok(Json(bank.into()))
}
