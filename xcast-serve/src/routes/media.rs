//! Per-account image library

use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use libxcast::types::AccountId;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// GET /accounts/{id}/images
pub async fn list_images(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
) -> AppResult<Json<Vec<String>>> {
    state.db.require_account(id).await?;
    Ok(Json(state.media.list(id).await?))
}

/// GET /accounts/{id}/images/{name}
pub async fn get_image(
    State(state): State<AppState>,
    Path((id, name)): Path<(AccountId, String)>,
) -> AppResult<impl IntoResponse> {
    let (bytes, mime) = state.media.read(id, &name).await?;
    Ok(([(header::CONTENT_TYPE, mime.as_str())], bytes))
}

/// DELETE /accounts/{id}/images/{name}
pub async fn delete_image(
    State(state): State<AppState>,
    Path((id, name)): Path<(AccountId, String)>,
) -> AppResult<Json<serde_json::Value>> {
    state.media.delete(id, &name).await?;
    Ok(super::success())
}

/// POST /accounts/{id}/upload
///
/// Expects a multipart field named `file`; other fields are ignored.
pub async fn upload_image(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    state.db.require_account(id).await?;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let original_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::BadRequest("file field has no file name".to_string()))?;
        let bytes = field.bytes().await?;

        let stored = state.media.store(id, &original_name, &bytes).await?;
        return Ok((StatusCode::CREATED, Json(json!({ "filename": stored }))));
    }

    Err(AppError::BadRequest(
        "multipart body has no 'file' field".to_string(),
    ))
}
