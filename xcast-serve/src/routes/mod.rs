pub mod accounts;
pub mod csv_texts;
pub mod health;
pub mod media;
pub mod posts;
pub mod schedules;

use axum::routing::{get, post, put};
use axum::Router;

use crate::state::AppState;

/// Build the account-scoped route tree.
///
/// ```text
/// /accounts                                        list, register
/// /accounts/{id}                                   get, update
/// /accounts/{id}/test-tweet                        send "Hello World!" now (POST)
/// /accounts/{id}/tweets                            list, enqueue
/// /accounts/{id}/bulk-tweets                       import up to 100 (POST)
/// /accounts/{id}/tweets/{tid}                      delete
/// /accounts/{id}/tweets/{tid}/retry                requeue a failed post (POST)
/// /accounts/{id}/hourly-schedules                  list, create
/// /accounts/{id}/hourly-schedules/{sid}            update, delete
/// /accounts/{id}/hourly-schedules/{sid}/apply      queue texts on the slots (POST)
/// /accounts/{id}/images                            list
/// /accounts/{id}/images/{name}                     download, delete
/// /accounts/{id}/upload                            multipart upload (POST)
/// /accounts/{id}/csv-texts                         get, replace
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/accounts",
            get(accounts::list_accounts).post(accounts::create_account),
        )
        .route(
            "/accounts/{id}",
            get(accounts::get_account).put(accounts::update_account),
        )
        .route("/accounts/{id}/test-tweet", post(accounts::test_tweet))
        .route(
            "/accounts/{id}/tweets",
            get(posts::list_posts).post(posts::create_post),
        )
        .route("/accounts/{id}/bulk-tweets", post(posts::bulk_create))
        .route(
            "/accounts/{id}/tweets/{tid}",
            axum::routing::delete(posts::delete_post),
        )
        .route("/accounts/{id}/tweets/{tid}/retry", post(posts::retry_post))
        .route(
            "/accounts/{id}/hourly-schedules",
            get(schedules::list_schedules).post(schedules::create_schedule),
        )
        .route(
            "/accounts/{id}/hourly-schedules/{sid}",
            put(schedules::update_schedule).delete(schedules::delete_schedule),
        )
        .route(
            "/accounts/{id}/hourly-schedules/{sid}/apply",
            post(schedules::apply_schedule),
        )
        .route("/accounts/{id}/images", get(media::list_images))
        .route(
            "/accounts/{id}/images/{name}",
            get(media::get_image).delete(media::delete_image),
        )
        .route("/accounts/{id}/upload", post(media::upload_image))
        .route(
            "/accounts/{id}/csv-texts",
            get(csv_texts::get_texts).post(csv_texts::save_texts),
        )
}

/// `{"status": "success"}` for operations with nothing else to report
pub(crate) fn success() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "success" }))
}
