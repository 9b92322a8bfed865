//! Account registration, masking and test posts

mod common;

use axum::http::StatusCode;
use common::{body_json, TestApp};
use libxcast::error::DeliveryError;
use libxcast::{MockDelivery, NewPost};
use serde_json::json;

#[tokio::test]
async fn register_returns_masked_summary() {
    let app = TestApp::new().await;
    let response = app
        .post_json(
            "/accounts",
            json!({
                "name": "  main  ",
                "api_key": "consumer-key",
                "api_secret": "consumer-secret",
                "access_token": "token",
                "access_token_secret": "token-secret",
            }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["name"], "main");
    assert_eq!(json["api_key"], "****");
    assert_eq!(json["access_token_secret"], "****");

    let body = json.to_string();
    assert!(!body.contains("consumer-secret"));
}

#[tokio::test]
async fn register_with_blank_field_is_rejected() {
    let app = TestApp::new().await;
    let response = app
        .post_json(
            "/accounts",
            json!({
                "name": "main",
                "api_key": "ck",
                "api_secret": "  ",
                "access_token": "at",
                "access_token_secret": "ats",
            }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert!(json["error"].as_str().unwrap().contains("api_secret"));
}

#[tokio::test]
async fn list_includes_activity_timestamps() {
    let app = TestApp::new().await;
    let id = app.create_account("main").await;
    app.store
        .enqueue(id, &NewPost::text("later", "2099-01-01T00:00:00Z"))
        .await
        .unwrap();

    let response = app.get("/accounts").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let accounts = json.as_array().unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0]["id"], id);
    assert!(accounts[0]["last_posted_at"].is_null());
    assert_eq!(accounts[0]["next_scheduled_at"], 4_070_908_800i64);
}

#[tokio::test]
async fn get_unknown_account_is_404() {
    let app = TestApp::new().await;
    let response = app.get("/accounts/42").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

#[tokio::test]
async fn update_keeps_masked_fields() {
    let app = TestApp::new().await;
    let id = app.create_account("main").await;

    let response = app
        .put_json(
            &format!("/accounts/{id}"),
            json!({ "name": "renamed", "api_key": "****", "api_secret": "" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "success");

    let json = body_json(app.get(&format!("/accounts/{id}")).await).await;
    assert_eq!(json["name"], "renamed");
    assert_eq!(json["api_key"], "****");
}

#[tokio::test]
async fn update_unknown_account_is_404() {
    let app = TestApp::new().await;
    let response = app.put_json("/accounts/7", json!({ "name": "x" })).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_tweet_posts_hello_world() {
    let app = TestApp::new().await;
    let id = app.create_account("main").await;

    let response = app
        .send(
            axum::http::Request::post(format!("/accounts/{id}/test-tweet"))
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let posts = app.delivery.posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].account_id, id);
    assert_eq!(posts[0].text.as_deref(), Some("Hello World!"));

    let json = body_json(response).await;
    assert_eq!(json["id"], posts[0].remote_id);
}

#[tokio::test]
async fn test_tweet_failure_is_500() {
    let app = TestApp::with_delivery(MockDelivery::post_failure(DeliveryError::Authentication(
        "bad token".to_string(),
    )))
    .await;
    let id = app.create_account("main").await;

    let response = app
        .send(
            axum::http::Request::post(format!("/accounts/{id}/test-tweet"))
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["code"], "DELIVERY_ERROR");
}
