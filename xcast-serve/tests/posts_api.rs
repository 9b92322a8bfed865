//! Queueing, bulk import, deletion and retry of posts

mod common;

use axum::http::StatusCode;
use common::{body_json, TestApp};
use libxcast::PostState;
use serde_json::json;

#[tokio::test]
async fn enqueue_and_list() {
    let app = TestApp::new().await;
    let id = app.create_account("main").await;

    let response = app
        .post_json(
            &format!("/accounts/{id}/tweets"),
            json!({ "content": "hello", "scheduled_at": "2030-05-01T09:30" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let post_id = body_json(response).await["id"].as_i64().unwrap();

    let json = body_json(app.get(&format!("/accounts/{id}/tweets")).await).await;
    assert_eq!(json["account_name"], "main");
    let tweets = json["tweets"].as_array().unwrap();
    assert_eq!(tweets.len(), 1);
    assert_eq!(tweets[0]["id"], post_id);
    assert_eq!(tweets[0]["state"], "pending");
    assert!(tweets[0]["posted_at"].is_null());
}

#[tokio::test]
async fn enqueue_without_content_or_images_is_rejected() {
    let app = TestApp::new().await;
    let id = app.create_account("main").await;

    let response = app
        .post_json(
            &format!("/accounts/{id}/tweets"),
            json!({ "content": "   ", "image_names": [], "scheduled_at": "2030-05-01T09:30" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn enqueue_with_bad_schedule_is_rejected() {
    let app = TestApp::new().await;
    let id = app.create_account("main").await;

    let response = app
        .post_json(
            &format!("/accounts/{id}/tweets"),
            json!({ "content": "hi", "scheduled_at": "not a time at all" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn enqueue_with_out_of_range_schedule_is_rejected() {
    let app = TestApp::new().await;
    let id = app.create_account("main").await;

    let response = app
        .post_json(
            &format!("/accounts/{id}/tweets"),
            json!({ "content": "hi", "scheduled_at": "1000000 years" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn enqueue_for_unknown_account_is_404() {
    let app = TestApp::new().await;
    let response = app
        .post_json(
            "/accounts/99/tweets",
            json!({ "content": "hi", "scheduled_at": "2030-05-01T09:30" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bulk_import_reports_partial_success() {
    let app = TestApp::new().await;
    let id = app.create_account("main").await;

    let tweets: Vec<_> = (0..100)
        .map(|i| {
            if i % 40 == 0 {
                json!({ "content": "", "scheduled_at": "2030-05-01T09:30" })
            } else {
                json!({ "content": format!("post {i}"), "scheduled_at": "2030-05-01T09:30" })
            }
        })
        .collect();

    let response = app
        .post_json(&format!("/accounts/{id}/bulk-tweets"), json!({ "tweets": tweets }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["createdCount"], 97);
    assert_eq!(json["total"], 100);
    let indexes: Vec<i64> = json["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["index"].as_i64().unwrap())
        .collect();
    assert_eq!(indexes, vec![0, 40, 80]);

    assert_eq!(app.store.list_for_account(id).await.unwrap().len(), 97);
}

#[tokio::test]
async fn bulk_import_over_cap_is_rejected_whole() {
    let app = TestApp::new().await;
    let id = app.create_account("main").await;

    let tweets: Vec<_> = (0..101)
        .map(|i| json!({ "content": format!("post {i}"), "scheduled_at": "2030-05-01T09:30" }))
        .collect();

    let response = app
        .post_json(&format!("/accounts/{id}/bulk-tweets"), json!({ "tweets": tweets }))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.store.list_for_account(id).await.unwrap().is_empty());
}

#[tokio::test]
async fn bulk_import_with_nothing_valid_lists_errors() {
    let app = TestApp::new().await;
    let id = app.create_account("main").await;

    let response = app
        .post_json(
            &format!("/accounts/{id}/bulk-tweets"),
            json!({ "tweets": [
                { "content": "", "scheduled_at": "2030-05-01T09:30" },
                { "content": "ok", "scheduled_at": "whenever" },
            ] }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["code"], "BATCH_REJECTED");
    assert_eq!(json["errors"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn delete_pending_then_missing() {
    let app = TestApp::new().await;
    let id = app.create_account("main").await;
    let post_id = app
        .store
        .enqueue(id, &libxcast::NewPost::text("bye", "2030-05-01T09:30"))
        .await
        .unwrap();

    let uri = format!("/accounts/{id}/tweets/{post_id}");
    assert_eq!(app.delete(&uri).await.status(), StatusCode::OK);
    assert!(app.store.get(post_id).await.unwrap().is_none());
    assert_eq!(app.delete(&uri).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_sent_post_conflicts() {
    let app = TestApp::new().await;
    let id = app.create_account("main").await;
    let post_id = app
        .store
        .enqueue(id, &libxcast::NewPost::text("done", "2020-01-01T00:00"))
        .await
        .unwrap();
    app.store.mark_sent(post_id, 1_700_000_000, Some("1")).await.unwrap();

    let response = app.delete(&format!("/accounts/{id}/tweets/{post_id}")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert!(app.store.get(post_id).await.unwrap().unwrap().is_posted());
}

#[tokio::test]
async fn delete_post_being_delivered_conflicts() {
    let app = TestApp::new().await;
    let id = app.create_account("main").await;
    let post_id = app
        .store
        .enqueue(id, &libxcast::NewPost::text("in flight", "2020-01-01T00:00"))
        .await
        .unwrap();
    let now = chrono::Utc::now().timestamp();
    assert!(app.store.claim(post_id, "worker", now, 600).await.unwrap());

    let response = app.delete(&format!("/accounts/{id}/tweets/{post_id}")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert!(app.store.get(post_id).await.unwrap().is_some());

    app.store.mark_sent(post_id, now, Some("42")).await.unwrap();
    assert!(app.store.get(post_id).await.unwrap().unwrap().is_posted());
}

#[tokio::test]
async fn delete_post_of_other_account_is_404() {
    let app = TestApp::new().await;
    let owner = app.create_account("owner").await;
    let other = app.create_account("other").await;
    let post_id = app
        .store
        .enqueue(owner, &libxcast::NewPost::text("mine", "2030-05-01T09:30"))
        .await
        .unwrap();

    let response = app.delete(&format!("/accounts/{other}/tweets/{post_id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(app.store.get(post_id).await.unwrap().is_some());
}

#[tokio::test]
async fn retry_requeues_failed_post() {
    let app = TestApp::new().await;
    let id = app.create_account("main").await;
    let post_id = app
        .store
        .enqueue(id, &libxcast::NewPost::text("flaky", "2020-01-01T00:00"))
        .await
        .unwrap();
    app.store
        .record_failure(post_id, "upstream 500", Some(1))
        .await
        .unwrap();
    assert_eq!(
        app.store.get(post_id).await.unwrap().unwrap().state,
        PostState::Failed
    );

    let uri = format!("/accounts/{id}/tweets/{post_id}/retry");
    let response = app.post_json(&uri, json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);

    let post = app.store.get(post_id).await.unwrap().unwrap();
    assert_eq!(post.state, PostState::Pending);
    assert_eq!(post.attempts, 0);

    // Pending posts cannot be requeued
    assert_eq!(app.post_json(&uri, json!({})).await.status(), StatusCode::CONFLICT);
}
