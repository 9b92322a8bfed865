#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use chrono::FixedOffset;
use http_body_util::BodyExt;
use libxcast::config::ServerConfig;
use libxcast::{CredentialVault, Database, MediaLibrary, MockDelivery, PostStore};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use xcast_serve::{build_app_router, AppState};

/// A router over a fresh database plus the handles tests poke at directly
pub struct TestApp {
    pub router: Router,
    pub store: PostStore,
    pub media: MediaLibrary,
    pub delivery: MockDelivery,
    _temp_dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_delivery(MockDelivery::success()).await
    }

    pub async fn with_delivery(delivery: MockDelivery) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(temp_dir.path().join("xcast.db").to_str().unwrap())
            .await
            .unwrap();
        let store = PostStore::new(db, FixedOffset::east_opt(0).unwrap());
        let media = MediaLibrary::new(temp_dir.path().join("uploads"));
        let vault = Arc::new(CredentialVault::new(&CredentialVault::generate_key()).unwrap());

        let config = ServerConfig {
            cors_origins: vec!["http://localhost:5173".to_string()],
            max_upload_bytes: 1024 * 1024,
            request_timeout_secs: 30,
            ..Default::default()
        };
        let state = AppState::new(
            store.clone(),
            media.clone(),
            vault,
            Arc::new(delivery.clone()),
            config,
        );

        Self {
            router: build_app_router(state).unwrap(),
            store,
            media,
            delivery,
            _temp_dir: temp_dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn delete(&self, uri: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .method(Method::DELETE)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> Response<Body> {
        self.json_request(Method::POST, uri, body).await
    }

    pub async fn put_json(&self, uri: &str, body: Value) -> Response<Body> {
        self.json_request(Method::PUT, uri, body).await
    }

    async fn json_request(&self, method: Method, uri: &str, body: Value) -> Response<Body> {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Upload one file as the multipart field `file`
    pub async fn upload(&self, uri: &str, file_name: &str, bytes: &[u8]) -> Response<Body> {
        let boundary = "xcast-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        self.send(
            Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    /// Register an account and return its id
    pub async fn create_account(&self, name: &str) -> i64 {
        let response = self
            .post_json(
                "/accounts",
                serde_json::json!({
                    "name": name,
                    "api_key": "ck",
                    "api_secret": "cs",
                    "access_token": "at",
                    "access_token_secret": "ats",
                }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await["id"].as_i64().unwrap()
    }
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}
