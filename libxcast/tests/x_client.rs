//! X client tests against a local mock server

use std::sync::Arc;
use std::time::Duration;

use libxcast::config::DeliveryConfig;
use libxcast::error::DeliveryError;
use libxcast::{Account, CredentialVault, DeliveryClient, MediaHandle, NewAccount, XClient, XcastError};
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn setup(server: &MockServer, timeout_secs: u64) -> (XClient, Account) {
    let vault = Arc::new(CredentialVault::new(&CredentialVault::generate_key()).unwrap());
    let registration = NewAccount {
        name: "main".to_string(),
        api_key: "consumer-key".to_string(),
        api_secret: "consumer-secret".to_string(),
        access_token: "access-token".to_string(),
        access_token_secret: "access-secret".to_string(),
    };
    let sealed = vault.seal(&registration).unwrap();
    let account = Account {
        id: 1,
        name: registration.name,
        api_key: sealed.api_key,
        api_secret: sealed.api_secret,
        access_token: sealed.access_token,
        access_token_secret: sealed.access_token_secret,
        created_at: 0,
    };

    let config = DeliveryConfig {
        api_base: server.uri(),
        upload_base: server.uri(),
        timeout_secs,
    };
    (XClient::new(vault, &config).unwrap(), account)
}

#[tokio::test]
async fn test_create_post_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/2/tweets"))
        .and(header_regex("authorization", r#"^OAuth .*oauth_consumer_key="consumer-key""#))
        .and(header_regex("authorization", r#"oauth_token="access-token""#))
        .and(body_partial_json(serde_json::json!({ "text": "Hello World!" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "data": { "id": "1850000000000000001", "text": "Hello World!" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, account) = setup(&server, 5);
    let receipt = client
        .create_post(&account, Some("Hello World!"), &[])
        .await
        .unwrap();

    assert_eq!(receipt.id, "1850000000000000001");
    assert_eq!(receipt.text.as_deref(), Some("Hello World!"));
}

#[tokio::test]
async fn test_create_post_with_media_only() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/2/tweets"))
        .and(body_partial_json(serde_json::json!({
            "media": { "media_ids": ["111", "222"] }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "data": { "id": "42" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, account) = setup(&server, 5);
    let media = vec![
        MediaHandle {
            media_id: "111".to_string(),
        },
        MediaHandle {
            media_id: "222".to_string(),
        },
    ];
    let receipt = client.create_post(&account, None, &media).await.unwrap();
    assert_eq!(receipt.id, "42");
    assert!(receipt.text.is_none());
}

#[tokio::test]
async fn test_create_post_empty_is_rejected_locally() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let (client, account) = setup(&server, 5);
    let err = client.create_post(&account, Some(" "), &[]).await.unwrap_err();
    assert!(matches!(err, XcastError::InvalidInput(_)));
}

#[tokio::test]
async fn test_status_mapping() {
    let cases = [
        (401, "auth"),
        (403, "auth"),
        (429, "rate"),
        (500, "posting"),
    ];

    for (status, expected) in cases {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2/tweets"))
            .respond_with(ResponseTemplate::new(status).set_body_string("upstream says no"))
            .mount(&server)
            .await;

        let (client, account) = setup(&server, 5);
        let err = client
            .create_post(&account, Some("hi"), &[])
            .await
            .unwrap_err();

        let matched = match (&err, expected) {
            (XcastError::Delivery(DeliveryError::Authentication(_)), "auth") => true,
            (XcastError::Delivery(DeliveryError::RateLimit(_)), "rate") => true,
            (XcastError::Delivery(DeliveryError::Posting(msg)), "posting") => {
                msg.contains("upstream says no")
            }
            _ => false,
        };
        assert!(matched, "status {} produced {:?}", status, err);
    }
}

#[tokio::test]
async fn test_timeout_is_transient_network_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/2/tweets"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(serde_json::json!({ "data": { "id": "1" } }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let (client, account) = setup(&server, 1);
    let err = client
        .create_post(&account, Some("slow"), &[])
        .await
        .unwrap_err();

    match err {
        XcastError::Delivery(e) => {
            assert!(matches!(e, DeliveryError::Network(_)));
            assert!(e.is_transient());
        }
        other => panic!("expected delivery error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_upload_media_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/1.1/media/upload.json"))
        .and(header_regex("authorization", "^OAuth "))
        .and(header_regex("content-type", "^multipart/form-data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "media_id": 710511363345354753u64,
            "media_id_string": "710511363345354753"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let image = temp_dir.path().join("cat.png");
    std::fs::write(&image, b"\x89PNG\r\n").unwrap();

    let (client, account) = setup(&server, 5);
    let handle = client.upload_media(&account, &image).await.unwrap();
    assert_eq!(handle.media_id, "710511363345354753");
}

#[tokio::test]
async fn test_upload_media_missing_file() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (client, account) = setup(&server, 5);
    let err = client
        .upload_media(&account, std::path::Path::new("/definitely/not/here.png"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        XcastError::Delivery(DeliveryError::Upload(_))
    ));
}

#[tokio::test]
async fn test_upload_media_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/1.1/media/upload.json"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad media"))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let image = temp_dir.path().join("broken.gif");
    std::fs::write(&image, b"GIF89a").unwrap();

    let (client, account) = setup(&server, 5);
    let err = client.upload_media(&account, &image).await.unwrap_err();
    assert!(matches!(
        err,
        XcastError::Delivery(DeliveryError::Upload(_))
    ));
}
