//! Integration tests for read-only resources: sessions, processes,
//! credentials and assets.

mod common;

use ats_client::Error;
use common::{FakeServer, TOKEN};
use secrecy::ExposeSecret;
use serde_json::json;

#[tokio::test]
async fn session_and_process_fetches_are_stable() {
    let server = FakeServer::start().await;
    server.add_session(1, 100);
    server.add_process(100, Some(5));
    let client = server.client();

    let first = client.get_session(1).await.unwrap();
    let second = client.get_session(1).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.process_id, 100);
    assert_eq!(first.status, "in progress");
    // Sent without an offset; read as UTC.
    assert_eq!(
        first.dispatched_at.to_rfc3339(),
        "2024-05-01T07:59:30.500+00:00"
    );

    let process = client.get_process(first.process_id).await.unwrap();
    assert_eq!(process, client.get_process(100).await.unwrap());
    assert_eq!(process.workqueue_id.map(|id| id.0), Some(5));
    assert_eq!(process.target_credentials_id, None);
}

#[tokio::test]
async fn credential_names_are_url_encoded() {
    let server = FakeServer::start().await;
    server.add_credential("erp login/prod", "robot", "s3cret");
    let client = server.client();

    let first = client.get_credential("erp login/prod").await.unwrap();
    let second = client.get_credential("erp login/prod").await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.username, "robot");
    assert_eq!(first.password.expose_secret(), second.password.expose_secret());
    assert_eq!(first.password.expose_secret(), "s3cret");
    assert_eq!(first.data, json!({"domain": "corp"}));
    assert!(
        server
            .requests()
            .contains(&"GET /credentials/by_name/erp%20login%2Fprod".to_string())
    );
}

#[tokio::test]
async fn asset_fetches_are_stable() {
    let server = FakeServer::start().await;
    server.add_asset("mail settings", json!({"smtp": "mail.example.invalid", "port": 587}));
    let client = server.client();

    let first = client.get_asset("mail settings").await.unwrap();
    let second = client.get_asset("mail settings").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.data["port"], 587);
}

#[tokio::test]
async fn missing_resource_is_remote_failure() {
    let server = FakeServer::start().await;
    let err = server.client().get_asset("nope").await.unwrap_err();

    match err {
        Error::RemoteRequest {
            method,
            url,
            status,
            body,
        } => {
            assert_eq!(method, "GET");
            assert!(url.ends_with("/assets/by_name/nope"));
            assert_eq!(status, 404);
            assert_eq!(body, "not found");
        }
        other => panic!("expected RemoteRequest, got {other:?}"),
    }
}

#[tokio::test]
async fn every_request_carries_bearer_token() {
    let server = FakeServer::start().await;
    server.add_session(1, 100);
    server.add_process(100, None);
    let client = server.client();

    client.get_session(1).await.unwrap();
    client.get_process(100).await.unwrap();
    let _ = client.get_asset("missing").await;

    let headers = server.auth_headers();
    assert_eq!(headers.len(), 3);
    for header in headers {
        assert_eq!(header.as_deref(), Some(format!("Bearer {TOKEN}").as_str()));
    }
}

#[tokio::test]
async fn unreachable_server_is_http_error() {
    // Bind and drop to get a port nothing listens on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = ats_client::Config::new(format!("http://{addr}"))
        .with_request_timeout(std::time::Duration::from_secs(2));
    let client = ats_client::Client::new(&config).unwrap();

    let err = client.get_session(1).await.unwrap_err();
    assert!(matches!(err, Error::Http(_)), "got {err:?}");
    assert_eq!(err.status(), None);
}
