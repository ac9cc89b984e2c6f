//! Transport integration tests against a local mock server.
//!
//! Tests in this module verify:
//! - non-2xx answers surface as `HTTP_ERROR` with the server's message
//! - timeouts surface as `NETWORK_ERROR`
//! - bearer tokens are attached from the token manager
//! - configured client credentials reach the request headers
//! - NDJSON bodies are delivered record by record, raw lines included
//! - cancellation stops a stream before anything is delivered
//! - a per-call stream timeout overrides the client default

use std::sync::Arc;
use std::time::Duration;

use backend_migrator::config::MigratorConfig;
use backend_migrator::transport::{
    RequestOptions, StaticTokenSource, StreamOptions, StreamOutcome,
};
use backend_migrator::{ErrorCode, HttpClient, StreamChunk, TokenManager};
use serde_json::{json, Value};
use tokio::sync::watch;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn client_for(server: &MockServer) -> HttpClient {
    HttpClient::new(server.uri())
}

// ── request ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_http_error_carries_status_and_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/teams"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "no such team"})))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .await
        .request("/teams", RequestOptions::get())
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::HttpError);
    assert_eq!(err.status(), 404);
    assert!(err.message().contains("no such team"), "got {err}");
}

#[tokio::test]
async fn test_timeout_is_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .await
        .request(
            "/slow",
            RequestOptions::get().timeout(Duration::from_millis(50)),
        )
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::NetworkError);
    assert_eq!(err.status(), 0);
}

#[tokio::test]
async fn test_bearer_token_and_query_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(header("authorization", "Bearer abc"))
        .and(query_param("role", "admin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = Arc::new(TokenManager::new(Arc::new(StaticTokenSource::new("abc"))));
    let client = client_for(&server).await.with_token_manager(tokens);
    let users: Value = client
        .request_json("/users", RequestOptions::get().query("role", "admin"))
        .await
        .unwrap();

    assert_eq!(users, json!([{"id": 1}]));
}

#[tokio::test]
async fn test_configured_credentials_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/teams"))
        .and(header("authorization", "Bearer k-123"))
        .and(header("x-client-id", "web"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = MigratorConfig::default();
    config.rest.base_url = server.uri();
    config.auth.client_id = Some("web".into());
    config.auth.client_secret = Some("k-123".into());
    let client = HttpClient::from_migrator_config(&config, None);

    let teams: Value = client
        .request_json("/teams", RequestOptions::get())
        .await
        .unwrap();
    assert_eq!(teams, json!([]));
}

#[tokio::test]
async fn test_health_check_reports_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client_for(&server).await.health_check().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::HealthCheckFailed);
    assert_eq!(err.status(), 503);
}

// ── stream ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_ndjson_stream_delivers_every_record() {
    let server = MockServer::start().await;
    let body = "{\"content\":\"Hel\"}\n\n{\"content\":\"lo\",\"index\":1}\nraw text\n{\"done\":true}";
    Mock::given(method("POST"))
        .and(path("/ai/coaching/stream"))
        .and(header("accept", "application/x-ndjson"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "application/x-ndjson"),
        )
        .mount(&server)
        .await;

    let mut chunks: Vec<StreamChunk> = Vec::new();
    let outcome = client_for(&server)
        .await
        .stream(
            "/ai/coaching/stream",
            json!({"prompt": "hi"}),
            |c| chunks.push(c),
            StreamOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(outcome, StreamOutcome::Completed { chunks: 4 });
    assert_eq!(chunks[0].content.as_deref(), Some("Hel"));
    assert_eq!(chunks[1].extra.get("index"), Some(&json!(1)));
    assert_eq!(chunks[2].content.as_deref(), Some("raw text"));
    assert!(chunks[3].is_done());
}

#[tokio::test]
async fn test_stream_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ai/coaching/stream"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "boom"})))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .await
        .stream("/ai/coaching/stream", json!({}), |_| {}, StreamOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::HttpError);
    assert_eq!(err.status(), 500);
}

#[tokio::test]
async fn test_cancelled_stream_delivers_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ai/coaching/stream"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(b"{\"content\":\"late\"}\n".to_vec(), "application/x-ndjson")
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let (tx, rx) = watch::channel(false);
    let client = client_for(&server).await;
    let mut delivered = 0usize;
    let stream = client.stream(
        "/ai/coaching/stream",
        json!({}),
        |_| delivered += 1,
        StreamOptions::cancellable(rx),
    );
    let cancel = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = tx.send(true);
    };
    let (outcome, ()) = tokio::join!(stream, cancel);

    assert_eq!(outcome.unwrap(), StreamOutcome::Cancelled { chunks: 0 });
    assert_eq!(delivered, 0);
}

#[tokio::test]
async fn test_per_call_stream_timeout_is_stream_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ai/coaching/stream"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(b"{\"content\":\"late\"}\n".to_vec(), "application/x-ndjson")
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let client = client_for(&server)
        .await
        .with_stream_timeout(Duration::from_secs(30));
    let started = std::time::Instant::now();
    let err = client
        .stream(
            "/ai/coaching/stream",
            json!({}),
            |_| {},
            StreamOptions::default().timeout(Duration::from_millis(100)),
        )
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::StreamError);
    assert!(started.elapsed() < Duration::from_secs(2));
}
