//! End-to-end tests over real HTTP.
//!
//! A fake admin API is served with axum on an ephemeral port; the
//! [`AdminSource`] reads from it, and the media index server is exercised
//! through its REST endpoints.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use media_index::cache::SiteKey;
use media_index::config::SourceConfig;
use media_index::connector_admin::AdminSource;
use media_index::server::router;
use media_index::service::MediaService;
use media_index::traits::{FetchError, MediaSource, ToolContext, ToolRegistry};
use serde_json::{json, Value};

const TOKEN: &str = "test-token";

fn media_sheet() -> Value {
    json!({
        ":type": "sheet",
        "total": 4,
        "data": [
            { "url": "/media/hero.png?width=750", "doc": "/index", "alt": "Hero", "type": "img > png", "hash": "h1" },
            { "url": "/media/HERO.png", "doc": "/about", "alt": "", "type": "img > png", "hash": "h1" },
            { "url": "/media/clip.mp4", "doc": "", "type": "video > mp4" },
            { "url": "", "doc": "/index", "alt": "orphan" }
        ]
    })
}

async fn media_handler(headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
    let expected = format!("Bearer {}", TOKEN);
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some(auth) if auth == expected => Ok(Json(media_sheet())),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

async fn flaky_handler(State(hits): State<Arc<AtomicUsize>>) -> Result<Json<Value>, StatusCode> {
    if hits.fetch_add(1, Ordering::SeqCst) == 0 {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    } else {
        Ok(Json(json!([{ "url": "/media/a.png", "doc": "/" }])))
    }
}

/// Serve `app` on an ephemeral port and return its base url.
async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn spawn_fake_admin() -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route(
            "/source/acme/web/.da/mediaindex/media.json",
            get(media_handler),
        )
        .route(
            "/source/acme/flaky/.da/mediaindex/media.json",
            get(flaky_handler),
        )
        .route(
            "/source/acme/broken/.da/mediaindex/media.json",
            get(|| async { "not json" }),
        )
        .with_state(hits.clone());
    (spawn(app).await, hits)
}

fn source_config(admin_url: &str, max_retries: u32) -> SourceConfig {
    SourceConfig {
        admin_url: admin_url.to_string(),
        init_url: "https://da.example/#/{org}/{repo}{path}".to_string(),
        max_retries,
        timeout_secs: 5,
        ..Default::default()
    }
}

fn admin_source(admin_url: &str, max_retries: u32) -> AdminSource {
    AdminSource::with_token(
        source_config(admin_url, max_retries),
        Some(TOKEN.to_string()),
    )
    .unwrap()
}

#[tokio::test]
async fn test_fetch_sheet_with_token() {
    let (admin_url, _) = spawn_fake_admin().await;
    let source = admin_source(&admin_url, 0);

    let rows = source
        .fetch(&SiteKey::new("acme", "web", None))
        .await
        .unwrap();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0].hash.as_deref(), Some("h1"));
}

#[tokio::test]
async fn test_fetch_without_token_is_transport_error() {
    let (admin_url, _) = spawn_fake_admin().await;
    let source = AdminSource::with_token(source_config(&admin_url, 0), None).unwrap();

    let err = source
        .fetch(&SiteKey::new("acme", "web", None))
        .await
        .unwrap_err();
    match err {
        FetchError::Transport(msg) => assert!(msg.contains("401"), "{}", msg),
        other => panic!("expected transport error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_document_is_not_found() {
    let (admin_url, _) = spawn_fake_admin().await;
    let source = admin_source(&admin_url, 3);
    let site = SiteKey::new("acme", "web", Some("/nope"));

    let err = source.fetch(&site).await.unwrap_err();
    assert!(matches!(err, FetchError::NotFound { .. }), "{:?}", err);

    let err = source.probe(&site).await.unwrap_err();
    assert!(matches!(err, FetchError::NotFound { .. }), "{:?}", err);
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let (admin_url, hits) = spawn_fake_admin().await;
    let source = admin_source(&admin_url, 1);

    let rows = source
        .fetch(&SiteKey::new("acme", "flaky", None))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_invalid_json_is_transport_error() {
    let (admin_url, _) = spawn_fake_admin().await;
    let source = admin_source(&admin_url, 0);

    let err = source
        .fetch(&SiteKey::new("acme", "broken", None))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Transport(_)), "{:?}", err);
}

async fn spawn_media_server() -> String {
    let (admin_url, _) = spawn_fake_admin().await;
    let service = MediaService::new(Arc::new(admin_source(&admin_url, 0)));
    let ctx = ToolContext::new(Arc::new(service));
    spawn(router(ctx, Arc::new(ToolRegistry::with_builtins()))).await
}

#[tokio::test]
async fn test_rest_tool_calls() {
    let base = spawn_media_server().await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{}/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["cached_sites"], 0);

    let list: Value = client
        .get(format!("{}/tools/list", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list["tools"].as_array().unwrap().len(), 6);

    let resp = client
        .post(format!("{}/tools/get_stats", base))
        .json(&json!({ "org": "acme", "repo": "web" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let stats = &body["result"];
    assert_eq!(stats["uniqueItems"], 2);
    assert_eq!(stats["totalReferences"], 3);
    assert_eq!(stats["unused"], 1);
    assert_eq!(
        stats["altText"],
        json!({ "filled": 1, "decorative": 2, "notFilled": 0 })
    );

    let body: Value = client
        .post(format!("{}/tools/find_usage", base))
        .json(&json!({ "org": "acme", "repo": "web", "mediaName": "hero" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["result"]["usageCount"], 2);
    assert_eq!(body["result"]["documents"], json!(["/index", "/about"]));
}

#[tokio::test]
async fn test_rest_error_payloads_and_codes() {
    let base = spawn_media_server().await;
    let client = reqwest::Client::new();

    // missing media index: a structured payload, not an HTTP failure
    let resp = client
        .post(format!("{}/tools/check_status", base))
        .json(&json!({ "org": "acme", "repo": "web", "path": "/drafts" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["result"]["initialized"], false);
    assert_eq!(
        body["result"]["initUrl"],
        "https://da.example/#/acme/web/drafts"
    );
    assert!(body["result"]["debug"]["url"]
        .as_str()
        .unwrap()
        .ends_with("/source/acme/web/drafts/.da/mediaindex/media.json"));

    let resp = client
        .post(format!("{}/tools/get_index", base))
        .json(&json!({ "org": "acme" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");

    let resp = client
        .post(format!("{}/tools/delete_everything", base))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}
