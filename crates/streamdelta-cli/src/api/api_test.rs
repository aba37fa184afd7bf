use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::Request;
use futures::FutureExt;
use streamdelta_core::{DailyTime, TriggerState};
use streamdelta_report::{MemoryChannel, MessageChannel};
use streamdelta_store::{save_trigger, MemoryStore, PollConfig};
use tower::ServiceExt;

use super::*;
use crate::report::Delivery;
use crate::scheduler::CheckCallback;
use crate::test_support::{date, tenant, FakeTrigger};

struct Harness {
    app: Router,
    store: Arc<MemoryStore>,
}

async fn harness(keys: &[&str]) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let channel: Arc<dyn MessageChannel> = Arc::new(MemoryChannel::new());
    let noop: CheckCallback = Arc::new(|_tenant: TenantId| async {}.boxed());
    let scheduler = TenantScheduler::start(Arc::clone(&store) as Arc<dyn BlobStore>, noop)
        .await
        .expect("scheduler should start");
    let checks = CheckRunner {
        store: Arc::clone(&store) as Arc<dyn BlobStore>,
        channel,
        trigger: Arc::new(FakeTrigger::writing(Arc::clone(&store), date(2), 10)),
        poll: PollConfig {
            max_wait: Duration::from_millis(20),
            interval: Duration::from_millis(5),
        },
        delivery: Delivery {
            chunk_chars: 4000,
            chunk_delay: Duration::ZERO,
        },
    };
    let keys: Vec<String> = keys.iter().map(|k| (*k).to_owned()).collect();
    let auth = AuthState::from_keys(&keys, true).expect("auth");
    let state = AppState {
        scheduler: Arc::new(scheduler),
        store: Arc::clone(&store) as Arc<dyn BlobStore>,
        checks: Arc::new(checks),
    };
    Harness {
        app: build_app(state, auth),
        store,
    }
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<serde_json::Value>) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).expect("request"))
        .await
        .expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json parse")
    };
    (status, json)
}

#[test]
fn api_error_validation_error_maps_to_bad_request() {
    let response = ApiError::new("req-1", "validation_error", "invalid input").into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread")]
async fn health_echoes_request_id() {
    let h = harness(&[]).await;
    let response = h
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/health")
                .header("x-request-id", "req-42")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "req-42");
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["data"]["status"], "ok");
    assert_eq!(json["meta"]["request_id"], "req-42");
}

#[tokio::test(flavor = "multi_thread")]
async fn protected_routes_require_bearer_token_when_keys_set() {
    let h = harness(&["secret"]).await;

    let (status, json) = send(&h.app, "GET", "/api/v1/tenants/1/schedule", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["code"], "unauthorized");

    let response = h
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/tenants/1/schedule")
                .header(header::AUTHORIZATION, "Bearer secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (status, _) = send(&h.app, "GET", "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread")]
async fn put_schedule_validates_then_registers() {
    let h = harness(&[]).await;

    let (status, json) = send(
        &h.app,
        "PUT",
        "/api/v1/tenants/77/schedule",
        Some(serde_json::json!({ "time": "25:00" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");
    assert_eq!(h.store.write_count(), 0);

    let (status, json) = send(
        &h.app,
        "PUT",
        "/api/v1/tenants/77/schedule",
        Some(serde_json::json!({ "time": "09:00" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["time"], "09:00");
    assert_eq!(json["data"]["enabled"], true);
    assert_eq!(json["data"]["scheduled"], true);

    let (status, json) = send(&h.app, "DELETE", "/api/v1/tenants/77/schedule", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["time"], "09:00");
    assert_eq!(json["data"]["enabled"], false);
    assert_eq!(json["data"]["scheduled"], false);
}

#[tokio::test(flavor = "multi_thread")]
async fn first_contact_hydrates_persisted_trigger() {
    let h = harness(&[]).await;
    let id = tenant("88");
    let persisted = TriggerState {
        time: DailyTime::parse("21:10").unwrap(),
        enabled: true,
    };
    save_trigger(h.store.as_ref(), &id, persisted).await.unwrap();

    let (status, json) = send(&h.app, "GET", "/api/v1/tenants/88/schedule", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["time"], "21:10");
    assert_eq!(json["data"]["scheduled"], true);
    let (_, health) = send(&h.app, "GET", "/api/v1/health", None).await;
    assert_eq!(health["data"]["scheduled_tenants"], 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_tenant_is_rejected() {
    let h = harness(&[]).await;
    let (status, json) = send(&h.app, "GET", "/api/v1/tenants/a%20b/playlists", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");
}

#[tokio::test(flavor = "multi_thread")]
async fn playlists_add_list_remove() {
    let h = harness(&[]).await;
    let uri = "/api/v1/tenants/55/playlists";

    let (status, json) = send(
        &h.app,
        "POST",
        uri,
        Some(serde_json::json!({ "url": "https://open.spotify.com/playlist/Abc123?si=x" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["playlist"]["id"], "Abc123");
    assert_eq!(json["data"]["playlist"]["url"], "https://app.artist.tools/playlist/Abc123");
    assert_eq!(json["data"]["total"], 1);

    let (status, json) = send(
        &h.app,
        "POST",
        uri,
        Some(serde_json::json!({ "url": "https://artist.tools/playlist/Abc123" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "conflict");

    let (status, _) = send(
        &h.app,
        "POST",
        uri,
        Some(serde_json::json!({ "url": "https://example.com/not-a-playlist" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(&h.app, "GET", uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().map(Vec::len), Some(1));

    let (status, json) = send(&h.app, "DELETE", "/api/v1/tenants/55/playlists/Abc123", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["total"], 0);

    let (status, json) = send(&h.app, "DELETE", "/api/v1/tenants/55/playlists/Abc123", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "not_found");
}

#[tokio::test(flavor = "multi_thread")]
async fn check_is_accepted_and_runs_in_background() {
    let h = harness(&[]).await;
    let (status, json) = send(&h.app, "POST", "/api/v1/tenants/66/check", None).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["data"]["tenant"], "66");
    assert_eq!(json["data"]["status"], "accepted");
}
