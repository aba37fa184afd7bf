//! Admin HTTP API served by `streamdelta serve`.
//!
//! Every tenant route hydrates that tenant's persisted trigger first, so the
//! API is what brings lazily restored schedules back to life.

mod playlists;
mod schedule;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use streamdelta_core::TenantId;
use streamdelta_store::{BlobStore, StoreError};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::check::CheckRunner;
use crate::middleware::{request_id, require_bearer_auth, AuthState, RequestId};
use crate::scheduler::{ScheduleError, TenantScheduler};

#[derive(Clone)]
pub(crate) struct AppState {
    pub scheduler: Arc<TenantScheduler>,
    pub store: Arc<dyn BlobStore>,
    pub checks: Arc<CheckRunner>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    scheduled_tenants: usize,
}

#[derive(Debug, Serialize)]
struct CheckAccepted {
    tenant: TenantId,
    status: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn new(request_id: String, data: T) -> Self {
        Self {
            data,
            meta: ResponseMeta::new(request_id),
        }
    }
}

impl ApiError {
    pub(crate) fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn parse_tenant(request_id: &str, raw: &str) -> Result<TenantId, ApiError> {
    TenantId::parse(raw).map_err(|e| ApiError::new(request_id, "validation_error", e.to_string()))
}

pub(super) fn map_store_error(request_id: String, error: &StoreError) -> ApiError {
    if error.is_conflict() {
        return ApiError::new(request_id, "conflict", "record changed concurrently, retry");
    }
    tracing::error!(error = %error, "api: store operation failed");
    ApiError::new(request_id, "internal_error", "store operation failed")
}

pub(super) fn map_schedule_error(request_id: String, error: &ScheduleError) -> ApiError {
    match error {
        ScheduleError::Validation(e) => ApiError::new(request_id, "validation_error", e.to_string()),
        ScheduleError::Store(e) => map_store_error(request_id, e),
        ScheduleError::Scheduler(e) => {
            tracing::error!(error = %e, "api: scheduler operation failed");
            ApiError::new(request_id, "internal_error", "scheduler operation failed")
        }
    }
}

/// Hydrates the tenant's trigger. Failures are logged and retried on the
/// next request rather than failing this one.
pub(super) async fn touch_tenant(state: &AppState, tenant: &TenantId) {
    if let Err(e) = state.scheduler.hydrate_tenant(tenant).await {
        tracing::warn!(tenant = %tenant, error = %e, "api: tenant hydration failed");
    }
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router(auth: AuthState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/tenants/{tenant}/schedule",
            get(schedule::get_schedule)
                .put(schedule::put_schedule)
                .delete(schedule::delete_schedule),
        )
        .route("/api/v1/tenants/{tenant}/check", post(trigger_check))
        .route(
            "/api/v1/tenants/{tenant}/playlists",
            get(playlists::list_playlists).post(playlists::add_playlist),
        )
        .route(
            "/api/v1/tenants/{tenant}/playlists/{playlist}",
            delete(playlists::remove_playlist),
        )
        .layer(axum::middleware::from_fn_with_state(
            auth,
            require_bearer_auth,
        ))
}

pub(crate) fn build_app(state: AppState, auth: AuthState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    Json(ApiResponse::new(
        req_id.0,
        HealthData {
            status: "ok",
            scheduled_tenants: state.scheduler.scheduled_count(),
        },
    ))
}

/// Starts a check in the background and answers immediately.
async fn trigger_check(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    axum::extract::Path(raw): axum::extract::Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant = parse_tenant(&req_id.0, &raw)?;
    touch_tenant(&state, &tenant).await;

    let checks = Arc::clone(&state.checks);
    let background = tenant.clone();
    tokio::spawn(async move {
        if let Err(e) = checks.run(&background).await {
            let error = format!("{e:#}");
            tracing::error!(tenant = %background, error = %error, "api: check failed");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::new(
            req_id.0,
            CheckAccepted {
                tenant,
                status: "accepted",
            },
        )),
    ))
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
