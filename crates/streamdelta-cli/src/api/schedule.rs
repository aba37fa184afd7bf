use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use streamdelta_core::TriggerState;

use crate::middleware::RequestId;

use super::{map_schedule_error, parse_tenant, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct ScheduleRequest {
    time: String,
}

#[derive(Debug, Serialize)]
pub(super) struct ScheduleItem {
    time: String,
    enabled: bool,
    scheduled: bool,
}

fn item(state: &AppState, tenant: &streamdelta_core::TenantId, trigger: TriggerState) -> ScheduleItem {
    ScheduleItem {
        time: trigger.time.to_string(),
        enabled: trigger.enabled,
        scheduled: state.scheduler.is_scheduled(tenant),
    }
}

pub(super) async fn get_schedule(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(raw): Path<String>,
) -> Result<Json<ApiResponse<ScheduleItem>>, ApiError> {
    let tenant = parse_tenant(&req_id.0, &raw)?;
    let trigger = state
        .scheduler
        .show(&tenant)
        .await
        .map_err(|e| map_schedule_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(req_id.0, item(&state, &tenant, trigger))))
}

pub(super) async fn put_schedule(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(raw): Path<String>,
    Json(body): Json<ScheduleRequest>,
) -> Result<Json<ApiResponse<ScheduleItem>>, ApiError> {
    let tenant = parse_tenant(&req_id.0, &raw)?;
    let trigger = state
        .scheduler
        .set_schedule(&tenant, &body.time)
        .await
        .map_err(|e| map_schedule_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(req_id.0, item(&state, &tenant, trigger))))
}

pub(super) async fn delete_schedule(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(raw): Path<String>,
) -> Result<Json<ApiResponse<ScheduleItem>>, ApiError> {
    let tenant = parse_tenant(&req_id.0, &raw)?;
    let trigger = state
        .scheduler
        .disable(&tenant)
        .await
        .map_err(|e| map_schedule_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(req_id.0, item(&state, &tenant, trigger))))
}
