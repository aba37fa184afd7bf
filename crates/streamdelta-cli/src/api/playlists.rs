use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use streamdelta_core::CollectionUnit;
use streamdelta_store::{
    add_source, load_sources, remove_source, AddOutcome, RemoveOutcome, SourceError,
};

use crate::middleware::RequestId;

use super::{map_store_error, parse_tenant, touch_tenant, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct AddPlaylistRequest {
    url: String,
}

#[derive(Debug, Serialize)]
pub(super) struct PlaylistItem {
    id: String,
    url: String,
}

#[derive(Debug, Serialize)]
pub(super) struct PlaylistChange {
    playlist: PlaylistItem,
    total: usize,
}

impl From<CollectionUnit> for PlaylistItem {
    fn from(unit: CollectionUnit) -> Self {
        Self {
            id: unit.id,
            url: unit.url,
        }
    }
}

fn map_source_error(request_id: String, error: &SourceError) -> ApiError {
    match error {
        SourceError::Validation(e) => ApiError::new(request_id, "validation_error", e.to_string()),
        SourceError::Store(e) => map_store_error(request_id, e),
    }
}

pub(super) async fn list_playlists(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(raw): Path<String>,
) -> Result<Json<ApiResponse<Vec<PlaylistItem>>>, ApiError> {
    let tenant = parse_tenant(&req_id.0, &raw)?;
    touch_tenant(&state, &tenant).await;

    let sources = load_sources(state.store.as_ref(), &tenant)
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), &e))?;

    let data = sources.units.into_iter().map(PlaylistItem::from).collect();
    Ok(Json(ApiResponse::new(req_id.0, data)))
}

pub(super) async fn add_playlist(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(raw): Path<String>,
    Json(body): Json<AddPlaylistRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PlaylistChange>>), ApiError> {
    let tenant = parse_tenant(&req_id.0, &raw)?;
    touch_tenant(&state, &tenant).await;

    let outcome = add_source(state.store.as_ref(), &tenant, &body.url)
        .await
        .map_err(|e| map_source_error(req_id.0.clone(), &e))?;

    match outcome {
        AddOutcome::Added { unit, total } => Ok((
            StatusCode::CREATED,
            Json(ApiResponse::new(
                req_id.0,
                PlaylistChange {
                    playlist: unit.into(),
                    total,
                },
            )),
        )),
        AddOutcome::AlreadyPresent { unit } => Err(ApiError::new(
            req_id.0,
            "conflict",
            format!("playlist {} is already tracked", unit.id),
        )),
    }
}

pub(super) async fn remove_playlist(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((raw, playlist)): Path<(String, String)>,
) -> Result<Json<ApiResponse<PlaylistChange>>, ApiError> {
    let tenant = parse_tenant(&req_id.0, &raw)?;
    touch_tenant(&state, &tenant).await;

    let outcome = remove_source(state.store.as_ref(), &tenant, &playlist)
        .await
        .map_err(|e| map_source_error(req_id.0.clone(), &e))?;

    match outcome {
        RemoveOutcome::Removed { unit, remaining } => Ok(Json(ApiResponse::new(
            req_id.0,
            PlaylistChange {
                playlist: unit.into(),
                total: remaining,
            },
        ))),
        RemoveOutcome::NotFound => Err(ApiError::new(
            req_id.0,
            "not_found",
            format!("playlist {playlist} is not tracked"),
        )),
    }
}
