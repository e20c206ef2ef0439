//! Music generation API handlers

use crate::api::SuccessResponse;
use crate::domain::TrackSummary;
use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::service::{CreatedTrack, GenerateMusicRequest, TrackStatusView};
use crate::state::HasTracks;
use axum::{
    extract::{Path, State},
    Json,
};

/// Submit a new generation job
pub async fn generate<S: HasTracks>(
    State(state): State<S>,
    auth: AuthUser,
    Json(request): Json<GenerateMusicRequest>,
) -> Result<Json<SuccessResponse<CreatedTrack>>, AppError> {
    let created = state
        .track_service()
        .create_track(auth.user_id.into(), request)
        .await?;

    // Callbacks are the primary signal; the poll loop covers lost ones.
    state.track_poller().watch(&created.task_id);

    Ok(Json(SuccessResponse::new(created)))
}

/// Fetch the merged status of one generation job
pub async fn status<S: HasTracks>(
    State(state): State<S>,
    auth: AuthUser,
    Path(task_id): Path<String>,
) -> Result<Json<SuccessResponse<TrackStatusView>>, AppError> {
    let view = state
        .track_service()
        .get_status(auth.user_id.into(), &task_id)
        .await?;

    Ok(Json(SuccessResponse::new(view)))
}

/// List the caller's tracks, newest first
pub async fn list<S: HasTracks>(
    State(state): State<S>,
    auth: AuthUser,
) -> Result<Json<SuccessResponse<Vec<TrackSummary>>>, AppError> {
    let tracks = state
        .track_service()
        .list_tracks(auth.user_id.into())
        .await?;

    Ok(Json(SuccessResponse::new(tracks)))
}
