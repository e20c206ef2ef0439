//! Inbound callback endpoint for the generation service

use crate::error::AppError;
use crate::state::HasTracks;
use crate::suno::CallbackEnvelope;
use axum::{extract::State, Json};
use serde_json::{json, Value};

/// Receive a push delivery from the generation service.
///
/// The remote side re-sends any delivery that does not get a 2xx answer,
/// so processing failures are logged and acknowledged rather than
/// surfaced. Only a payload with no task id to key on gets a 400.
pub async fn receive<S: HasTracks>(
    State(state): State<S>,
    Json(envelope): Json<CallbackEnvelope>,
) -> Result<Json<Value>, AppError> {
    match state.track_service().ingest_callback(envelope).await {
        Ok(outcome) => {
            tracing::debug!("Callback processed: {:?}", outcome);
            Ok(Json(json!({ "status": "received" })))
        }
        Err(AppError::BadRequest(msg)) => Err(AppError::BadRequest(msg)),
        Err(err) => {
            tracing::error!("Failed to process generation callback: {}", err);
            Ok(Json(json!({ "status": "received", "error": "Processing error" })))
        }
    }
}
