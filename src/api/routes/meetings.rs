//! Meeting inspection and administration endpoints.
//!
//! Provides HTTP endpoints for:
//! - Listing meetings stuck in a transient status (GET /meetings/stuck)
//! - Fetching a meeting transcript (GET /meetings/:bot_id/transcript)
//! - Force-completing a meeting (POST /meetings/:bot_id/complete)

use crate::api::error::{ApiError, ApiResult};
use crate::db::MeetingStore;
use crate::meeting::lifecycle::REASON_MANUAL;
use crate::meeting::{CompletionOutcome, LifecycleManager};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::info;

/// Shared state for meeting routes.
#[derive(Clone)]
pub struct MeetingState {
    pub store: MeetingStore,
    pub lifecycle: LifecycleManager,
    /// Age past which a transient meeting counts as stuck.
    pub stuck_age: Duration,
}

pub fn router(state: MeetingState) -> Router {
    Router::new()
        .route("/meetings/stuck", get(stuck_meetings))
        .route("/meetings/:bot_id/transcript", get(get_transcript))
        .route("/meetings/:bot_id/complete", post(complete_meeting))
        .with_state(state)
}

async fn stuck_meetings(State(state): State<MeetingState>) -> ApiResult<Json<Value>> {
    let meetings = state
        .store
        .stuck_meetings(state.stuck_age)
        .await
        .map_err(ApiError::from)?;

    let entries: Vec<Value> = meetings
        .iter()
        .map(|m| {
            json!({
                "meeting_id": m.id,
                "bot_id": m.bot_id,
                "meeting_name": m.name,
                "meeting_url": m.meeting_url,
                "status": m.status,
                "created_at": m.created_at,
                "updated_at": m.updated_at,
            })
        })
        .collect();

    Ok(Json(json!({ "meetings": entries })))
}

async fn get_transcript(
    Path(bot_id): Path<String>,
    State(state): State<MeetingState>,
) -> ApiResult<Json<Value>> {
    // No status filter: transcripts stay readable after the meeting ends.
    let meeting = state
        .store
        .get_by_bot_id(&bot_id, &[])
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found(format!("No meeting for bot {}", bot_id)))?;

    let entries = state
        .store
        .transcript(&meeting.id)
        .await
        .map_err(ApiError::from)?
        .unwrap_or_default();

    Ok(Json(json!({
        "meeting_id": meeting.id,
        "bot_id": meeting.bot_id,
        "status": meeting.status,
        "entries": entries,
    })))
}

async fn complete_meeting(
    Path(bot_id): Path<String>,
    State(state): State<MeetingState>,
) -> ApiResult<Json<Value>> {
    info!("Force-complete requested for bot {}", bot_id);

    match state
        .lifecycle
        .complete(&bot_id, REASON_MANUAL)
        .await
        .map_err(ApiError::from)?
    {
        CompletionOutcome::Completed(meeting) => Ok(Json(json!({
            "success": true,
            "message": "Meeting marked as completed",
            "meeting_id": meeting.id,
            "bot_id": meeting.bot_id,
        }))),
        CompletionOutcome::AlreadyResolved => Err(ApiError::not_found(format!(
            "No live meeting for bot {}",
            bot_id
        ))),
    }
}
