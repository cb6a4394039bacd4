//! Bot provisioning and lifecycle endpoints.
//!
//! Provides HTTP endpoints for:
//! - Creating a meeting bot (POST /bots)
//! - Listing live meetings (GET /bots)
//! - Asking a bot to leave its meeting (POST /bots/:bot_id/leave)

use crate::api::error::{ApiError, ApiResult};
use crate::db::{MeetingStore, NewMeeting, StoreError};
use crate::meeting::status::{MeetingKind, MeetingStatus};
use crate::meeting::LifecycleManager;
use crate::provider::{BotProvider, CreateBotRequest};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::post,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

/// Shared state for bot routes.
#[derive(Clone)]
pub struct BotState {
    pub store: MeetingStore,
    pub provider: Arc<dyn BotProvider>,
    pub lifecycle: LifecycleManager,
}

/// Request body for bot creation.
#[derive(Debug, serde::Deserialize)]
pub struct CreateBotApiRequest {
    pub meeting_url: String,
    pub meeting_name: Option<String>,
    pub transcript_email: Option<String>,
}

pub fn router(state: BotState) -> Router {
    Router::new()
        .route("/bots", post(create_bot).get(list_bots))
        .route("/bots/:bot_id/leave", post(leave_bot))
        .with_state(state)
}

async fn create_bot(
    State(state): State<BotState>,
    Json(request): Json<CreateBotApiRequest>,
) -> ApiResult<Json<Value>> {
    if request.meeting_url.trim().is_empty() {
        return Err(ApiError::bad_request("meeting_url is required"));
    }

    info!("Bot requested for meeting {}", request.meeting_url);

    let bot = state
        .provider
        .create_bot(CreateBotRequest {
            meeting_url: &request.meeting_url,
        })
        .await
        .map_err(ApiError::from)?;

    let meeting = state
        .store
        .create(NewMeeting {
            bot_id: bot.id,
            kind: MeetingKind::Bot,
            name: request.meeting_name,
            meeting_url: Some(request.meeting_url),
            transcript_email: request.transcript_email,
        })
        .await
        .map_err(|e| match e.downcast_ref::<StoreError>() {
            Some(StoreError::DuplicateLiveMeeting(_)) => ApiError::conflict(e.to_string()),
            None => ApiError::from(e),
        })?;

    info!("Bot {} created for meeting {}", meeting.bot_id, meeting.id);

    Ok(Json(json!({
        "bot_id": meeting.bot_id,
        "meeting_id": meeting.id,
        "status": meeting.status,
    })))
}

async fn list_bots(State(state): State<BotState>) -> ApiResult<Json<Value>> {
    let meetings = state.store.list_live().await.map_err(ApiError::from)?;

    let entries: Vec<Value> = meetings
        .iter()
        .map(|m| {
            json!({
                "meeting_id": m.id,
                "bot_id": m.bot_id,
                "kind": m.kind,
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

async fn leave_bot(
    Path(bot_id): Path<String>,
    State(state): State<BotState>,
) -> ApiResult<Json<Value>> {
    info!("Leave requested for bot {}", bot_id);

    let meeting = state
        .lifecycle
        .request_leave(&bot_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found(format!("No live meeting for bot {}", bot_id)))?;

    let message = match meeting.status {
        MeetingStatus::Leaving => "Bot is leaving the meeting",
        _ => "Session closed",
    };

    Ok(Json(json!({
        "success": true,
        "bot_id": meeting.bot_id,
        "status": meeting.status,
        "message": message,
    })))
}
