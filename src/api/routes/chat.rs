//! Provider chat webhook endpoint (POST /webhook/chat).

use crate::api::error::{ApiError, ApiResult};
use crate::chat::{ChatCommandHandler, ChatOutcome, ChatWebhook};
use axum::{extract::State, response::Json, routing::post, Router};
use serde_json::{json, Value};
use tracing::debug;

pub fn router(handler: ChatCommandHandler) -> Router {
    Router::new()
        .route("/webhook/chat", post(receive_chat))
        .with_state(handler)
}

async fn receive_chat(
    State(handler): State<ChatCommandHandler>,
    Json(webhook): Json<ChatWebhook>,
) -> ApiResult<Json<Value>> {
    let message = webhook
        .into_message()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    debug!(
        "Chat message from {} for bot {}",
        message.sender, message.bot_id
    );

    let outcome = handler
        .handle(&message.bot_id, &message.sender, &message.text)
        .await
        .map_err(ApiError::from)?;

    let body = match outcome {
        ChatOutcome::UnknownBot => {
            return Err(ApiError::not_found(format!(
                "No meeting found for bot {}",
                message.bot_id
            )))
        }
        ChatOutcome::Ignored => json!({
            "success": true,
            "message": "Ignoring bot message",
        }),
        ChatOutcome::Recorded => json!({
            "success": true,
            "message": "Chat message received",
        }),
        ChatOutcome::Replied(reply) => json!({
            "success": true,
            "message": "Question processed",
            "response": reply,
        }),
        // A 2xx keeps the provider from retrying; a retried command would
        // run twice.
        ChatOutcome::ReplyFailed => json!({
            "success": false,
            "message": "Reply could not be delivered to the meeting",
        }),
    };

    Ok(Json(body))
}
