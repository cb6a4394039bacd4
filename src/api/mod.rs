//! REST API server for Stenobot.
//!
//! Provides HTTP endpoints for:
//! - Bot provisioning and leave requests
//! - Meeting inspection and administration
//! - The provider chat webhook
//! - The provider transcript WebSocket

pub mod error;
pub mod routes;

use crate::chat::ChatCommandHandler;
use crate::config::Config;
use crate::db::MeetingStore;
use crate::ingest::IngestState;
use crate::meeting::LifecycleManager;
use crate::provider::BotProvider;
use anyhow::Result;
use axum::{extract::State, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tracing::info;

use routes::bots::BotState;
use routes::meetings::MeetingState;

pub struct ApiServer {
    host: String,
    port: u16,
    bots: BotState,
    meetings: MeetingState,
    chat: ChatCommandHandler,
    ingest: IngestState,
    started_at: Instant,
}

impl ApiServer {
    pub fn new(
        config: &Config,
        store: MeetingStore,
        provider: Arc<dyn BotProvider>,
        lifecycle: LifecycleManager,
        chat: ChatCommandHandler,
        ingest: IngestState,
    ) -> Self {
        Self {
            host: config.server.host.clone(),
            port: config.server.port,
            bots: BotState {
                store: store.clone(),
                provider,
                lifecycle: lifecycle.clone(),
            },
            meetings: MeetingState {
                store,
                lifecycle,
                stuck_age: config.timing.max_meeting_duration(),
            },
            chat,
            ingest,
            started_at: Instant::now(),
        }
    }

    pub async fn start(self) -> Result<()> {
        let app = Router::new()
            // Root and health endpoints
            .route("/", get(service_info))
            .route("/health", get(health))
            .with_state(ServiceInfo {
                started_at: self.started_at,
            })
            // Provider-facing channels
            .merge(crate::ingest::router(self.ingest))
            .merge(routes::chat::router(self.chat))
            // Operator API
            .nest(
                "/api",
                routes::bots::router(self.bots).merge(routes::meetings::router(self.meetings)),
            )
            .layer(ServiceBuilder::new());

        let listener =
            tokio::net::TcpListener::bind(&format!("{}:{}", self.host, self.port)).await?;

        info!("API server listening on http://{}:{}", self.host, self.port);
        info!("Endpoints:");
        info!("  GET  /health                - Service health");
        info!("  GET  /transcript            - Transcript stream (WebSocket)");
        info!("  POST /webhook/chat          - Chat message webhook");
        info!("  POST /api/bots              - Create a meeting bot");
        info!("  GET  /api/bots              - List live meetings");
        info!("  POST /api/bots/:id/leave    - Ask a bot to leave");
        info!("  GET  /api/meetings/stuck    - List stuck meetings");
        info!("  GET  /api/meetings/:id/transcript - Fetch a transcript");
        info!("  POST /api/meetings/:id/complete   - Force-complete a meeting");

        axum::serve(listener, app).await?;

        Ok(())
    }
}

#[derive(Clone)]
struct ServiceInfo {
    started_at: Instant,
}

async fn service_info() -> Json<Value> {
    Json(json!({
        "service": "stenobot",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn health(State(info): State<ServiceInfo>) -> Json<Value> {
    Json(json!({
        "service": "stenobot",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "uptime_seconds": info.started_at.elapsed().as_secs(),
    }))
}
