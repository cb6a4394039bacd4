//! WebSocket endpoint for realtime transcript ingestion.
//!
//! The provider opens one connection per bot and streams JSON frames. A
//! connection starts unbound, binds to the bot id carried by its first
//! transcript frame, and keeps that binding until close. Close starts a
//! grace timer; if the bot reconnects before it fires, the timer is
//! cancelled, otherwise the meeting is completed with a disconnect reason.

pub mod events;

use crate::db::MeetingStore;
use crate::meeting::lifecycle::{LifecycleManager, REASON_DISCONNECT};
use crate::meeting::liveness::LivenessTracker;
use crate::meeting::status::TERMINAL_STATUSES;
use crate::transcript::{speech_line, TranscriptAppender};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use events::{StreamEvent, TranscriptFragment};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Pending disconnect timers, keyed by bot id.
#[derive(Clone, Default)]
pub struct GraceTimers {
    inner: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
}

impl GraceTimers {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, JoinHandle<()>>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start (or restart) the disconnect timer for a bot. When it fires, the
    /// meeting is completed; the conditional completion makes any overlap
    /// with a racing trigger harmless.
    pub fn schedule(&self, bot_id: &str, delay: Duration, lifecycle: LifecycleManager) {
        let mut timers = self.lock();
        if let Some(previous) = timers.remove(bot_id) {
            previous.abort();
        }

        let id = bot_id.to_string();
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = lifecycle.complete(&id, REASON_DISCONNECT).await {
                error!("Disconnect completion for bot {} failed: {:#}", id, e);
            }
            inner.lock().unwrap_or_else(|e| e.into_inner()).remove(&id);
        });
        timers.insert(bot_id.to_string(), handle);
    }

    /// Cancel a pending timer. Returns whether one was pending.
    pub fn cancel(&self, bot_id: &str) -> bool {
        match self.lock().remove(bot_id) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn pending(&self) -> usize {
        self.lock().len()
    }
}

#[derive(Clone)]
pub struct IngestState {
    store: MeetingStore,
    appender: TranscriptAppender,
    liveness: LivenessTracker,
    lifecycle: LifecycleManager,
    grace: GraceTimers,
    grace_delay: Duration,
}

impl IngestState {
    pub fn new(
        store: MeetingStore,
        appender: TranscriptAppender,
        liveness: LivenessTracker,
        lifecycle: LifecycleManager,
        grace: GraceTimers,
        grace_delay: Duration,
    ) -> Self {
        Self {
            store,
            appender,
            liveness,
            lifecycle,
            grace,
            grace_delay,
        }
    }

    /// Process one text frame. `bound` is the connection's bot binding,
    /// `activated` remembers whether the joining -> active update was
    /// already attempted for this connection.
    async fn handle_frame(&self, raw: &str, bound: &mut Option<String>, activated: &mut bool) {
        let fragment = match events::parse_stream_frame(raw) {
            Ok(StreamEvent::Transcript(fragment)) => fragment,
            Ok(StreamEvent::Ignored { event }) => {
                debug!("Ignoring stream event {}", event);
                return;
            }
            Err(e) => {
                warn!("Dropping malformed stream frame: {}", e);
                return;
            }
        };

        if bound.is_none() {
            if self.grace.cancel(&fragment.bot_id) {
                info!(
                    "Bot {} reconnected, cancelled pending disconnect",
                    fragment.bot_id
                );
            }
            info!("Transcript stream bound to bot {}", fragment.bot_id);
            *bound = Some(fragment.bot_id.clone());
        }
        // The binding is trusted for the rest of the connection.
        let bot_id = match bound.as_deref() {
            Some(id) => id,
            None => return,
        };

        let meeting = match self.store.get_by_bot_id(bot_id, &TERMINAL_STATUSES).await {
            Ok(Some(meeting)) => meeting,
            Ok(None) => {
                warn!("No live meeting for bot {}, dropping fragment", bot_id);
                return;
            }
            Err(e) => {
                error!("Meeting lookup for bot {} failed: {:#}", bot_id, e);
                return;
            }
        };

        self.liveness.touch(bot_id);

        let TranscriptFragment { speaker, text, .. } = fragment;
        if text.is_empty() {
            debug!("Empty transcript fragment from {}, skipping", speaker);
            return;
        }

        let appended = self.appender.append(&meeting.id, &speech_line(&speaker, &text)).await;
        if appended && !*activated {
            match self.store.mark_active_if_joining(bot_id).await {
                Ok(changed) => {
                    if changed {
                        info!("Meeting {} is now active", meeting.id);
                    }
                    *activated = true;
                }
                Err(e) => warn!("Activation update for bot {} failed: {:#}", bot_id, e),
            }
        }
    }
}

pub fn router(state: IngestState) -> Router {
    Router::new()
        .route("/transcript", get(transcript_ws))
        .with_state(state)
}

async fn transcript_ws(ws: WebSocketUpgrade, State(state): State<IngestState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: IngestState) {
    info!("Transcript stream connected");
    let mut bound: Option<String> = None;
    let mut activated = false;

    while let Some(result) = socket.recv().await {
        let message = match result {
            Ok(message) => message,
            Err(e) => {
                warn!("Transcript stream error: {}", e);
                break;
            }
        };
        match message {
            Message::Text(text) => state.handle_frame(&text, &mut bound, &mut activated).await,
            Message::Binary(_) => debug!("Ignoring binary frame on transcript stream"),
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => break,
        }
    }

    match bound {
        Some(bot_id) => {
            info!(
                "Transcript stream for bot {} closed, completing in {:?} unless it reconnects",
                bot_id, state.grace_delay
            );
            state
                .grace
                .schedule(&bot_id, state.grace_delay, state.lifecycle.clone());
        }
        None => info!("Transcript stream closed before any transcript data"),
    }
}
