//! Service wiring: builds the collaborators and runs the server.

use crate::api::ApiServer;
use crate::chat::ChatCommandHandler;
use crate::config::Config;
use crate::db::MeetingStore;
use crate::delivery::TranscriptDelivery;
use crate::ingest::{GraceTimers, IngestState};
use crate::mailer;
use crate::meeting::{LifecycleManager, LivenessTracker, Sweeper};
use crate::provider::{BotProvider, RecallClient};
use crate::transcript::TranscriptAppender;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub async fn run_service(config_path: Option<PathBuf>) -> Result<()> {
    info!("Starting Stenobot service");

    let config = match config_path {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };

    let store = MeetingStore::open(crate::global::db_file()?)?;
    let liveness = LivenessTracker::new();
    let appender = TranscriptAppender::new(store.clone());

    let mailer = mailer::from_config(&config.mail);
    let delivery = Arc::new(TranscriptDelivery::new(
        store.clone(),
        mailer,
        config.mail.effective_from().to_string(),
    ));
    let lifecycle = LifecycleManager::new(
        store.clone(),
        liveness.clone(),
        delivery,
        config.timing.leave_delay(),
    );

    let provider: Arc<dyn BotProvider> =
        Arc::new(RecallClient::from_config(&config.provider, &config.server)?);
    let chat = ChatCommandHandler::new(
        store.clone(),
        appender.clone(),
        liveness.clone(),
        provider.clone(),
        &config.provider.bot_name,
    )?;
    let ingest = IngestState::new(
        store.clone(),
        appender.clone(),
        liveness.clone(),
        lifecycle.clone(),
        GraceTimers::default(),
        config.timing.disconnect_grace(),
    );

    let sweeper = Sweeper::new(
        store.clone(),
        liveness,
        appender,
        lifecycle.clone(),
        config.timing.clone(),
    );
    tokio::spawn(sweeper.run());

    let api_server = ApiServer::new(&config, store, provider, lifecycle, chat, ingest);
    api_server.start().await
}
