//! Periodic cleanup of idle, stuck, and orphaned meeting state.

use crate::config::TimingConfig;
use crate::db::MeetingStore;
use crate::meeting::lifecycle::{LifecycleManager, REASON_IDLE, REASON_MAX_DURATION};
use crate::meeting::liveness::LivenessTracker;
use crate::transcript::TranscriptAppender;
use std::collections::HashSet;
use tracing::{debug, info, warn};

pub struct Sweeper {
    store: MeetingStore,
    liveness: LivenessTracker,
    appender: TranscriptAppender,
    lifecycle: LifecycleManager,
    timing: TimingConfig,
}

impl Sweeper {
    pub fn new(
        store: MeetingStore,
        liveness: LivenessTracker,
        appender: TranscriptAppender,
        lifecycle: LifecycleManager,
        timing: TimingConfig,
    ) -> Self {
        Self {
            store,
            liveness,
            appender,
            lifecycle,
            timing,
        }
    }

    /// Run forever: one pass shortly after startup, then fixed intervals.
    /// Each pass is awaited before the next tick, so passes never overlap.
    pub async fn run(self) {
        let start = tokio::time::Instant::now() + self.timing.sweep_initial_delay();
        let mut ticker = tokio::time::interval_at(start, self.timing.sweep_interval());
        info!(
            "Cleanup loop started (every {:?}, first pass in {:?})",
            self.timing.sweep_interval(),
            self.timing.sweep_initial_delay()
        );
        loop {
            ticker.tick().await;
            self.run_once().await;
        }
    }

    /// A single cleanup pass. One failed item never aborts the rest.
    pub async fn run_once(&self) {
        debug!("Cleanup pass starting");
        self.sweep_idle().await;
        self.sweep_stuck().await;
        self.collect_garbage().await;
    }

    /// Complete meetings whose feed has been silent past the idle threshold.
    async fn sweep_idle(&self) {
        let idle = self.liveness.idle_longer_than(self.timing.idle_timeout());
        if idle.is_empty() {
            return;
        }
        info!("Completing {} idle meetings", idle.len());
        for bot_id in idle {
            if let Err(e) = self.lifecycle.complete(&bot_id, REASON_IDLE).await {
                warn!("Idle completion for bot {} failed: {:#}", bot_id, e);
            }
        }
    }

    /// Complete rows still joining/active long past any plausible meeting
    /// length, e.g. after a crash ate the close event.
    async fn sweep_stuck(&self) {
        let stuck = match self
            .store
            .stuck_meetings(self.timing.max_meeting_duration())
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Stuck-meeting query failed: {:#}", e);
                return;
            }
        };
        if stuck.is_empty() {
            return;
        }
        info!("Force-completing {} meetings past the age limit", stuck.len());
        for meeting in stuck {
            if let Err(e) = self
                .lifecycle
                .complete(&meeting.bot_id, REASON_MAX_DURATION)
                .await
            {
                warn!(
                    "Forced completion for bot {} failed: {:#}",
                    meeting.bot_id, e
                );
            }
        }
    }

    /// Drop in-memory entries whose meeting is no longer live.
    async fn collect_garbage(&self) {
        match self.store.live_bot_ids().await {
            Ok(ids) => {
                let live: HashSet<String> = ids.into_iter().collect();
                let dropped = self.liveness.retain_known(&live);
                if dropped > 0 {
                    info!("Dropped {} liveness entries with no live meeting", dropped);
                }
            }
            Err(e) => warn!("Live-bot query failed: {:#}", e),
        }

        match self.store.list_live().await {
            Ok(rows) => {
                let ids: HashSet<String> = rows.into_iter().map(|m| m.id).collect();
                self.appender.retain(&ids);
            }
            Err(e) => warn!("Live-meeting query failed: {:#}", e),
        }
    }
}
