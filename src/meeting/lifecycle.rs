//! Completion and leave orchestration.
//!
//! Every trigger that ends a meeting funnels through [`LifecycleManager`],
//! so the conditional store writes are the only arbiter of who owns the
//! post-completion work.

use crate::db::{MeetingRecord, MeetingStore};
use crate::delivery::TranscriptDelivery;
use crate::meeting::liveness::LivenessTracker;
use crate::meeting::status::{MeetingKind, MeetingStatus, TERMINAL_STATUSES};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

pub const REASON_IDLE: &str = "inactivity_timeout";
pub const REASON_MAX_DURATION: &str = "maximum_duration_exceeded";
pub const REASON_DISCONNECT: &str = "websocket_disconnect";
pub const REASON_MANUAL: &str = "manual";

#[derive(Debug)]
pub enum CompletionOutcome {
    /// This caller won the conditional update and ran delivery.
    Completed(MeetingRecord),
    /// Another trigger got there first, or the meeting was never live.
    AlreadyResolved,
}

#[derive(Clone)]
pub struct LifecycleManager {
    store: MeetingStore,
    liveness: LivenessTracker,
    delivery: Arc<TranscriptDelivery>,
    leave_delay: Duration,
}

impl LifecycleManager {
    pub fn new(
        store: MeetingStore,
        liveness: LivenessTracker,
        delivery: Arc<TranscriptDelivery>,
        leave_delay: Duration,
    ) -> Self {
        Self {
            store,
            liveness,
            delivery,
            leave_delay,
        }
    }

    /// Complete the live meeting for `bot_id`, if there is one.
    ///
    /// Exactly one concurrent caller sees `Completed` and runs transcript
    /// delivery; everyone else gets `AlreadyResolved`. A delivery failure is
    /// logged but does not undo the completion.
    pub async fn complete(&self, bot_id: &str, reason: &str) -> Result<CompletionOutcome> {
        let Some(meeting) = self.store.complete_if_live(bot_id).await? else {
            self.liveness.remove(bot_id);
            debug!(
                "No live meeting for bot {} to complete ({})",
                bot_id, reason
            );
            return Ok(CompletionOutcome::AlreadyResolved);
        };

        self.liveness.remove(bot_id);
        info!("Meeting {} completed: {}", meeting.id, reason);

        if let Err(e) = self.delivery.deliver(&meeting).await {
            error!(
                "Transcript delivery for meeting {} failed: {:#}",
                meeting.id, e
            );
        }

        Ok(CompletionOutcome::Completed(meeting))
    }

    /// Ask the live meeting for `bot_id` to leave.
    ///
    /// Bot-backed meetings pass through `leaving` and settle to `inactive`
    /// after a short delay; plain sessions go straight to `inactive`. Returns
    /// the updated row, or `None` when no live meeting exists.
    pub async fn request_leave(&self, bot_id: &str) -> Result<Option<MeetingRecord>> {
        let Some(meeting) = self.store.get_by_bot_id(bot_id, &TERMINAL_STATUSES).await? else {
            return Ok(None);
        };

        match meeting.kind {
            MeetingKind::Session => {
                info!("Session meeting {} marked inactive", meeting.id);
                self.liveness.remove(bot_id);
                self.store.update_status(bot_id, MeetingStatus::Inactive).await
            }
            MeetingKind::Bot => {
                let updated = self
                    .store
                    .update_status(bot_id, MeetingStatus::Leaving)
                    .await?;
                if updated.is_some() {
                    info!(
                        "Bot {} leaving, settles to inactive in {:?}",
                        bot_id, self.leave_delay
                    );
                    self.spawn_leave_settle(bot_id.to_string());
                }
                Ok(updated)
            }
        }
    }

    /// Fire-and-forget `leaving -> inactive` settle. The conditional update
    /// makes this a no-op when something else resolved the meeting first.
    fn spawn_leave_settle(&self, bot_id: String) {
        let store = self.store.clone();
        let liveness = self.liveness.clone();
        let delay = self.leave_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match store
                .update_status_if(&bot_id, MeetingStatus::Leaving, MeetingStatus::Inactive)
                .await
            {
                Ok(true) => {
                    liveness.remove(&bot_id);
                    debug!("Bot {} settled to inactive", bot_id);
                }
                Ok(false) => debug!("Bot {} resolved before the leave settled", bot_id),
                Err(e) => error!("Failed to settle leave for bot {}: {:#}", bot_id, e),
            }
        });
    }
}
