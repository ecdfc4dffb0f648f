//! Dismissal tracking: local dismissals are queued and flushed to the
//! server in FIFO order until acknowledged, rejected, or too old.

use log::{debug, info, warn};
use std::collections::VecDeque;
use std::sync::Arc;

use cardsync_core::store::StateUpdate;
use cardsync_core::sync::{
    classify_dismissal_status, combine_groups, dismissals_for, remove_dismissed,
    DismissalOutcome, PendingDismissal, TaskKind, MAXIMUM_DISMISSAL_AGE_MS,
};

use super::SyncEngine;
use crate::error::EngineError;
use crate::types::DismissalRequest;

fn dismissal_outcome(result: &Result<(), EngineError>) -> DismissalOutcome {
    match result {
        Ok(()) => DismissalOutcome::Acknowledged,
        Err(EngineError::Transport(err)) => err
            .status
            .map(classify_dismissal_status)
            .unwrap_or(DismissalOutcome::Retry),
        Err(_) => DismissalOutcome::Retry,
    }
}

fn request_for(dismissal: &PendingDismissal, now: i64) -> DismissalRequest {
    DismissalRequest {
        notification_id: dismissal.dismissal_data.notification_id.clone(),
        chrome_notification_id: dismissal.chrome_notification_id.clone(),
        age_ms: dismissal.age_ms(now),
        parameters: dismissal.dismissal_data.parameters.clone(),
    }
}

impl SyncEngine {
    /// Handles a closed notification. Only closes by the user count as dismissals.
    pub fn on_notification_closed(
        self: &Arc<Self>,
        chrome_notification_id: &str,
        by_user: bool,
    ) -> bool {
        if !by_user {
            debug!(
                "[CardSync] Notification {} closed by the system",
                chrome_notification_id
            );
            return false;
        }
        let chrome_notification_id = chrome_notification_id.to_string();
        self.enqueue(TaskKind::DismissCard, move |engine| async move {
            engine.record_dismissal(&chrome_notification_id).await
        })
    }

    /// `dismiss` timer callback.
    pub fn retry_pending_dismissals(self: &Arc<Self>) -> bool {
        self.enqueue(TaskKind::RetryDismissals, |engine| async move {
            engine.process_pending_dismissals().await
        })
    }

    /// Queues a dismissal for every visible component of the card, removes
    /// those cards locally, then flushes the queue.
    pub(crate) async fn record_dismissal(
        &self,
        chrome_notification_id: &str,
    ) -> Result<(), EngineError> {
        let now = self.now_ms();
        let mut groups = self.state.notification_groups().await?;
        let combined = combine_groups(&groups);
        let dismissals = combined
            .get(chrome_notification_id)
            .map(|card| dismissals_for(card, chrome_notification_id, now))
            .unwrap_or_default();

        if dismissals.is_empty() {
            debug!(
                "[CardSync] Nothing to dismiss for notification {}",
                chrome_notification_id
            );
            return Ok(());
        }

        info!(
            "[CardSync] Dismissing {} card(s) of notification {}",
            dismissals.len(),
            chrome_notification_id
        );
        self.dismiss.start(None).await;

        let mut pending = self.state.pending_dismissals().await?;
        pending.extend(dismissals.iter().cloned());
        remove_dismissed(&mut groups, &dismissals);
        self.state
            .save(
                StateUpdate::new()
                    .pending_dismissals(pending)
                    .groups(groups),
            )
            .await?;

        self.cancel_card_timer(chrome_notification_id).await;
        if let Err(err) = self.ports.sink.clear(chrome_notification_id).await {
            warn!(
                "[CardSync] Failed to clear notification {}: {}",
                chrome_notification_id, err
            );
        }

        self.process_pending_dismissals().await
    }

    /// Sends queued dismissals oldest first, stopping at the first one that
    /// should be retried later.
    pub(crate) async fn process_pending_dismissals(&self) -> Result<(), EngineError> {
        let mut pending: VecDeque<PendingDismissal> =
            self.state.pending_dismissals().await?.into();
        let mut recent = self.state.recent_dismissals().await?;
        let initial_len = pending.len();
        let mut acknowledged = 0usize;
        let mut failure = None;

        while let Some(head) = pending.front() {
            let now = self.now_ms();
            if head.age_ms(now) > MAXIMUM_DISMISSAL_AGE_MS {
                info!(
                    "[CardSync] Dropping stale dismissal of {}",
                    head.dismissal_data.notification_id
                );
                pending.pop_front();
                continue;
            }

            let result = self.gateway.delete_notification(request_for(head, now)).await;
            match dismissal_outcome(&result) {
                DismissalOutcome::Acknowledged => {
                    recent.record(head.dismissal_data.notification_id.clone(), now);
                    acknowledged += 1;
                    pending.pop_front();
                }
                DismissalOutcome::Rejected => {
                    warn!(
                        "[CardSync] Server rejected dismissal of {}",
                        head.dismissal_data.notification_id
                    );
                    pending.pop_front();
                }
                DismissalOutcome::Retry => {
                    failure = result.err();
                    break;
                }
            }
        }

        if pending.len() != initial_len {
            let mut update = StateUpdate::new().pending_dismissals(pending.iter().cloned().collect());
            if acknowledged > 0 {
                update = update.recent_dismissals(recent.retained(self.now_ms()));
            }
            self.state.save(update).await?;
        }

        if pending.is_empty() {
            self.dismiss.stop().await;
            return Ok(());
        }

        if let Some(err) = failure {
            warn!("[CardSync] Dismissal failed, will retry: {}", err);
        }
        self.dismiss.schedule_retry().await;
        Err(EngineError::DismissalsPending {
            remaining: pending.len(),
        })
    }
}
