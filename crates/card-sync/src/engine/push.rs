use log::{debug, info};
use std::sync::Arc;

use cardsync_core::store::StateUpdate;
use cardsync_core::sync::{
    NotificationGroup, TaskKind, PUSH_GROUP_PREFIX, REQUEST_CARDS_PAYLOAD_PREFIX,
};

use super::SyncEngine;
use crate::error::EngineError;

impl SyncEngine {
    /// Handles a push message. Only `REQUEST_CARDS` payloads wake the poller.
    pub fn on_push_message(self: &Arc<Self>, tag: &str, payload: &str) -> bool {
        if !payload.starts_with(REQUEST_CARDS_PAYLOAD_PREFIX) {
            debug!("[CardSync] Ignoring push message on '{}'", tag);
            return false;
        }
        let tag = tag.to_string();
        let payload = payload.to_string();
        self.enqueue(TaskKind::OnPushMessage, move |engine| async move {
            engine.handle_push(tag, payload).await
        })
    }

    /// Polls the tag's synthetic group now, unless this payload was already seen.
    async fn handle_push(self: &Arc<Self>, tag: String, payload: String) -> Result<(), EngineError> {
        let mut payloads = self.state.last_poll_now_payloads().await?;
        if payloads.get(&tag) == Some(&payload) {
            debug!("[CardSync] Duplicate push payload on '{}'", tag);
            return Ok(());
        }

        info!("[CardSync] Push requested cards on '{}'", tag);
        let mut groups = self.state.notification_groups().await?;
        groups.insert(
            format!("{}{}", PUSH_GROUP_PREFIX, tag),
            NotificationGroup {
                next_poll_time: Some(self.now_ms()),
                ..NotificationGroup::default()
            },
        );
        payloads.insert(tag, payload);
        self.state
            .save(
                StateUpdate::new()
                    .groups(groups)
                    .last_poll_now_payloads(payloads),
            )
            .await?;

        self.request_cards();
        Ok(())
    }
}
