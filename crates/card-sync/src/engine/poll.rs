//! Card polling and rendering.

use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use cardsync_core::store::StateUpdate;
use cardsync_core::sync::{
    card_to_show, combine_groups, groups_to_request, next_update_time, process_server_response,
    CombinedCard, NotificationGroups, ServerUpdate, TaskKind,
};

use super::SyncEngine;
use crate::error::EngineError;
use crate::types::NotificationsQuery;

impl SyncEngine {
    /// `cards-update` timer callback: queue a poll cycle.
    pub fn request_cards(self: &Arc<Self>) -> bool {
        self.enqueue(TaskKind::UpdateCards, |engine| async move {
            engine.update_cards().await
        })
    }

    /// Refreshes one displayed card when its show or hide edge passes.
    pub fn on_card_timer(self: &Arc<Self>, chrome_notification_id: &str) -> bool {
        let chrome_notification_id = chrome_notification_id.to_string();
        self.enqueue(TaskKind::RefreshCard, move |engine| async move {
            engine.refresh_card(&chrome_notification_id).await
        })
    }

    pub(crate) fn show_cards_on_start(self: &Arc<Self>) -> bool {
        self.enqueue(TaskKind::ShowCardsOnStart, |engine| async move {
            if !engine.polling_state().await.is_polling() {
                debug!("[CardSync] Not polling, stored cards stay hidden");
                return Ok(());
            }
            let groups = engine.state.notification_groups().await?;
            debug!("[CardSync] Showing {} stored group(s) on start", groups.len());
            engine.show_notification_groups(&groups).await
        })
    }

    /// One poll cycle. Dismissals are flushed before cards are fetched; any
    /// failure backs off the `cards-update` timer.
    async fn update_cards(self: &Arc<Self>) -> Result<(), EngineError> {
        if !self.cards_update.is_running().await {
            debug!("[CardSync] Card polling stopped, skipping update");
            return Ok(());
        }

        let result = match self.process_pending_dismissals().await {
            Ok(()) => self.request_notification_cards().await,
            Err(err) => Err(err),
        };
        if result.is_err() {
            self.cards_update.schedule_retry().await;
        }
        result
    }

    async fn request_notification_cards(self: &Arc<Self>) -> Result<(), EngineError> {
        let stored_groups = self.state.notification_groups().await?;
        let query = NotificationsQuery {
            time_zone_offset_ms: self.config.time_zone_offset_ms,
            request_types: groups_to_request(&stored_groups, self.now_ms()),
            ui_locale: self.config.ui_locale.clone(),
        };
        let response = self.gateway.get_notifications(query).await?;

        let recent = self.state.recent_dismissals().await?;
        match process_server_response(response, &stored_groups, &recent, self.now_ms())? {
            ServerUpdate::FeatureDisabled => {
                info!("[CardSync] Server reports the feature disabled");
                self.state
                    .save(StateUpdate::new().google_now_enabled(false))
                    .await?;
                self.on_state_changed();
                Ok(())
            }
            ServerUpdate::Updated(outcome) => {
                self.state
                    .save(
                        StateUpdate::new()
                            .groups(outcome.groups.clone())
                            .recent_dismissals(outcome.recent_dismissals),
                    )
                    .await?;
                self.show_notification_groups(&outcome.groups).await?;

                info!(
                    "[CardSync] Cards updated, next poll in {}s",
                    outcome.next_poll_delay_secs
                );
                self.cards_update
                    .start(Some(Duration::from_secs(outcome.next_poll_delay_secs)))
                    .await;
                Ok(())
            }
        }
    }

    /// Makes the displayed notifications match `groups`.
    pub(crate) async fn show_notification_groups(
        self: &Arc<Self>,
        groups: &NotificationGroups,
    ) -> Result<(), EngineError> {
        let now = self.now_ms();
        let cards = combine_groups(groups);

        match self.ports.sink.displayed_ids().await {
            Ok(displayed) => {
                for id in displayed.iter().filter(|id| !cards.contains_key(*id)) {
                    self.clear_notification(id).await;
                }
            }
            Err(err) => warn!("[CardSync] Failed to list displayed notifications: {}", err),
        }

        let live: HashSet<&String> = cards.keys().collect();
        let stale_timers: Vec<String> = self
            .card_timers
            .lock()
            .await
            .keys()
            .filter(|id| !live.contains(id))
            .cloned()
            .collect();
        for id in stale_timers {
            self.cancel_card_timer(&id).await;
        }

        for (id, card) in &cards {
            self.show_card(id, card, groups, now).await;
        }
        Ok(())
    }

    async fn refresh_card(self: &Arc<Self>, chrome_notification_id: &str) -> Result<(), EngineError> {
        let groups = self.state.notification_groups().await?;
        let cards = combine_groups(&groups);
        match cards.get(chrome_notification_id) {
            Some(card) => {
                self.show_card(chrome_notification_id, card, &groups, self.now_ms())
                    .await
            }
            None => {
                self.cancel_card_timer(chrome_notification_id).await;
                self.clear_notification(chrome_notification_id).await;
            }
        }
        Ok(())
    }

    async fn show_card(
        self: &Arc<Self>,
        chrome_notification_id: &str,
        card: &CombinedCard,
        groups: &NotificationGroups,
        now: i64,
    ) {
        match card_to_show(card, groups, now) {
            Some(notification) => {
                if let Err(err) = self.ports.sink.show(chrome_notification_id, notification).await {
                    warn!(
                        "[CardSync] Failed to show notification {}: {}",
                        chrome_notification_id, err
                    );
                }
            }
            None => self.clear_notification(chrome_notification_id).await,
        }

        match next_update_time(card, now) {
            Some(at) => self.arm_card_timer(chrome_notification_id, at.saturating_sub(now)).await,
            None => self.cancel_card_timer(chrome_notification_id).await,
        }
    }

    async fn clear_notification(&self, chrome_notification_id: &str) {
        if let Err(err) = self.ports.sink.clear(chrome_notification_id).await {
            warn!(
                "[CardSync] Failed to clear notification {}: {}",
                chrome_notification_id, err
            );
        }
    }

    async fn arm_card_timer(self: &Arc<Self>, chrome_notification_id: &str, delay_ms: i64) {
        let delay = Duration::from_millis(u64::try_from(delay_ms).unwrap_or(0));
        let engine = Arc::downgrade(self);
        let id = chrome_notification_id.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(engine) = engine.upgrade() {
                engine.on_card_timer(&id);
            }
        });

        if let Some(previous) = self
            .card_timers
            .lock()
            .await
            .insert(chrome_notification_id.to_string(), handle)
        {
            previous.abort();
        }
    }

    pub(crate) async fn cancel_card_timer(&self, chrome_notification_id: &str) {
        if let Some(handle) = self.card_timers.lock().await.remove(chrome_notification_id) {
            handle.abort();
        }
    }

    pub(crate) async fn cancel_all_card_timers(&self) {
        for (_, handle) in self.card_timers.lock().await.drain() {
            handle.abort();
        }
    }
}
