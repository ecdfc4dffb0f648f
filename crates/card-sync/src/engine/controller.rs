//! Running-state control: decides from the platform signals whether cards
//! are polled, whether the opt-in status is polled, and whether background
//! mode is requested.

use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;

use cardsync_core::store::StateUpdate;
use cardsync_core::sync::{PollingTransition, RunningSignals, TaskKind};

use super::SyncEngine;
use crate::error::EngineError;

impl SyncEngine {
    /// Re-evaluates the running state after sign-in, permission or storage changes.
    pub fn on_state_changed(self: &Arc<Self>) -> bool {
        self.enqueue(TaskKind::StateChanged, |engine| async move {
            engine.update_running_state().await
        })
    }

    /// Callback of the `optin` and `optin-recheck` timers.
    pub fn request_opt_in(self: &Arc<Self>, recheck: bool) -> bool {
        self.enqueue(TaskKind::PollOptIn, move |engine| async move {
            engine.poll_opt_in(recheck).await
        })
    }

    async fn read_signals(&self) -> Result<RunningSignals, EngineError> {
        Ok(RunningSignals {
            signed_in: self.ports.auth.is_signed_in().await,
            background_permitted: self.ports.signals.background_permitted().await,
            notifications_permitted: self.ports.signals.notifications_permitted().await,
            feature_enabled: self.state.google_now_enabled().await?,
        })
    }

    async fn update_running_state(self: &Arc<Self>) -> Result<(), EngineError> {
        let signals = self.read_signals().await?;
        let decision = signals.decide();
        let next = signals.polling_state();
        debug!("[CardSync] Running state {:?} -> {:?}", signals, decision);

        self.ports
            .signals
            .set_background_mode(decision.should_set_background)
            .await;

        let previous = {
            let mut current = self.polling_state.lock().await;
            std::mem::replace(&mut *current, next)
        };
        if previous != next {
            info!("[CardSync] Polling state {:?} -> {:?}", previous, next);
        }

        match previous.transition_to(next) {
            PollingTransition::StartPolling => self.start_polling().await,
            PollingTransition::StopPolling => self.stop_polling().await?,
            PollingTransition::None if !next.is_polling() => {
                // The in-memory state starts at Void, so cards cached by an
                // earlier run are only visible through the store.
                if self.state.load().await?.has_cached_cards() {
                    info!("[CardSync] Clearing cards cached while polling was on");
                    self.stop_polling().await?;
                }
            }
            PollingTransition::None => {}
        }

        if decision.should_poll_opt_in {
            if !self.optin.is_running().await {
                self.optin.start(Some(Duration::ZERO)).await;
            }
        } else {
            self.optin.stop().await;
        }
        Ok(())
    }

    /// Arms the ceiling timer and polls right away.
    async fn start_polling(self: &Arc<Self>) {
        info!("[CardSync] Starting card polling");
        self.cards_update
            .start(Some(Duration::from_secs(
                self.config.cards_update.maximum_secs,
            )))
            .await;
        self.optin_recheck.start(None).await;
        self.request_cards();
    }

    /// Disarms polling and wipes cached cards, dismissals and push payloads.
    async fn stop_polling(&self) -> Result<(), EngineError> {
        info!("[CardSync] Stopping card polling");
        self.cards_update.stop().await;
        self.optin_recheck.stop().await;
        self.dismiss.stop().await;
        self.cancel_all_card_timers().await;

        match self.ports.sink.displayed_ids().await {
            Ok(displayed) => {
                for id in displayed {
                    if let Err(err) = self.ports.sink.clear(&id).await {
                        warn!("[CardSync] Failed to clear notification {}: {}", id, err);
                    }
                }
            }
            Err(err) => warn!("[CardSync] Failed to list displayed notifications: {}", err),
        }

        self.state.clear_cached_cards().await?;
        Ok(())
    }

    /// Asks the server whether the user is opted in and stores the answer.
    async fn poll_opt_in(self: &Arc<Self>, recheck: bool) -> Result<(), EngineError> {
        let manager = if recheck {
            &self.optin_recheck
        } else {
            &self.optin
        };

        if !manager.is_running().await {
            debug!("[CardSync] {} stopped, skipping opt-in poll", manager.name());
            return Ok(());
        }

        let opted_in = match self.gateway.get_opt_in().await {
            Ok(opted_in) => opted_in,
            Err(err) => {
                manager.schedule_retry().await;
                return Err(err);
            }
        };

        let previous = self.state.google_now_enabled().await?;
        info!("[CardSync] Opt-in status: {}", opted_in);
        self.state
            .save(StateUpdate::new().google_now_enabled(opted_in))
            .await?;

        manager.start(None).await;
        if opted_in != previous {
            self.on_state_changed();
        }
        Ok(())
    }
}
