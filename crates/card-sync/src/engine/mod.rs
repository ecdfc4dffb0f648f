//! Card sync engine.
//!
//! All work funnels through one [`TaskQueue`]; the four attempt managers and
//! the per-card refresh timers only enqueue tasks. The queue is the only
//! mutual exclusion around the persisted state.

mod attempt;
mod controller;
mod dismissal;
mod gateway;
mod poll;
mod ports;
mod push;
mod task_queue;

#[cfg(test)]
mod testing;

pub use attempt::{AttemptCallback, AttemptManager, AttemptState, BackoffPolicy};
pub use ports::{
    AuthProvider, Clock, EnginePorts, NotificationSink, PlatformSignals, RemoteServiceClient,
    SystemClock, TransportError,
};
pub use task_queue::{TaskFuture, TaskQueue};

use futures::FutureExt;
use log::{debug, info};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use cardsync_core::store::SyncStateStore;
use cardsync_core::sync::{
    PollingState, TaskKind, INITIAL_OPTIN_RECHECK_PERIOD_SECONDS, INITIAL_POLLING_PERIOD_SECONDS,
    INITIAL_RETRY_DISMISS_PERIOD_SECONDS, MAXIMUM_OPTIN_RECHECK_PERIOD_SECONDS,
    MAXIMUM_POLLING_PERIOD_SECONDS, MAXIMUM_RETRY_DISMISS_PERIOD_SECONDS,
};

use crate::error::EngineError;
use gateway::RemoteGateway;

pub const CARDS_UPDATE_ATTEMPT: &str = "cards-update";
pub const OPTIN_ATTEMPT: &str = "optin";
pub const OPTIN_RECHECK_ATTEMPT: &str = "optin-recheck";
pub const DISMISS_ATTEMPT: &str = "dismiss";

/// Engine settings.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Sent as `uiLocale` with every card request.
    pub ui_locale: String,
    /// Local offset from UTC, positive east of Greenwich.
    pub time_zone_offset_ms: i64,
    pub cards_update: BackoffPolicy,
    pub optin: BackoffPolicy,
    pub optin_recheck: BackoffPolicy,
    pub dismiss: BackoffPolicy,
}

impl EngineConfig {
    pub fn new(ui_locale: impl Into<String>) -> Self {
        Self {
            ui_locale: ui_locale.into(),
            ..Self::default()
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        let offset_seconds = chrono::Local::now().offset().local_minus_utc();
        Self {
            ui_locale: "en-US".to_string(),
            time_zone_offset_ms: i64::from(offset_seconds) * 1000,
            cards_update: BackoffPolicy::new(
                INITIAL_POLLING_PERIOD_SECONDS,
                MAXIMUM_POLLING_PERIOD_SECONDS,
            ),
            optin: BackoffPolicy::new(
                INITIAL_POLLING_PERIOD_SECONDS,
                MAXIMUM_POLLING_PERIOD_SECONDS,
            ),
            optin_recheck: BackoffPolicy::new(
                INITIAL_OPTIN_RECHECK_PERIOD_SECONDS,
                MAXIMUM_OPTIN_RECHECK_PERIOD_SECONDS,
            ),
            dismiss: BackoffPolicy::new(
                INITIAL_RETRY_DISMISS_PERIOD_SECONDS,
                MAXIMUM_RETRY_DISMISS_PERIOD_SECONDS,
            ),
        }
    }
}

pub struct SyncEngine {
    config: EngineConfig,
    ports: EnginePorts,
    state: SyncStateStore,
    gateway: RemoteGateway,
    queue: TaskQueue,
    cards_update: AttemptManager,
    optin: AttemptManager,
    optin_recheck: AttemptManager,
    dismiss: AttemptManager,
    card_timers: Mutex<HashMap<String, JoinHandle<()>>>,
    polling_state: Mutex<PollingState>,
}

fn engine_callback(engine: &Weak<SyncEngine>, action: fn(&Arc<SyncEngine>)) -> AttemptCallback {
    let engine = engine.clone();
    Arc::new(move || {
        if let Some(engine) = engine.upgrade() {
            action(&engine);
        }
    })
}

impl SyncEngine {
    /// Builds the engine and spawns its task worker on the current runtime.
    /// Nothing is polled until [`SyncEngine::start`].
    pub fn new(config: EngineConfig, ports: EnginePorts) -> Arc<Self> {
        let engine = Arc::new(Self {
            state: SyncStateStore::new(Arc::clone(&ports.store)),
            gateway: RemoteGateway::new(Arc::clone(&ports.remote), Arc::clone(&ports.auth)),
            queue: TaskQueue::new(),
            cards_update: AttemptManager::new(CARDS_UPDATE_ATTEMPT, config.cards_update),
            optin: AttemptManager::new(OPTIN_ATTEMPT, config.optin),
            optin_recheck: AttemptManager::new(OPTIN_RECHECK_ATTEMPT, config.optin_recheck),
            dismiss: AttemptManager::new(DISMISS_ATTEMPT, config.dismiss),
            card_timers: Mutex::new(HashMap::new()),
            polling_state: Mutex::new(PollingState::default()),
            config,
            ports,
        });

        let weak = Arc::downgrade(&engine);
        engine.cards_update.set_callback(engine_callback(&weak, |engine| {
            engine.request_cards();
        }));
        engine.optin.set_callback(engine_callback(&weak, |engine| {
            engine.request_opt_in(false);
        }));
        engine.optin_recheck.set_callback(engine_callback(&weak, |engine| {
            engine.request_opt_in(true);
        }));
        engine.dismiss.set_callback(engine_callback(&weak, |engine| {
            engine.retry_pending_dismissals();
        }));

        engine
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Renders the stored cards, then evaluates whether to poll.
    pub fn start(self: &Arc<Self>) {
        info!("[CardSync] Starting card sync engine");
        self.on_state_changed();
        self.show_cards_on_start();
    }

    /// Disarms every timer and stops the task worker.
    pub async fn shutdown(&self) {
        info!("[CardSync] Shutting down card sync engine");
        for manager in self.attempt_managers() {
            manager.stop().await;
        }
        self.cancel_all_card_timers().await;
        self.queue.shutdown();
    }

    /// Resolves once no task is running or waiting.
    pub async fn idle(&self) {
        self.queue.idle().await;
    }

    pub async fn polling_state(&self) -> PollingState {
        *self.polling_state.lock().await
    }

    pub fn scheduled_tasks(&self) -> Vec<TaskKind> {
        self.queue.scheduled()
    }

    pub async fn attempt_state(&self, name: &str) -> Option<AttemptState> {
        match self.attempt_managers().into_iter().find(|m| m.name() == name) {
            Some(manager) => Some(manager.state().await),
            None => None,
        }
    }

    fn attempt_managers(&self) -> [&AttemptManager; 4] {
        [
            &self.cards_update,
            &self.optin,
            &self.optin_recheck,
            &self.dismiss,
        ]
    }

    fn now_ms(&self) -> i64 {
        self.ports.clock.now_ms()
    }

    /// Enqueues `work` under `kind`; the closure receives an owned engine handle.
    fn enqueue<F, Fut>(self: &Arc<Self>, kind: TaskKind, work: F) -> bool
    where
        F: FnOnce(Arc<Self>) -> Fut,
        Fut: Future<Output = Result<(), EngineError>> + Send + 'static,
    {
        let added = self.queue.add(kind, work(Arc::clone(self)).boxed());
        if !added {
            debug!("[CardSync] Task {} not queued", kind);
        }
        added
    }
}
