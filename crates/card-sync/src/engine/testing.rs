//! Port fakes shared by the engine tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cardsync_core::store::{MemoryKeyValueStore, StateUpdate, SyncStateStore};
use cardsync_core::sync::{NotificationGroup, PollingState, ReceivedNotification, Trigger};

use super::{
    AuthProvider, Clock, EngineConfig, EnginePorts, NotificationSink, PlatformSignals,
    RemoteServiceClient, SyncEngine, TransportError,
};
use crate::error::ApiRetryClass;
use crate::types::{DismissalRequest, NotificationsQuery, NotificationsResponse};

pub(crate) const NOW: i64 = 1_700_000_000_000;
pub(crate) const TOKEN: &str = "token-1";

pub(crate) fn status_error(status: u16) -> TransportError {
    let retry_class = match status {
        401 | 403 => ApiRetryClass::ReauthRequired,
        400 | 405 => ApiRetryClass::Permanent,
        _ => ApiRetryClass::Retryable,
    };
    TransportError::new(format!("status {}", status), Some(status), retry_class)
}

pub(crate) fn card(notification_id: &str, group: &str, chrome_id: &str) -> ReceivedNotification {
    ReceivedNotification {
        notification_id: notification_id.to_string(),
        group_name: group.to_string(),
        chrome_notification_id: chrome_id.to_string(),
        trigger: Trigger {
            show_time_sec: None,
            hide_time_sec: 3600,
        },
        version: Some(1),
        notification: Some(serde_json::json!({ "title": notification_id })),
        action_urls: None,
        dismissal: BTreeMap::new(),
    }
}

pub(crate) fn group_with(
    cards: Vec<ReceivedNotification>,
    timestamp: i64,
    rank: i64,
) -> NotificationGroup {
    NotificationGroup {
        cards,
        cards_timestamp: Some(timestamp),
        next_poll_time: None,
        rank: Some(rank),
    }
}

#[derive(Debug, Clone)]
pub(crate) enum RemoteCall {
    GetNotifications(NotificationsQuery),
    GetOptIn,
    Delete(DismissalRequest),
}

/// Scripted server. Unscripted card and opt-in requests fail with 503;
/// unscripted dismissals succeed.
#[derive(Default)]
pub(crate) struct FakeRemote {
    notifications: Mutex<VecDeque<Result<NotificationsResponse, TransportError>>>,
    opt_in: Mutex<VecDeque<Result<bool, TransportError>>>,
    deletes: Mutex<VecDeque<Result<(), TransportError>>>,
    calls: Mutex<Vec<RemoteCall>>,
}

impl FakeRemote {
    pub(crate) fn push_notifications(&self, result: Result<NotificationsResponse, TransportError>) {
        self.notifications.lock().unwrap().push_back(result);
    }

    pub(crate) fn push_opt_in(&self, result: Result<bool, TransportError>) {
        self.opt_in.lock().unwrap().push_back(result);
    }

    pub(crate) fn push_delete(&self, result: Result<(), TransportError>) {
        self.deletes.lock().unwrap().push_back(result);
    }

    pub(crate) fn call_order(&self) -> Vec<&'static str> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|call| match call {
                RemoteCall::GetNotifications(_) => "get_notifications",
                RemoteCall::GetOptIn => "get_opt_in",
                RemoteCall::Delete(_) => "delete",
            })
            .collect()
    }

    pub(crate) fn notification_queries(&self) -> Vec<NotificationsQuery> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|call| match call {
                RemoteCall::GetNotifications(query) => Some(query.clone()),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn deletes(&self) -> Vec<DismissalRequest> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|call| match call {
                RemoteCall::Delete(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl RemoteServiceClient for FakeRemote {
    async fn get_notifications(
        &self,
        _token: &str,
        query: NotificationsQuery,
    ) -> Result<NotificationsResponse, TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push(RemoteCall::GetNotifications(query));
        self.notifications
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(status_error(503)))
    }

    async fn get_opt_in(&self, _token: &str) -> Result<bool, TransportError> {
        self.calls.lock().unwrap().push(RemoteCall::GetOptIn);
        self.opt_in
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(status_error(503)))
    }

    async fn delete_notification(
        &self,
        _token: &str,
        request: DismissalRequest,
    ) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push(RemoteCall::Delete(request));
        self.deletes.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

pub(crate) struct FakeAuth {
    signed_in: AtomicBool,
    removed: Mutex<Vec<String>>,
}

impl FakeAuth {
    pub(crate) fn set_signed_in(&self, signed_in: bool) {
        self.signed_in.store(signed_in, Ordering::SeqCst);
    }

    pub(crate) fn removed(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuthProvider for FakeAuth {
    async fn is_signed_in(&self) -> bool {
        self.signed_in.load(Ordering::SeqCst)
    }

    async fn get_auth_token(&self) -> Result<String, String> {
        if self.signed_in.load(Ordering::SeqCst) {
            Ok(TOKEN.to_string())
        } else {
            Err("signed out".to_string())
        }
    }

    async fn remove_token(&self, token: &str) {
        self.removed.lock().unwrap().push(token.to_string());
    }
}

#[derive(Default)]
pub(crate) struct FakeSink {
    displayed: Mutex<BTreeSet<String>>,
    shown: Mutex<Vec<String>>,
    cleared: Mutex<Vec<String>>,
}

impl FakeSink {
    pub(crate) fn preload(&self, id: &str) {
        self.displayed.lock().unwrap().insert(id.to_string());
    }

    pub(crate) fn shown_ids(&self) -> Vec<String> {
        self.shown.lock().unwrap().clone()
    }

    pub(crate) fn cleared(&self) -> Vec<String> {
        self.cleared.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for FakeSink {
    async fn show(
        &self,
        chrome_notification_id: &str,
        _card: &ReceivedNotification,
    ) -> Result<(), String> {
        self.displayed
            .lock()
            .unwrap()
            .insert(chrome_notification_id.to_string());
        self.shown
            .lock()
            .unwrap()
            .push(chrome_notification_id.to_string());
        Ok(())
    }

    async fn clear(&self, chrome_notification_id: &str) -> Result<(), String> {
        self.displayed.lock().unwrap().remove(chrome_notification_id);
        self.cleared
            .lock()
            .unwrap()
            .push(chrome_notification_id.to_string());
        Ok(())
    }

    async fn displayed_ids(&self) -> Result<Vec<String>, String> {
        Ok(self.displayed.lock().unwrap().iter().cloned().collect())
    }
}

pub(crate) struct FakeSignals {
    notifications_permitted: AtomicBool,
    background_permitted: AtomicBool,
    background_mode: Mutex<Option<bool>>,
}

impl FakeSignals {
    pub(crate) fn set_notifications_permitted(&self, permitted: bool) {
        self.notifications_permitted.store(permitted, Ordering::SeqCst);
    }

    pub(crate) fn set_background_permitted(&self, permitted: bool) {
        self.background_permitted.store(permitted, Ordering::SeqCst);
    }

    pub(crate) fn background_mode(&self) -> Option<bool> {
        *self.background_mode.lock().unwrap()
    }
}

#[async_trait]
impl PlatformSignals for FakeSignals {
    async fn notifications_permitted(&self) -> bool {
        self.notifications_permitted.load(Ordering::SeqCst)
    }

    async fn background_permitted(&self) -> bool {
        self.background_permitted.load(Ordering::SeqCst)
    }

    async fn set_background_mode(&self, enabled: bool) {
        *self.background_mode.lock().unwrap() = Some(enabled);
    }
}

pub(crate) struct FakeClock(AtomicI64);

impl FakeClock {
    pub(crate) fn set(&self, now: i64) {
        self.0.store(now, Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

pub(crate) struct Harness {
    pub engine: Arc<SyncEngine>,
    pub state: SyncStateStore,
    pub remote: Arc<FakeRemote>,
    pub auth: Arc<FakeAuth>,
    pub sink: Arc<FakeSink>,
    pub signals: Arc<FakeSignals>,
    pub clock: Arc<FakeClock>,
}

/// Signed in with permissions granted; the opt-in flag is not stored yet.
pub(crate) fn harness() -> Harness {
    let store = Arc::new(MemoryKeyValueStore::new());
    let remote = Arc::new(FakeRemote::default());
    let auth = Arc::new(FakeAuth {
        signed_in: AtomicBool::new(true),
        removed: Mutex::new(Vec::new()),
    });
    let sink = Arc::new(FakeSink::default());
    let signals = Arc::new(FakeSignals {
        notifications_permitted: AtomicBool::new(true),
        background_permitted: AtomicBool::new(true),
        background_mode: Mutex::new(None),
    });
    let clock = Arc::new(FakeClock(AtomicI64::new(NOW)));

    let config = EngineConfig {
        ui_locale: "en-US".to_string(),
        time_zone_offset_ms: 3_600_000,
        ..EngineConfig::default()
    };
    let ports = EnginePorts {
        store: store.clone(),
        remote: remote.clone(),
        auth: auth.clone(),
        sink: sink.clone(),
        signals: signals.clone(),
        clock: clock.clone(),
    };

    Harness {
        engine: SyncEngine::new(config, ports),
        state: SyncStateStore::new(store),
        remote,
        auth,
        sink,
        signals,
        clock,
    }
}

impl Harness {
    pub(crate) async fn save(&self, update: StateUpdate) {
        self.state.save(update).await.unwrap();
    }

    pub(crate) async fn enable_everything(&self) {
        self.auth.set_signed_in(true);
        self.signals.set_notifications_permitted(true);
        self.signals.set_background_permitted(true);
        self.save(StateUpdate::new().google_now_enabled(true)).await;
    }
}

/// Waits until the engine reaches `expected`, failing after two seconds.
pub(crate) async fn wait_for_state(h: &Harness, expected: PollingState) {
    let reached = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            h.engine.idle().await;
            if h.engine.polling_state().await == expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "engine never reached {:?}", expected);
}
