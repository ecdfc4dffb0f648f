//! Persisted sync state and the key-value store port behind it.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::errors::Result;
use crate::sync::{NotificationGroups, PendingDismissal, RecentDismissals};

/// Keys of the persisted sync state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKey {
    NotificationGroups,
    PendingDismissals,
    RecentDismissals,
    GoogleNowEnabled,
    LastPollNowPayloads,
}

impl StateKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateKey::NotificationGroups => "notificationGroups",
            StateKey::PendingDismissals => "pendingDismissals",
            StateKey::RecentDismissals => "recentDismissals",
            StateKey::GoogleNowEnabled => "googleNowEnabled",
            StateKey::LastPollNowPayloads => "lastPollNowPayloads",
        }
    }
}

/// String key-value store holding JSON-encoded values.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    /// Writes all entries atomically.
    async fn set_many(&self, entries: Vec<(String, String)>) -> Result<()>;
    async fn remove(&self, keys: Vec<String>) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// In-process store, used by tests and hosts without durable storage.
#[derive(Debug, Default, Clone)]
pub struct MemoryKeyValueStore {
    entries: Arc<RwLock<BTreeMap<String, String>>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set_many(&self, entries: Vec<(String, String)>) -> Result<()> {
        let mut guard = self.entries.write().await;
        guard.extend(entries);
        Ok(())
    }

    async fn remove(&self, keys: Vec<String>) -> Result<()> {
        let mut guard = self.entries.write().await;
        for key in keys {
            guard.remove(&key);
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().await.clear();
        Ok(())
    }
}

/// Snapshot of everything the sync engine persists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncState {
    pub notification_groups: NotificationGroups,
    pub pending_dismissals: Vec<PendingDismissal>,
    pub recent_dismissals: RecentDismissals,
    pub google_now_enabled: bool,
    /// Last push payload seen per push tag.
    pub last_poll_now_payloads: HashMap<String, String>,
}

impl SyncState {
    /// True when anything that only polling may keep is still stored.
    pub fn has_cached_cards(&self) -> bool {
        !self.notification_groups.is_empty()
            || !self.pending_dismissals.is_empty()
            || !self.recent_dismissals.is_empty()
            || !self.last_poll_now_payloads.is_empty()
    }
}

/// Partial write; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub notification_groups: Option<NotificationGroups>,
    pub pending_dismissals: Option<Vec<PendingDismissal>>,
    pub recent_dismissals: Option<RecentDismissals>,
    pub google_now_enabled: Option<bool>,
    pub last_poll_now_payloads: Option<HashMap<String, String>>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn groups(mut self, groups: NotificationGroups) -> Self {
        self.notification_groups = Some(groups);
        self
    }

    pub fn pending_dismissals(mut self, pending: Vec<PendingDismissal>) -> Self {
        self.pending_dismissals = Some(pending);
        self
    }

    pub fn recent_dismissals(mut self, recent: RecentDismissals) -> Self {
        self.recent_dismissals = Some(recent);
        self
    }

    pub fn google_now_enabled(mut self, enabled: bool) -> Self {
        self.google_now_enabled = Some(enabled);
        self
    }

    pub fn last_poll_now_payloads(mut self, payloads: HashMap<String, String>) -> Self {
        self.last_poll_now_payloads = Some(payloads);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.notification_groups.is_none()
            && self.pending_dismissals.is_none()
            && self.recent_dismissals.is_none()
            && self.google_now_enabled.is_none()
            && self.last_poll_now_payloads.is_none()
    }
}

fn encode<T: Serialize>(key: StateKey, value: &T) -> Result<(String, String)> {
    Ok((key.as_str().to_string(), serde_json::to_string(value)?))
}

/// Typed access to [`SyncState`] over a [`KeyValueStore`].
#[derive(Clone)]
pub struct SyncStateStore {
    inner: Arc<dyn KeyValueStore>,
}

impl SyncStateStore {
    pub fn new(inner: Arc<dyn KeyValueStore>) -> Self {
        Self { inner }
    }

    async fn read<T: DeserializeOwned + Default>(&self, key: StateKey) -> Result<T> {
        match self.inner.get(key.as_str()).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(T::default()),
        }
    }

    pub async fn load(&self) -> Result<SyncState> {
        Ok(SyncState {
            notification_groups: self.notification_groups().await?,
            pending_dismissals: self.pending_dismissals().await?,
            recent_dismissals: self.recent_dismissals().await?,
            google_now_enabled: self.google_now_enabled().await?,
            last_poll_now_payloads: self.last_poll_now_payloads().await?,
        })
    }

    pub async fn notification_groups(&self) -> Result<NotificationGroups> {
        self.read(StateKey::NotificationGroups).await
    }

    pub async fn pending_dismissals(&self) -> Result<Vec<PendingDismissal>> {
        self.read(StateKey::PendingDismissals).await
    }

    pub async fn recent_dismissals(&self) -> Result<RecentDismissals> {
        self.read(StateKey::RecentDismissals).await
    }

    pub async fn google_now_enabled(&self) -> Result<bool> {
        self.read(StateKey::GoogleNowEnabled).await
    }

    pub async fn last_poll_now_payloads(&self) -> Result<HashMap<String, String>> {
        self.read(StateKey::LastPollNowPayloads).await
    }

    pub async fn save(&self, update: StateUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }
        let mut entries = Vec::new();
        if let Some(groups) = &update.notification_groups {
            entries.push(encode(StateKey::NotificationGroups, groups)?);
        }
        if let Some(pending) = &update.pending_dismissals {
            entries.push(encode(StateKey::PendingDismissals, pending)?);
        }
        if let Some(recent) = &update.recent_dismissals {
            entries.push(encode(StateKey::RecentDismissals, recent)?);
        }
        if let Some(enabled) = &update.google_now_enabled {
            entries.push(encode(StateKey::GoogleNowEnabled, enabled)?);
        }
        if let Some(payloads) = &update.last_poll_now_payloads {
            entries.push(encode(StateKey::LastPollNowPayloads, payloads)?);
        }
        self.inner.set_many(entries).await
    }

    /// Wipes cached cards, dismissals and push payloads; keeps the opt-in flag.
    pub async fn clear_cached_cards(&self) -> Result<()> {
        self.inner
            .remove(
                [
                    StateKey::NotificationGroups,
                    StateKey::PendingDismissals,
                    StateKey::RecentDismissals,
                    StateKey::LastPollNowPayloads,
                ]
                .iter()
                .map(|key| key.as_str().to_string())
                .collect(),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{DismissalData, NotificationGroup};

    fn store() -> (MemoryKeyValueStore, SyncStateStore) {
        let memory = MemoryKeyValueStore::new();
        let state = SyncStateStore::new(Arc::new(memory.clone()));
        (memory, state)
    }

    #[tokio::test]
    async fn missing_keys_load_as_defaults() {
        let (_, state) = store();

        let loaded = state.load().await.unwrap();

        assert_eq!(loaded, SyncState::default());
    }

    #[tokio::test]
    async fn partial_update_only_touches_given_keys() {
        let (memory, state) = store();
        let mut groups = NotificationGroups::new();
        groups.insert("A".to_string(), NotificationGroup::default());

        state
            .save(StateUpdate::new().groups(groups.clone()).google_now_enabled(true))
            .await
            .unwrap();

        assert_eq!(memory.len().await, 2);
        assert_eq!(
            memory.get("googleNowEnabled").await.unwrap().as_deref(),
            Some("true")
        );
        let loaded = state.load().await.unwrap();
        assert_eq!(loaded.notification_groups, groups);
        assert!(loaded.google_now_enabled);
        assert!(loaded.pending_dismissals.is_empty());
    }

    #[tokio::test]
    async fn clearing_cached_cards_keeps_opt_in_flag() {
        let (_, state) = store();
        let pending = vec![PendingDismissal {
            chrome_notification_id: "c1".to_string(),
            time: 1,
            dismissal_data: DismissalData {
                notification_id: "n1".to_string(),
                parameters: Default::default(),
            },
        }];
        let mut recent = RecentDismissals::new();
        recent.record("n0", 1);
        state
            .save(
                StateUpdate::new()
                    .pending_dismissals(pending)
                    .recent_dismissals(recent)
                    .google_now_enabled(true),
            )
            .await
            .unwrap();

        state.clear_cached_cards().await.unwrap();

        let loaded = state.load().await.unwrap();
        assert!(loaded.pending_dismissals.is_empty());
        assert!(loaded.recent_dismissals.is_empty());
        assert!(loaded.google_now_enabled);
    }
}
