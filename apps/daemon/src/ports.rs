//! Host-side ports for running the engine as a standalone daemon.

use async_trait::async_trait;
use log::{info, warn};
use std::collections::BTreeMap;
use tokio::sync::{Mutex, RwLock};

use cardsync_client::{AuthProvider, NotificationSink, PlatformSignals};
use cardsync_core::sync::ReceivedNotification;

/// Auth from a configured access token. A token the server rejects is
/// dropped, which signs the daemon out until it is restarted with a new one.
pub struct StaticTokenAuth {
    token: RwLock<Option<String>>,
}

impl StaticTokenAuth {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: RwLock::new(token),
        }
    }
}

#[async_trait]
impl AuthProvider for StaticTokenAuth {
    async fn is_signed_in(&self) -> bool {
        self.token.read().await.is_some()
    }

    async fn get_auth_token(&self) -> Result<String, String> {
        self.token
            .read()
            .await
            .clone()
            .ok_or_else(|| "No access token configured".to_string())
    }

    async fn remove_token(&self, token: &str) {
        let mut current = self.token.write().await;
        if current.as_deref() == Some(token) {
            warn!("[CardSync] Access token rejected; set CARDSYNC_ACCESS_TOKEN and restart");
            *current = None;
        }
    }
}

/// Prints notifications to the log instead of a desktop surface.
#[derive(Default)]
pub struct LoggingNotificationSink {
    displayed: Mutex<BTreeMap<String, Option<i64>>>,
}

#[async_trait]
impl NotificationSink for LoggingNotificationSink {
    async fn show(
        &self,
        chrome_notification_id: &str,
        card: &ReceivedNotification,
    ) -> Result<(), String> {
        let mut displayed = self.displayed.lock().await;
        if displayed.get(chrome_notification_id) == Some(&card.version) {
            return Ok(());
        }
        let body = card
            .notification
            .as_ref()
            .map(|payload| payload.to_string())
            .unwrap_or_default();
        info!(
            "[CardSync] Notification {} (group {}): {}",
            chrome_notification_id, card.group_name, body
        );
        displayed.insert(chrome_notification_id.to_string(), card.version);
        Ok(())
    }

    async fn clear(&self, chrome_notification_id: &str) -> Result<(), String> {
        if self
            .displayed
            .lock()
            .await
            .remove(chrome_notification_id)
            .is_some()
        {
            info!("[CardSync] Notification {} cleared", chrome_notification_id);
        }
        Ok(())
    }

    async fn displayed_ids(&self) -> Result<Vec<String>, String> {
        Ok(self.displayed.lock().await.keys().cloned().collect())
    }
}

/// Platform signals fixed by configuration.
pub struct StaticPlatformSignals {
    notifications_permitted: bool,
    background_permitted: bool,
}

impl StaticPlatformSignals {
    pub fn new(notifications_permitted: bool, background_permitted: bool) -> Self {
        Self {
            notifications_permitted,
            background_permitted,
        }
    }
}

#[async_trait]
impl PlatformSignals for StaticPlatformSignals {
    async fn notifications_permitted(&self) -> bool {
        self.notifications_permitted
    }

    async fn background_permitted(&self) -> bool {
        self.background_permitted
    }

    async fn set_background_mode(&self, enabled: bool) {
        info!("[CardSync] Background mode {}", if enabled { "on" } else { "off" });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardsync_core::sync::Trigger;

    fn card(version: i64) -> ReceivedNotification {
        ReceivedNotification {
            notification_id: "n1".to_string(),
            group_name: "weather".to_string(),
            chrome_notification_id: "c1".to_string(),
            trigger: Trigger {
                show_time_sec: None,
                hide_time_sec: 60,
            },
            version: Some(version),
            notification: Some(serde_json::json!({ "title": "Rain" })),
            action_urls: None,
            dismissal: Default::default(),
        }
    }

    #[tokio::test]
    async fn rejected_token_signs_out() {
        let auth = StaticTokenAuth::new(Some("t1".to_string()));
        assert!(auth.is_signed_in().await);

        auth.remove_token("other").await;
        assert!(auth.is_signed_in().await);

        auth.remove_token("t1").await;
        assert!(!auth.is_signed_in().await);
        assert!(auth.get_auth_token().await.is_err());
    }

    #[tokio::test]
    async fn sink_tracks_displayed_notifications() {
        let sink = LoggingNotificationSink::default();

        sink.show("c1", &card(1)).await.unwrap();
        sink.show("c1", &card(2)).await.unwrap();
        assert_eq!(sink.displayed_ids().await.unwrap(), vec!["c1".to_string()]);

        sink.clear("c1").await.unwrap();
        assert!(sink.displayed_ids().await.unwrap().is_empty());
    }
}
