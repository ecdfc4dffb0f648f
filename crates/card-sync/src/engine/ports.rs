use async_trait::async_trait;
use std::sync::Arc;

use cardsync_core::sync::ReceivedNotification;

use crate::error::{ApiRetryClass, SyncError};
use crate::types::{DismissalRequest, NotificationsQuery, NotificationsResponse};

#[derive(Debug, Clone)]
pub struct TransportError {
    pub message: String,
    pub status: Option<u16>,
    pub retry_class: ApiRetryClass,
}

impl TransportError {
    pub fn new(message: impl Into<String>, status: Option<u16>, retry_class: ApiRetryClass) -> Self {
        Self {
            message: message.into(),
            status,
            retry_class,
        }
    }

    pub fn requires_reauth(&self) -> bool {
        self.retry_class == ApiRetryClass::ReauthRequired
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TransportError {}

impl From<SyncError> for TransportError {
    fn from(err: SyncError) -> Self {
        Self {
            message: err.to_string(),
            status: err.status_code(),
            retry_class: err.retry_class(),
        }
    }
}

#[async_trait]
pub trait RemoteServiceClient: Send + Sync {
    async fn get_notifications(
        &self,
        token: &str,
        query: NotificationsQuery,
    ) -> Result<NotificationsResponse, TransportError>;
    async fn get_opt_in(&self, token: &str) -> Result<bool, TransportError>;
    /// Succeeds only when the server acknowledged the dismissal.
    async fn delete_notification(
        &self,
        token: &str,
        request: DismissalRequest,
    ) -> Result<(), TransportError>;
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn is_signed_in(&self) -> bool;
    async fn get_auth_token(&self) -> Result<String, String>;
    /// Drops a token the server refused so the next call fetches a new one.
    async fn remove_token(&self, token: &str);
}

/// Platform notification surface, keyed by client notification id.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Create or update the notification.
    async fn show(
        &self,
        chrome_notification_id: &str,
        card: &ReceivedNotification,
    ) -> Result<(), String>;
    async fn clear(&self, chrome_notification_id: &str) -> Result<(), String>;
    async fn displayed_ids(&self) -> Result<Vec<String>, String>;
}

#[async_trait]
pub trait PlatformSignals: Send + Sync {
    async fn notifications_permitted(&self) -> bool;
    async fn background_permitted(&self) -> bool;
    /// Request or release long-lived background execution.
    async fn set_background_mode(&self, enabled: bool);
}

pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Collaborators injected into the sync engine.
#[derive(Clone)]
pub struct EnginePorts {
    pub store: Arc<dyn cardsync_core::store::KeyValueStore>,
    pub remote: Arc<dyn RemoteServiceClient>,
    pub auth: Arc<dyn AuthProvider>,
    pub sink: Arc<dyn NotificationSink>,
    pub signals: Arc<dyn PlatformSignals>,
    pub clock: Arc<dyn Clock>,
}
