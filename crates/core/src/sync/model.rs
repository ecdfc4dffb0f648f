//! Card sync domain models and server wire shapes.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::scheduler::DISMISS_RETENTION_TIME_MS;

/// Stored groups keyed by group name.
pub type NotificationGroups = BTreeMap<String, NotificationGroup>;

/// Show/hide offsets of a card, in seconds relative to its group's `cards_timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_time_sec: Option<i64>,
    pub hide_time_sec: i64,
}

/// A card as sent by the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedNotification {
    /// Server-assigned identifier, used for dismissal requests.
    pub notification_id: String,
    pub group_name: String,
    /// Client-facing identifier; cards sharing it are shown as one notification.
    pub chrome_notification_id: String,
    pub trigger: Trigger,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    /// Opaque render payload handed to the notification sink.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_urls: Option<serde_json::Value>,
    /// Extra query parameters to send with the dismissal request.
    #[serde(default)]
    pub dismissal: BTreeMap<String, String>,
}

impl ReceivedNotification {
    pub fn dismissal_data(&self) -> DismissalData {
        DismissalData {
            notification_id: self.notification_id.clone(),
            parameters: self.dismissal.clone(),
        }
    }
}

/// A named bucket of cards with its own refresh cadence.
///
/// When `cards` is non-empty, `cards_timestamp` and `rank` are set. A group
/// without `next_poll_time` is never polled automatically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationGroup {
    #[serde(default)]
    pub cards: Vec<ReceivedNotification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cards_timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_poll_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<i64>,
}

/// Server descriptor needed to acknowledge a dismissal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DismissalData {
    pub notification_id: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

/// A local dismissal the server has not acknowledged yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingDismissal {
    pub chrome_notification_id: String,
    /// Dismissal time in epoch milliseconds.
    pub time: i64,
    pub dismissal_data: DismissalData,
}

impl PendingDismissal {
    pub fn age_ms(&self, now: i64) -> i64 {
        now - self.time
    }
}

/// Server notification ids dismissed recently, with their dismissal time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecentDismissals(HashMap<String, i64>);

impl RecentDismissals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, notification_id: impl Into<String>, time: i64) {
        self.0.insert(notification_id.into(), time);
    }

    /// True when `notification_id` was dismissed less than the retention window ago.
    pub fn contains_active(&self, notification_id: &str, now: i64) -> bool {
        self.0
            .get(notification_id)
            .is_some_and(|time| now - time < DISMISS_RETENTION_TIME_MS)
    }

    /// Copy holding only entries still inside the retention window.
    pub fn retained(&self, now: i64) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(_, time)| now - **time < DISMISS_RETENTION_TIME_MS)
                .map(|(id, time)| (id.clone(), *time))
                .collect(),
        )
    }

    pub fn get(&self, notification_id: &str) -> Option<i64> {
        self.0.get(notification_id).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Per-group section of a notifications response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_poll_seconds: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<i64>,
    /// The group was asked for, so its card list is authoritative even when empty.
    #[serde(default)]
    pub requested: bool,
}

/// Body of `GET /notifications`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationsResponse {
    #[serde(default)]
    pub google_now_disabled: bool,
    #[serde(default)]
    pub groups: BTreeMap<String, ReceivedGroup>,
    #[serde(default)]
    pub notifications: Vec<ReceivedNotification>,
}

/// Body of `GET /settings/optin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptInResponse {
    pub value: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifications_response_parses_wire_shape() {
        let body = r#"{
            "groups": {"A": {"nextPollSeconds": 300, "requested": true}},
            "notifications": [{
                "notificationId": "n1",
                "groupName": "A",
                "chromeNotificationId": "c1",
                "trigger": {"hideTimeSec": 60},
                "dismissal": {"token": "abc"}
            }]
        }"#;

        let response: NotificationsResponse = serde_json::from_str(body).unwrap();

        assert!(!response.google_now_disabled);
        assert_eq!(response.groups["A"].next_poll_seconds, Some(300));
        assert!(response.groups["A"].requested);
        let card = &response.notifications[0];
        assert_eq!(card.trigger.show_time_sec, None);
        assert_eq!(card.trigger.hide_time_sec, 60);
        assert_eq!(card.dismissal_data().parameters["token"], "abc");
    }

    #[test]
    fn recent_dismissals_expire_after_retention_window() {
        let mut recent = RecentDismissals::new();
        recent.record("n1", 1_000);

        assert!(recent.contains_active("n1", 1_000 + DISMISS_RETENTION_TIME_MS - 1));
        assert!(!recent.contains_active("n1", 1_000 + DISMISS_RETENTION_TIME_MS));
        assert!(recent.retained(1_000 + DISMISS_RETENTION_TIME_MS).is_empty());
    }
}
