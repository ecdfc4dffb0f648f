//! Request types for the notification service API.
//!
//! Response bodies are the domain shapes from `cardsync_core::sync`
//! (`NotificationsResponse`, `OptInResponse`) and are re-exported here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use cardsync_core::sync::{NotificationsResponse, OptInResponse};

/// Query of `GET /notifications`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationsQuery {
    pub time_zone_offset_ms: i64,
    /// Groups whose poll deadline passed; may be empty.
    pub request_types: Vec<String>,
    pub ui_locale: String,
}

/// Parameters of `DELETE /notifications/<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DismissalRequest {
    /// Server notification id.
    pub notification_id: String,
    pub chrome_notification_id: String,
    /// Milliseconds since the user dismissed the card.
    pub age_ms: i64,
    /// Extra parameters from the card's dismissal descriptor.
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl NotificationsQuery {
    pub(crate) fn to_query_string(&self) -> String {
        let mut query = format!("timeZoneOffsetMs={}", self.time_zone_offset_ms);
        for group in &self.request_types {
            query.push_str("&requestTypes=");
            query.push_str(&urlencoding::encode(group));
        }
        query.push_str("&uiLocale=");
        query.push_str(&urlencoding::encode(&self.ui_locale));
        query
    }
}

impl DismissalRequest {
    pub(crate) fn to_path_and_query(&self) -> String {
        let mut path = format!(
            "notifications/{}?age={}&chromeNotificationId={}",
            urlencoding::encode(&self.notification_id),
            self.age_ms,
            urlencoding::encode(&self.chrome_notification_id)
        );
        for (name, value) in &self.parameters {
            path.push('&');
            path.push_str(&urlencoding::encode(name));
            path.push('=');
            path.push_str(&urlencoding::encode(value));
        }
        path
    }
}
