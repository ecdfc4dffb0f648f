//! Combines stored groups into renderable notifications.
//!
//! Several cards may share one client notification id; they form a
//! [`CombinedCard`] and only the highest-ranked visible one is displayed.

use std::collections::{BTreeMap, HashSet};

use super::model::{NotificationGroups, PendingDismissal, ReceivedNotification};
use super::scheduler::offset_ms;

/// One card placed on the absolute timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct UncombinedNotification {
    pub received_notification: ReceivedNotification,
    pub show_time: Option<i64>,
    pub hide_time: i64,
}

impl UncombinedNotification {
    pub fn is_visible(&self, now: i64) -> bool {
        self.show_time.map_or(true, |show| show <= now) && now < self.hide_time
    }
}

pub type CombinedCard = Vec<UncombinedNotification>;

/// Groups cards of all groups by client notification id.
///
/// Groups without `cards_timestamp` contribute nothing; their cards have no
/// reference point for the trigger offsets.
pub fn combine_groups(groups: &NotificationGroups) -> BTreeMap<String, CombinedCard> {
    let mut combined: BTreeMap<String, CombinedCard> = BTreeMap::new();
    for group in groups.values() {
        let Some(timestamp) = group.cards_timestamp else {
            continue;
        };
        for card in &group.cards {
            let show_time = card
                .trigger
                .show_time_sec
                .map(|seconds| offset_ms(timestamp, seconds));
            let hide_time = offset_ms(timestamp, card.trigger.hide_time_sec);
            combined
                .entry(card.chrome_notification_id.clone())
                .or_default()
                .push(UncombinedNotification {
                    received_notification: card.clone(),
                    show_time,
                    hide_time,
                });
        }
    }
    combined
}

/// The visible component with the highest group rank, if any.
pub fn card_to_show<'a>(
    card: &'a CombinedCard,
    groups: &NotificationGroups,
    now: i64,
) -> Option<&'a ReceivedNotification> {
    let mut best: Option<(&ReceivedNotification, i64)> = None;
    for component in card.iter().filter(|component| component.is_visible(now)) {
        let notification = &component.received_notification;
        let rank = groups
            .get(&notification.group_name)
            .and_then(|group| group.rank)
            .unwrap_or(i64::MIN);
        if best.map_or(true, |(_, best_rank)| rank > best_rank) {
            best = Some((notification, rank));
        }
    }
    best.map(|(notification, _)| notification)
}

/// Earliest show or hide edge strictly after `now`.
pub fn next_update_time(card: &CombinedCard, now: i64) -> Option<i64> {
    card.iter()
        .flat_map(|component| [component.show_time, Some(component.hide_time)])
        .flatten()
        .filter(|time| *time > now)
        .min()
}

/// Pending dismissals for every component visible at `now`.
pub fn dismissals_for(
    card: &CombinedCard,
    chrome_notification_id: &str,
    now: i64,
) -> Vec<PendingDismissal> {
    card.iter()
        .filter(|component| component.is_visible(now))
        .map(|component| PendingDismissal {
            chrome_notification_id: chrome_notification_id.to_string(),
            time: now,
            dismissal_data: component.received_notification.dismissal_data(),
        })
        .collect()
}

/// Drops the dismissed cards from their groups.
pub fn remove_dismissed(groups: &mut NotificationGroups, dismissals: &[PendingDismissal]) {
    let dismissed: HashSet<&str> = dismissals
        .iter()
        .map(|dismissal| dismissal.dismissal_data.notification_id.as_str())
        .collect();
    for group in groups.values_mut() {
        group
            .cards
            .retain(|card| !dismissed.contains(card.notification_id.as_str()));
    }
}
