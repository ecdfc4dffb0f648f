//! Merges server responses into the stored group map.

use log::{debug, warn};

use super::model::{NotificationGroups, NotificationsResponse, RecentDismissals};
use super::scheduler::{offset_ms, MINIMUM_POLLING_PERIOD_SECONDS};
use crate::errors::{Error, Result};

/// Result of a successful merge, ready to be persisted and rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOutcome {
    pub groups: NotificationGroups,
    pub recent_dismissals: RecentDismissals,
    /// Delay until the next card poll, floored at `MINIMUM_POLLING_PERIOD_SECONDS`.
    pub next_poll_delay_secs: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerUpdate {
    /// The server turned the feature off; local state must be wiped by the caller.
    FeatureDisabled,
    Updated(ReconcileOutcome),
}

/// Names of stored groups whose poll deadline has passed.
pub fn groups_to_request(groups: &NotificationGroups, now: i64) -> Vec<String> {
    groups
        .iter()
        .filter(|(_, group)| group.next_poll_time.is_some_and(|time| time <= now))
        .map(|(name, _)| name.clone())
        .collect()
}

/// Earliest poll deadline across all groups.
pub fn next_poll_time(groups: &NotificationGroups) -> Option<i64> {
    groups.values().filter_map(|group| group.next_poll_time).min()
}

/// Seconds until the next poll: `max(min_deadline - now, MINIMUM_POLLING_PERIOD_SECONDS)`.
pub fn next_poll_delay_seconds(groups: &NotificationGroups, now: i64) -> Result<u64> {
    let deadline = next_poll_time(groups)
        .ok_or_else(|| Error::invariant("no group carries a next poll time"))?;
    let remaining_ms = deadline.saturating_sub(now).max(0) as u64;
    let remaining_secs = remaining_ms.div_ceil(1000);
    if remaining_secs < MINIMUM_POLLING_PERIOD_SECONDS {
        debug!(
            "[CardSync] Server poll hint of {}s raised to the {}s floor",
            remaining_secs, MINIMUM_POLLING_PERIOD_SECONDS
        );
    }
    Ok(remaining_secs.max(MINIMUM_POLLING_PERIOD_SECONDS))
}

/// Merge a notifications response into the stored groups.
///
/// Only groups present in the response survive. A group with a fresh card
/// list (cards received or `requested`) gets cards, timestamp and rank
/// replaced and its deadline cleared; `nextPollSeconds` then sets the
/// deadline. Cards whose server id is in a non-expired recent dismissal are
/// dropped.
pub fn process_server_response(
    response: NotificationsResponse,
    stored_groups: &NotificationGroups,
    recent_dismissals: &RecentDismissals,
    now: i64,
) -> Result<ServerUpdate> {
    if response.google_now_disabled {
        return Ok(ServerUpdate::FeatureDisabled);
    }

    let recent_dismissals = recent_dismissals.retained(now);

    let mut received_cards: std::collections::BTreeMap<String, Vec<_>> = Default::default();
    for card in response.notifications {
        if recent_dismissals.contains_active(&card.notification_id, now) {
            debug!(
                "[CardSync] Skipping recently dismissed card {}",
                card.notification_id
            );
            continue;
        }
        if !response.groups.contains_key(&card.group_name) {
            warn!(
                "[CardSync] Card {} names unknown group '{}'",
                card.notification_id, card.group_name
            );
            continue;
        }
        received_cards
            .entry(card.group_name.clone())
            .or_default()
            .push(card);
    }

    let mut updated_groups = NotificationGroups::new();
    for (name, received) in response.groups {
        let mut group = stored_groups
            .get(&name)
            .cloned()
            .unwrap_or_default();

        let fresh_cards = match received_cards.remove(&name) {
            Some(cards) => Some(cards),
            None if received.requested => Some(Vec::new()),
            None => None,
        };

        if let Some(cards) = fresh_cards {
            group.cards = cards;
            group.cards_timestamp = Some(now);
            group.rank = received.rank;
            group.next_poll_time = None;
        }

        if let Some(seconds) = received.next_poll_seconds {
            group.next_poll_time = Some(offset_ms(now, seconds));
        }

        updated_groups.insert(name, group);
    }

    let next_poll_delay_secs = next_poll_delay_seconds(&updated_groups, now)?;

    Ok(ServerUpdate::Updated(ReconcileOutcome {
        groups: updated_groups,
        recent_dismissals,
        next_poll_delay_secs,
    }))
}
