//! Running-state decision derived from external signals.

use serde::{Deserialize, Serialize};

/// The four independent inputs of the running-state decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningSignals {
    pub signed_in: bool,
    pub background_permitted: bool,
    pub notifications_permitted: bool,
    pub feature_enabled: bool,
}

/// What should be running for a given set of signals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningDecision {
    pub should_poll_cards: bool,
    pub should_poll_opt_in: bool,
    pub should_set_background: bool,
}

/// Coarse state of the poll decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PollingState {
    /// Signed out.
    #[default]
    Void,
    /// Signed in, notifications not permitted.
    OptedOut,
    /// Signed in with notifications, waiting for the feature to be enabled.
    OptingInPoll,
    Polling,
}

impl RunningSignals {
    pub fn decide(&self) -> RunningDecision {
        let active = self.signed_in && self.notifications_permitted;
        let should_poll_cards = active && self.feature_enabled;
        RunningDecision {
            should_poll_cards,
            should_poll_opt_in: active && !self.feature_enabled,
            should_set_background: should_poll_cards && self.background_permitted,
        }
    }

    pub fn polling_state(&self) -> PollingState {
        if !self.signed_in {
            PollingState::Void
        } else if !self.notifications_permitted {
            PollingState::OptedOut
        } else if !self.feature_enabled {
            PollingState::OptingInPoll
        } else {
            PollingState::Polling
        }
    }
}

/// Side effect required by a state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollingTransition {
    /// Entering `Polling`: poll now and arm the ceiling timer.
    StartPolling,
    /// Leaving `Polling`: disarm and wipe cached cards and dismissals.
    StopPolling,
    None,
}

impl PollingState {
    pub fn is_polling(&self) -> bool {
        matches!(self, PollingState::Polling)
    }

    pub fn transition_to(&self, next: PollingState) -> PollingTransition {
        match (self.is_polling(), next.is_polling()) {
            (false, true) => PollingTransition::StartPolling,
            (true, false) => PollingTransition::StopPolling,
            _ => PollingTransition::None,
        }
    }
}
