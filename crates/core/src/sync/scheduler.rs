//! Core scheduler constants for card sync.

/// First delay of the card poll loop when no server hint is known.
pub const INITIAL_POLLING_PERIOD_SECONDS: u64 = 5 * 60;

/// Ceiling of the card poll backoff, also its repeat period.
pub const MAXIMUM_POLLING_PERIOD_SECONDS: u64 = 30 * 60;

/// Floor applied to server-provided poll hints.
pub const MINIMUM_POLLING_PERIOD_SECONDS: u64 = 5 * 60;

/// First delay of the opt-in recheck loop.
pub const INITIAL_OPTIN_RECHECK_PERIOD_SECONDS: u64 = 60 * 60;

/// Ceiling of the opt-in recheck backoff.
pub const MAXIMUM_OPTIN_RECHECK_PERIOD_SECONDS: u64 = 24 * 60 * 60;

/// First delay of the dismissal retry loop.
pub const INITIAL_RETRY_DISMISS_PERIOD_SECONDS: u64 = 60;

/// Ceiling of the dismissal retry backoff.
pub const MAXIMUM_RETRY_DISMISS_PERIOD_SECONDS: u64 = 60 * 60;

/// Pending dismissals older than this are dropped instead of sent.
pub const MAXIMUM_DISMISSAL_AGE_MS: i64 = 24 * 60 * 60 * 1000;

/// How long an acknowledged dismissal keeps filtering the card out of responses.
pub const DISMISS_RETENTION_TIME_MS: i64 = 20 * 60 * 1000;

/// Maximum positive jitter, as a fraction of the delay, added to backoff steps.
pub const RETRY_JITTER_FRACTION: f64 = 0.2;

/// Payload prefix of push messages asking for an immediate poll.
pub const REQUEST_CARDS_PAYLOAD_PREFIX: &str = "REQUEST_CARDS";

/// Prefix of the synthetic group inserted for a push wake.
pub const PUSH_GROUP_PREFIX: &str = "PUSH";

/// `base_ms` shifted by a server-supplied number of seconds, saturating at the `i64` range.
pub fn offset_ms(base_ms: i64, seconds: i64) -> i64 {
    base_ms.saturating_add(seconds.saturating_mul(1000))
}
