//! Dismissal status policy and backoff arithmetic.

use serde::{Deserialize, Serialize};

/// How a dismissal request ended, from the tracker's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DismissalOutcome {
    /// Server acknowledged the dismissal (204).
    Acknowledged,
    /// Server will never accept it (400/405); stop retrying.
    Rejected,
    /// Try again on the next cycle.
    Retry,
}

/// Classify the HTTP status of a `DELETE /notifications/<id>` call.
pub fn classify_dismissal_status(status: u16) -> DismissalOutcome {
    match status {
        204 => DismissalOutcome::Acknowledged,
        400 | 405 => DismissalOutcome::Rejected,
        _ => DismissalOutcome::Retry,
    }
}

/// Next backoff step in seconds: doubles `current`, starts at `initial`, capped at `maximum`.
pub fn next_backoff_seconds(current: Option<u64>, initial: u64, maximum: u64) -> u64 {
    current
        .map(|value| value.saturating_mul(2))
        .unwrap_or(initial)
        .min(maximum)
}
