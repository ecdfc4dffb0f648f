//! Task kinds run by the sync task queue and their conflict policy.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Named unit of work serialized by the task queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    UpdateCards,
    DismissCard,
    RetryDismissals,
    StateChanged,
    ShowCardsOnStart,
    OnPushMessage,
    RefreshCard,
    PollOptIn,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::UpdateCards => "update-cards",
            TaskKind::DismissCard => "dismiss-card",
            TaskKind::RetryDismissals => "retry-dismiss",
            TaskKind::StateChanged => "state-changed",
            TaskKind::ShowCardsOnStart => "show-cards-on-start",
            TaskKind::OnPushMessage => "on-push-message",
            TaskKind::RefreshCard => "refresh-card",
            TaskKind::PollOptIn => "poll-optin",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True when `new_task` is redundant given the already scheduled `scheduled_task`.
///
/// A second card update is redundant. A dismissal retry is redundant behind
/// anything that flushes dismissals anyway.
pub fn are_tasks_conflicting(new_task: TaskKind, scheduled_task: TaskKind) -> bool {
    match new_task {
        TaskKind::UpdateCards => scheduled_task == TaskKind::UpdateCards,
        TaskKind::RetryDismissals => matches!(
            scheduled_task,
            TaskKind::UpdateCards | TaskKind::DismissCard | TaskKind::RetryDismissals
        ),
        _ => false,
    }
}

/// True when any of the scheduled tasks makes `new_task` redundant.
pub fn conflicts_with_any<I>(new_task: TaskKind, scheduled: I) -> bool
where
    I: IntoIterator<Item = TaskKind>,
{
    scheduled
        .into_iter()
        .any(|scheduled_task| are_tasks_conflicting(new_task, scheduled_task))
}
