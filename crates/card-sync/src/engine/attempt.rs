//! Named retry/poll timers with exponential backoff.
//!
//! Each [`AttemptManager`] owns one timer and one backoff step. Firing calls
//! the registered callback; the manager never retries on its own, the
//! callback's work calls [`AttemptManager::schedule_retry`] when it fails.
//! Once armed, the timer keeps firing every `maximum` seconds until it is
//! re-armed or stopped, so a lost reschedule cannot stall the loop.

use log::{debug, warn};
use rand::Rng;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use cardsync_core::sync::{next_backoff_seconds, RETRY_JITTER_FRACTION};

pub type AttemptCallback = Arc<dyn Fn() + Send + Sync>;

/// Backoff bounds of one attempt manager, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial_secs: u64,
    pub maximum_secs: u64,
}

impl BackoffPolicy {
    pub const fn new(initial_secs: u64, maximum_secs: u64) -> Self {
        Self {
            initial_secs,
            maximum_secs,
        }
    }
}

/// Observable state of an attempt manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptState {
    pub running: bool,
    /// Current backoff step; `None` right after `start(Some(..))` or `stop()`.
    pub current_delay_secs: Option<u64>,
    pub next_fire_at: Option<Instant>,
}

#[derive(Default)]
struct TimerSlot {
    handle: Option<JoinHandle<()>>,
    current_delay_secs: Option<u64>,
    next_fire_at: Option<Instant>,
}

pub struct AttemptManager {
    name: String,
    policy: BackoffPolicy,
    slot: Arc<Mutex<TimerSlot>>,
    callback: OnceLock<AttemptCallback>,
}

fn jittered(delay_secs: u64) -> Duration {
    let factor = 1.0 + rand::thread_rng().gen_range(0.0..=RETRY_JITTER_FRACTION);
    Duration::from_secs(delay_secs).mul_f64(factor)
}

impl AttemptManager {
    pub fn new(name: impl Into<String>, policy: BackoffPolicy) -> Self {
        Self {
            name: name.into(),
            policy,
            slot: Arc::new(Mutex::new(TimerSlot::default())),
            callback: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> BackoffPolicy {
        self.policy
    }

    /// Registers the function invoked on every fire. Only the first call has effect.
    pub fn set_callback(&self, callback: AttemptCallback) {
        if self.callback.set(callback).is_err() {
            warn!("[CardSync] Attempt '{}' already has a callback", self.name);
        }
    }

    /// Arms the timer. With a delay, fires after it and resets the backoff
    /// step; without one, fires after the (jittered) initial step.
    pub async fn start(&self, first_delay: Option<Duration>) {
        let mut slot = self.slot.lock().await;
        match first_delay {
            Some(delay) => {
                slot.current_delay_secs = None;
                self.arm(&mut slot, delay);
            }
            None => {
                slot.current_delay_secs = Some(self.policy.initial_secs);
                self.arm(&mut slot, jittered(self.policy.initial_secs));
            }
        }
    }

    /// Re-arms at the next backoff step: double the current one, capped at the maximum.
    pub async fn schedule_retry(&self) {
        let mut slot = self.slot.lock().await;
        let next = next_backoff_seconds(
            slot.current_delay_secs,
            self.policy.initial_secs,
            self.policy.maximum_secs,
        );
        slot.current_delay_secs = Some(next);
        debug!("[CardSync] Attempt '{}' retrying in ~{}s", self.name, next);
        self.arm(&mut slot, jittered(next));
    }

    /// Disarms the timer and resets the backoff step.
    pub async fn stop(&self) {
        let mut slot = self.slot.lock().await;
        if let Some(handle) = slot.handle.take() {
            handle.abort();
            debug!("[CardSync] Attempt '{}' stopped", self.name);
        }
        slot.current_delay_secs = None;
        slot.next_fire_at = None;
    }

    pub async fn is_running(&self) -> bool {
        self.slot.lock().await.handle.is_some()
    }

    /// Current backoff step, if the timer was armed through backoff.
    pub async fn current_delay(&self) -> Option<Duration> {
        self.slot
            .lock()
            .await
            .current_delay_secs
            .map(Duration::from_secs)
    }

    pub async fn state(&self) -> AttemptState {
        let slot = self.slot.lock().await;
        AttemptState {
            running: slot.handle.is_some(),
            current_delay_secs: slot.current_delay_secs,
            next_fire_at: slot.next_fire_at,
        }
    }

    fn arm(&self, slot: &mut TimerSlot, delay: Duration) {
        if let Some(handle) = slot.handle.take() {
            handle.abort();
        }

        let name = self.name.clone();
        let callback = self.callback.get().cloned();
        let period = Duration::from_secs(self.policy.maximum_secs);
        let slot_ref = Arc::clone(&self.slot);
        let now = Instant::now();
        let first_fire = now.checked_add(delay).unwrap_or_else(|| {
            debug!("[CardSync] Attempt '{}' delay out of range, using {:?}", name, period);
            now + period
        });
        slot.next_fire_at = Some(first_fire);

        slot.handle = Some(tokio::spawn(async move {
            tokio::time::sleep_until(first_fire).await;
            loop {
                slot_ref.lock().await.next_fire_at = Some(Instant::now() + period);
                match &callback {
                    Some(callback) => {
                        debug!("[CardSync] Attempt '{}' fired", name);
                        callback();
                    }
                    None => warn!("[CardSync] Attempt '{}' fired without a callback", name),
                }
                tokio::time::sleep(period).await;
            }
        }));
    }
}

impl Drop for AttemptManager {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.slot.try_lock() {
            if let Some(handle) = slot.handle.take() {
                handle.abort();
            }
        }
    }
}
