//! Single-worker FIFO queue for sync tasks.

use futures::future::BoxFuture;
use futures::FutureExt;
use log::{debug, warn};
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use cardsync_core::sync::{conflicts_with_any, TaskKind};

use crate::error::EngineError;

pub type TaskFuture = BoxFuture<'static, Result<(), EngineError>>;

struct QueuedTask {
    kind: TaskKind,
    future: TaskFuture,
}

/// Runs tasks one at a time in submission order.
///
/// The scheduled list includes the running task until it completes, so a
/// task that conflicts with the running one is dropped too.
pub struct TaskQueue {
    sender: mpsc::UnboundedSender<QueuedTask>,
    scheduled: Arc<Mutex<VecDeque<TaskKind>>>,
    pending: Arc<watch::Sender<usize>>,
    worker: JoinHandle<()>,
}

impl TaskQueue {
    /// Creates the queue and spawns its worker on the current runtime.
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let scheduled = Arc::new(Mutex::new(VecDeque::new()));
        let (pending, _) = watch::channel(0usize);
        let pending = Arc::new(pending);
        let worker = tokio::spawn(run_worker(
            receiver,
            Arc::clone(&scheduled),
            Arc::clone(&pending),
        ));
        Self {
            sender,
            scheduled,
            pending,
            worker,
        }
    }

    /// Enqueues `future` under `kind`. Returns `false` when the task was
    /// dropped because an already scheduled task makes it redundant.
    pub fn add(&self, kind: TaskKind, future: TaskFuture) -> bool {
        let mut scheduled = self.scheduled.lock().unwrap_or_else(PoisonError::into_inner);
        if conflicts_with_any(kind, scheduled.iter().copied()) {
            debug!("[CardSync] Dropping task {}: conflicts with {:?}", kind, scheduled);
            return false;
        }
        if self.sender.send(QueuedTask { kind, future }).is_err() {
            warn!("[CardSync] Task queue closed, dropping {}", kind);
            return false;
        }
        scheduled.push_back(kind);
        self.pending.send_replace(scheduled.len());
        debug!("[CardSync] Queued task {} ({} scheduled)", kind, scheduled.len());
        true
    }

    /// Kinds of the running and waiting tasks, oldest first.
    pub fn scheduled(&self) -> Vec<TaskKind> {
        self.scheduled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect()
    }

    /// Resolves once nothing is running or waiting.
    pub async fn idle(&self) {
        let mut receiver = self.pending.subscribe();
        // The sender lives as long as `self`, so this only fails on shutdown.
        let _ = receiver.wait_for(|pending| *pending == 0).await;
    }

    /// Stops the worker. Waiting tasks are discarded.
    pub fn shutdown(&self) {
        self.worker.abort();
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

async fn run_worker(
    mut receiver: mpsc::UnboundedReceiver<QueuedTask>,
    scheduled: Arc<Mutex<VecDeque<TaskKind>>>,
    pending: Arc<watch::Sender<usize>>,
) {
    while let Some(task) = receiver.recv().await {
        debug!("[CardSync] Running task {}", task.kind);
        match AssertUnwindSafe(task.future).catch_unwind().await {
            Ok(Ok(())) => debug!("[CardSync] Task {} finished", task.kind),
            Ok(Err(err)) => warn!("[CardSync] Task {} failed: {}", task.kind, err),
            Err(_) => warn!("[CardSync] Task {} panicked", task.kind),
        }

        let mut scheduled = scheduled.lock().unwrap_or_else(PoisonError::into_inner);
        scheduled.pop_front();
        pending.send_replace(scheduled.len());
    }
}
