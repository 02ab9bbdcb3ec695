use std::{future::Future, panic::AssertUnwindSafe, sync::{atomic::{AtomicUsize, Ordering}, Arc}};

use futures::FutureExt;
use tokio::{sync::{Notify, Semaphore}, task::JoinHandle};
use tracing::warn;

use crate::bot::{commands::commands::BotResult, events::events::panic_message};

/// Result of a supervised handler run.
#[derive(Debug)]
pub enum TaskOutcome {
    Completed(BotResult<()>),
    Panicked(String),
}

/// Runs `fut` to completion, turning a panic into [`TaskOutcome::Panicked`].
pub async fn supervise<F>(fut: F) -> TaskOutcome
where
    F: Future<Output = BotResult<()>> + Send,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => TaskOutcome::Completed(result),
        Err(payload) => TaskOutcome::Panicked(panic_message(payload.as_ref())),
    }
}

/// Bounded spawner for handler tasks. Spawning never waits: a task queues for
/// its permit inside the runtime, so the caller keeps routing while the pool is full.
#[derive(Clone)]
pub struct TaskPool {
    permits: Arc<Semaphore>,
    tracker: Arc<Tracker>,
}

#[derive(Default)]
struct Tracker {
    pending: AtomicUsize,
    idle: Notify,
}

/// Counts a task as pending from spawn until it finishes or is dropped.
struct Pending(Arc<Tracker>);

impl Pending {
    fn new(tracker: &Arc<Tracker>) -> Self {
        tracker.pending.fetch_add(1, Ordering::SeqCst);
        Pending(tracker.clone())
    }
}

impl Drop for Pending {
    fn drop(&mut self) {
        if self.0.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

impl TaskPool {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, Semaphore::MAX_PERMITS);
        Self { permits: Arc::new(Semaphore::new(capacity)), tracker: Arc::default() }
    }

    /// Runs `fut` once a permit is free.
    pub fn spawn<F>(&self, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let pending = Pending::new(&self.tracker);
        let permits = self.permits.clone();

        tokio::spawn(async move {
            let _pending = pending;
            let Ok(_permit) = permits.acquire_owned().await else {
                warn!("Task pool closed, dropping task");
                return;
            };
            fut.await;
        })
    }

    /// Runs `fut` right away without taking a permit. Still counted by [`wait_idle`](Self::wait_idle).
    pub fn spawn_unbounded<F>(&self, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let pending = Pending::new(&self.tracker);
        tokio::spawn(async move {
            let _pending = pending;
            fut.await;
        })
    }

    /// Tasks queued or running.
    pub fn in_flight(&self) -> usize {
        self.tracker.pending.load(Ordering::SeqCst)
    }

    /// Resolves once no spawned task is queued or running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.tracker.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}
