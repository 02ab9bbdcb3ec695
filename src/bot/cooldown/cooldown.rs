use std::{collections::HashMap, sync::{Arc, Mutex, MutexGuard, PoisonError, Weak}, time::Duration};

use tokio::{task::AbortHandle, time::Instant};
use tracing::trace;

/// Ceiling for durations too large for `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

/// Expiring lock-outs keyed by caller-built strings such as `user:command`.
#[derive(Clone, Default)]
pub struct CooldownGate {
    inner: Arc<Mutex<CooldownTable>>,
}

#[derive(Default)]
struct CooldownTable {
    entries: HashMap<String, CooldownEntry>,
    generation: u64,
}

struct CooldownEntry {
    expires_at: Instant,
    generation: u64,
    timer: Option<AbortHandle>,
}

impl CooldownGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `now + duration` under `key`, replacing any previous entry.
    /// A zero duration is never recorded.
    pub fn set(&self, key: impl Into<String>, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        let key = key.into();
        let now = Instant::now();
        let expires_at = now.checked_add(duration).unwrap_or(now + FAR_FUTURE);

        let mut table = self.lock();
        table.generation += 1;
        let generation = table.generation;

        let timer = tokio::runtime::Handle::try_current().ok().map(|runtime| {
            let weak = Arc::downgrade(&self.inner);
            let key = key.clone();
            runtime
                .spawn(async move {
                    tokio::time::sleep_until(expires_at).await;
                    expire(weak, &key, generation);
                })
                .abort_handle()
        });

        let entry = CooldownEntry { expires_at, generation, timer };
        if let Some(previous) = table.entries.insert(key, entry) {
            if let Some(timer) = previous.timer {
                timer.abort();
            }
        }
    }

    /// Remaining time on `key`, or `None` when no cooldown is active.
    pub fn check(&self, key: &str) -> Option<Duration> {
        let table = self.lock();
        let entry = table.entries.get(key)?;
        let now = Instant::now();
        (entry.expires_at > now).then(|| entry.expires_at - now)
    }

    pub fn remove(&self, key: &str) {
        if let Some(entry) = self.lock().entries.remove(key) {
            if let Some(timer) = entry.timer {
                timer.abort();
            }
        }
    }

    /// Number of entries still held, expired-but-unswept ones included.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, CooldownTable> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn expire(table: Weak<Mutex<CooldownTable>>, key: &str, generation: u64) {
    let Some(table) = table.upgrade() else {
        return;
    };
    let mut table = table.lock().unwrap_or_else(PoisonError::into_inner);

    // A newer `set` on the same key owns the slot now.
    let current = table
        .entries
        .get(key)
        .is_some_and(|e| e.generation == generation && Instant::now() >= e.expires_at);
    if current {
        table.entries.remove(key);
        trace!("Cooldown {key} expired");
    }
}

pub fn actor_key(user_id: &str, command: &str) -> String {
    format!("{user_id}:{command}")
}

pub fn channel_key(channel_id: &str, command: &str) -> String {
    format!("{channel_id}:{command}")
}
