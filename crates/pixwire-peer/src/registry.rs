use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

/// Opaque identifier for one accepted connection.
///
/// Unique for the lifetime of the process; never derived from the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Monotonic source of [`ConnectionId`]s.
#[derive(Debug)]
pub struct ConnectionIdGenerator {
    next: AtomicU64,
}

impl ConnectionIdGenerator {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Allocate the next id.
    pub fn next_id(&self) -> ConnectionId {
        ConnectionId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct Entry {
    last_activity: Instant,
    token: CancellationToken,
}

/// Shared map from live connection to the time of its last successful round.
///
/// Workers insert themselves when they start, refresh after every round and
/// remove themselves when they exit. The supervisor sweeps stale entries.
/// Every entry owns a cancellation token; removing the entry by any path
/// cancels it, which is how an evicted worker learns it must stop.
///
/// All operations take a single short lock and never block on I/O.
#[derive(Debug, Default)]
pub struct LivenessRegistry {
    entries: Mutex<HashMap<ConnectionId, Entry>>,
}

impl LivenessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // A panicking worker must not take the registry down with it.
    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record `id` as live at `now` and return its cancellation token.
    ///
    /// Re-inserting an existing id replaces the entry and cancels the old token.
    pub fn insert(&self, id: ConnectionId, now: Instant) -> CancellationToken {
        let token = CancellationToken::new();
        let previous = self.lock().insert(
            id,
            Entry {
                last_activity: now,
                token: token.clone(),
            },
        );
        if let Some(previous) = previous {
            previous.token.cancel();
        }
        token
    }

    /// Move the last-activity time of `id` to `now`.
    ///
    /// Returns `false`, changing nothing, when `id` is absent (already evicted).
    pub fn refresh(&self, id: ConnectionId, now: Instant) -> bool {
        match self.lock().get_mut(&id) {
            Some(entry) => {
                entry.last_activity = now;
                true
            }
            None => false,
        }
    }

    pub fn exists(&self, id: ConnectionId) -> bool {
        self.lock().contains_key(&id)
    }

    /// Remove `id` and cancel its token. Returns whether it was present.
    pub fn remove(&self, id: ConnectionId) -> bool {
        let removed = self.lock().remove(&id);
        match removed {
            Some(entry) => {
                entry.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Remove every entry idle for strictly longer than `threshold` as of
    /// `now`, cancel their tokens and return the evicted ids in ascending order.
    ///
    /// Entries stamped after `now` count as zero idle time.
    pub fn sweep(&self, now: Instant, threshold: Duration) -> Vec<ConnectionId> {
        let mut evicted = Vec::new();
        {
            let mut entries = self.lock();
            entries.retain(|id, entry| {
                let idle = now.saturating_duration_since(entry.last_activity);
                if idle > threshold {
                    evicted.push((*id, entry.token.clone()));
                    false
                } else {
                    true
                }
            });
        }

        evicted.sort_unstable_by_key(|(id, _)| *id);
        evicted
            .into_iter()
            .map(|(id, token)| {
                token.cancel();
                id
            })
            .collect()
    }

    /// Time of the last successful round for `id`, if still registered.
    pub fn last_activity(&self, id: ConnectionId) -> Option<Instant> {
        self.lock().get(&id).map(|entry| entry.last_activity)
    }

    /// Snapshot of the registered ids in ascending order.
    pub fn ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
