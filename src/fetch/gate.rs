//! Per-key refresh gate ("singleflight").
//!
//! The gate maps a key to the receiving half of a `watch` channel whose
//! sender is owned by the key's current [`GateGuard`]. The channel never
//! carries a value: followers wait for the sender to be dropped, which
//! happens exactly once, when the guard goes out of scope.
//!
//! Claiming a key is a single critical section over the map, so two callers
//! racing on a free key can never both come out as leader.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

type InFlight = Arc<Mutex<HashMap<String, watch::Receiver<()>>>>;

/// Outcome of [`KeyGate::acquire_or_wait`].
pub enum Role {
    /// No refresh was running; the caller now owns the key.
    Leader(GateGuard),
    /// A refresh is running; wait on it before re-reading the cache.
    Follower(GateWaiter),
}

impl fmt::Debug for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Leader(guard) => f.debug_tuple("Leader").field(&guard.key).finish(),
            Role::Follower(_) => f.write_str("Follower"),
        }
    }
}

/// Mapping from key to in-progress refresh.
#[derive(Clone, Default)]
pub struct KeyGate {
    inflight: InFlight,
}

impl KeyGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key` as leader, or join the refresh already running for it.
    pub fn acquire_or_wait(&self, key: &str) -> Role {
        let mut inflight = self.inflight.lock();
        if let Some(rx) = inflight.get(key) {
            return Role::Follower(GateWaiter { rx: rx.clone() });
        }
        let (tx, rx) = watch::channel(());
        inflight.insert(key.to_owned(), rx);
        Role::Leader(GateGuard {
            key: key.to_owned(),
            inflight: Arc::clone(&self.inflight),
            _release: tx,
        })
    }

    /// Whether a refresh of `key` is currently running.
    pub fn is_held(&self, key: &str) -> bool {
        self.inflight.lock().contains_key(key)
    }

    /// Number of keys currently being refreshed.
    pub fn held(&self) -> usize {
        self.inflight.lock().len()
    }
}

/// Ownership of one key's refresh. Dropping it releases every follower.
pub struct GateGuard {
    key: String,
    inflight: InFlight,
    // Dropped after `Drop::drop` has removed the map entry, so released
    // followers never find the old entry when they retry.
    _release: watch::Sender<()>,
}

impl GateGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        self.inflight.lock().remove(&self.key);
    }
}

/// A follower's handle on someone else's refresh.
pub struct GateWaiter {
    rx: watch::Receiver<()>,
}

impl GateWaiter {
    /// Resolves once the leader's guard has been dropped.
    pub async fn wait(mut self) {
        // Nothing is ever sent; `changed` only returns once the sender is gone.
        while self.rx.changed().await.is_ok() {}
    }
}
