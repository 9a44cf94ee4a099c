//! Subscription registry — ordered listeners keyed by generated handles.
//!
//! DESIGN
//! ======
//! Listeners live in a `BTreeMap<u64, Listener>`; ids are handed out from a
//! monotonic counter, so map order is subscription order. A notification
//! round clones the listener list under the lock, releases it, then calls
//! each listener. Before every call the id is checked again so a listener
//! removed earlier in the same round is skipped. Registering the same
//! closure twice yields two independent entries.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::user::UserState;

/// A state-change callback. Always receives its own copy of the state.
pub type Listener = Arc<dyn Fn(UserState) + Send + Sync>;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// REGISTRY
// =============================================================================

pub struct Registry {
    next_id: AtomicU64,
    listeners: Mutex<BTreeMap<u64, Listener>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self { next_id: AtomicU64::new(1), listeners: Mutex::new(BTreeMap::new()) }
    }

    /// Register a listener and return its id.
    pub fn insert(&self, listener: Listener) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.listeners).insert(id, listener);
        id
    }

    /// Remove a listener. Returns `false` if it was already gone.
    pub fn remove(&self, id: u64) -> bool {
        lock(&self.listeners).remove(&id).is_some()
    }

    #[must_use]
    pub fn contains(&self, id: u64) -> bool {
        lock(&self.listeners).contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.listeners).len()
    }

    /// Deliver one notification round. Returns how many listeners were called.
    pub fn notify(&self, user: &UserState) -> usize {
        let snapshot: Vec<(u64, Listener)> = lock(&self.listeners)
            .iter()
            .map(|(id, listener)| (*id, Arc::clone(listener)))
            .collect();

        let mut delivered = 0;
        for (id, listener) in snapshot {
            if !self.contains(id) {
                continue;
            }
            listener(user.clone());
            delivered += 1;
        }
        delivered
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SUBSCRIPTION HANDLE
// =============================================================================

/// Cancellation handle returned by `subscribe`.
///
/// Dropping the handle does not unsubscribe; call [`Subscription::unsubscribe`].
/// Unsubscribing more than once is a no-op.
#[derive(Clone)]
pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
}

impl Subscription {
    pub(crate) fn new(id: u64, registry: &Arc<Registry>) -> Self {
        Self { id, registry: Arc::downgrade(registry) }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.contains(self.id))
    }

    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
