// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Concurrent map with single-flight, fallible initialization per key.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::OnceCell;

/// A map whose values are computed at most once per key.
///
/// The outer lock only guards slot lookup and is never held across an
/// `.await`, so a slow initialization for one key never blocks readers or
/// initializers of another key. Racing callers for the same key share one
/// slot: one runs the factory, the rest wait for its outcome. A failed
/// factory leaves the slot empty and the next caller runs its own; the last
/// failing caller removes the empty slot so failed keys do not accumulate.
pub struct OnceMap<K, V> {
    slots: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> OnceMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty map.
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Arc<OnceCell<V>>>> {
        // Nothing panics while the lock is held; recover the map on poison.
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn slot(&self, key: &K) -> Arc<OnceCell<V>> {
        let mut slots = self.lock();
        if let Some(slot) = slots.get(key) {
            return slot.clone();
        }
        let slot = Arc::new(OnceCell::new());
        slots.insert(key.clone(), slot.clone());
        slot
    }

    /// Initialized value for `key`, if any.
    pub fn get(&self, key: &K) -> Option<V> {
        self.lock().get(key).and_then(|slot| slot.get().cloned())
    }

    /// Return the value for `key`, running `factory` if none is present.
    ///
    /// Among concurrent callers for the same key, at most one factory runs at
    /// a time and a successful result is never replaced. Errors are returned
    /// to the caller whose factory produced them and are not stored.
    pub async fn get_or_try_insert_with<F, Fut, E>(&self, key: K, factory: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let slot = self.slot(&key);
        let result = slot.get_or_try_init(factory).await.cloned();
        if result.is_err() {
            self.discard_empty(&key, slot);
        }
        result
    }

    /// Drop `slot` from the map if it is still the registered, uninitialized
    /// slot for `key` and no other caller is waiting on it.
    fn discard_empty(&self, key: &K, slot: Arc<OnceCell<V>>) {
        let mut slots = self.lock();
        let unused = slots.get(key).map_or(false, |current| {
            Arc::ptr_eq(current, &slot) && !current.initialized() && Arc::strong_count(current) == 2
        });
        if unused {
            slots.remove(key);
        }
    }

    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.lock().len()
    }

    /// Number of initialized entries.
    pub fn len(&self) -> usize {
        self.lock().values().filter(|slot| slot.initialized()).count()
    }

    /// Whether no entry is initialized.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `key` has an initialized value.
    pub fn contains(&self, key: &K) -> bool {
        self.lock()
            .get(key)
            .map(|slot| slot.initialized())
            .unwrap_or(false)
    }

    /// Keys with initialized values, in no particular order.
    pub fn keys(&self) -> Vec<K> {
        self.lock()
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(key, _)| key.clone())
            .collect()
    }
}

impl<K, V> Default for OnceMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
