//! Keyed create-once registry.
//!
//! `OnceMap` memoizes one value per key. Concurrent callers asking for the
//! same key serialize on a per-key lock: the first runs the initializer, the
//! rest wait for it and receive the stored value. Callers for different keys
//! never wait on each other beyond the brief map lookup.
//!
//! A failed initialization stores nothing, so the next caller for that key
//! runs the initializer again.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

type Slot<V> = Arc<Mutex<Option<V>>>;

/// Map of lazily initialized values with one initialization per key
pub struct OnceMap<K, V> {
    slots: Mutex<HashMap<K, Slot<V>>>,
}

impl<K, V> OnceMap<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Get the value for `key`, running `init` if no value is stored yet.
    pub async fn get_or_try_init<F, Fut, E>(&self, key: K, init: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let slot = {
            let mut slots = self.slots.lock().await;
            slots.entry(key.clone()).or_default().clone()
        };

        let mut value = slot.lock().await;
        if let Some(ref existing) = *value {
            debug!("Reusing registered value for {:?}", key);
            return Ok(existing.clone());
        }

        let created = init().await?;
        *value = Some(created.clone());
        Ok(created)
    }

    /// Get the stored value for `key` without initializing it
    pub async fn get(&self, key: &K) -> Option<V> {
        let slot = self.slots.lock().await.get(key).cloned()?;
        let value = slot.lock().await;
        value.clone()
    }

    /// Number of keys that have been requested
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    /// Whether no key has been requested yet
    pub async fn is_empty(&self) -> bool {
        self.slots.lock().await.is_empty()
    }
}

impl<K, V> Default for OnceMap<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
