//! In-flight request deduplication.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OnceCell;

/// Maps a key to a shared pending-or-finished computation.
///
/// Concurrent callers for the same key await one load. A failed load leaves the slot
/// empty so a later caller retries; a stale value is swapped out wholesale.
#[derive(Debug)]
pub struct SingleFlight<K, V> {
    slots: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_load<F, Fut>(&self, key: K, is_fresh: impl Fn(&V) -> bool, load: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let cell = self.slot(key, is_fresh);
        cell.get_or_init(load).await.clone()
    }

    pub async fn get_or_try_load<E, F, Fut>(
        &self,
        key: K,
        is_fresh: impl Fn(&V) -> bool,
        load: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let cell = self.slot(key, is_fresh);
        cell.get_or_try_init(load).await.cloned()
    }

    pub fn peek(&self, key: &K) -> Option<V> {
        self.slots.lock().get(key).and_then(|cell| cell.get().cloned())
    }

    pub fn invalidate(&self, key: &K) {
        self.slots.lock().remove(key);
    }

    pub fn clear(&self) {
        self.slots.lock().clear();
    }

    fn slot(&self, key: K, is_fresh: impl Fn(&V) -> bool) -> Arc<OnceCell<V>> {
        let mut slots = self.slots.lock();
        let slot = slots.entry(key).or_insert_with(|| Arc::new(OnceCell::new()));
        if slot.get().is_some_and(|value| !is_fresh(value)) {
            *slot = Arc::new(OnceCell::new());
        }
        Arc::clone(slot)
    }
}
