//! Map guarded by a single reader-writer lock.

use std::hash::Hash;
use std::sync::{PoisonError, RwLock};

use crate::collections::{Dense, RandomMap};

/// Lock-based [`RandomMap`].
#[derive(Debug)]
pub struct RwMap<K, V> {
    inner: RwLock<Dense<K, V>>,
}

impl<K: Eq + Hash + Clone, V: Clone> RwMap<K, V> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Pre-allocate room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Dense::with_capacity(capacity)),
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Default for RwMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone, V: Clone> RandomMap<K, V> for RwMap<K, V> {
    fn store(&self, key: K, value: V) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value);
    }

    fn load(&self, key: &K) -> Option<V> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).get(key)
    }

    fn delete(&self, key: &K) -> Option<V> {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn random(&self) -> Option<(K, V)> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).sample()
    }
}
