//! Copy-on-write map behind an atomic pointer.
//!
//! Reads load the current snapshot without locking. Writes clone the
//! snapshot, modify the clone and swap it in, retrying if another writer
//! got there first. Suited to read-mostly tables.

use std::hash::Hash;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::collections::{Dense, RandomMap};

/// Lock-free-read [`RandomMap`].
#[derive(Debug)]
pub struct AtomicMap<K, V> {
    inner: ArcSwap<Dense<K, V>>,
}

impl<K: Eq + Hash + Clone, V: Clone> AtomicMap<K, V> {
    pub fn new() -> Self {
        Self {
            inner: ArcSwap::from_pointee(Dense::default()),
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Default for AtomicMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone, V: Clone> RandomMap<K, V> for AtomicMap<K, V> {
    fn store(&self, key: K, value: V) {
        self.inner.rcu(|current| {
            let mut next = Dense::clone(current);
            next.insert(key.clone(), value.clone());
            Arc::new(next)
        });
    }

    fn load(&self, key: &K) -> Option<V> {
        self.inner.load().get(key)
    }

    fn delete(&self, key: &K) -> Option<V> {
        let mut removed = None;
        self.inner.rcu(|current| {
            let mut next = Dense::clone(current);
            removed = next.remove(key);
            Arc::new(next)
        });
        removed
    }

    fn len(&self) -> usize {
        self.inner.load().len()
    }

    fn random(&self) -> Option<(K, V)> {
        self.inner.load().sample()
    }
}
