//! Concurrent maps with random sampling.
//!
//! Two implementations of [`RandomMap`]:
//! - [`RwMap`]: one reader-writer lock around a dense entry table
//! - [`AtomicMap`]: copy-on-write snapshots behind an atomic pointer, so
//!   readers never wait for writers
//!
//! Both keep entries in a contiguous vector with a key index, which makes
//! [`RandomMap::random`] O(1).

pub mod atomic_map;
pub mod rw_map;

use std::collections::HashMap;
use std::hash::Hash;

pub use atomic_map::AtomicMap;
pub use rw_map::RwMap;

/// Associative container that can hand out a random entry.
pub trait RandomMap<K, V> {
    /// Insert or replace the value for `key`.
    fn store(&self, key: K, value: V);

    fn load(&self, key: &K) -> Option<V>;

    /// Remove `key`, returning its value.
    fn delete(&self, key: &K) -> Option<V>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A pseudo-randomly chosen existing entry, `None` when empty.
    fn random(&self) -> Option<(K, V)>;
}

/// Dense entry table shared by both maps.
#[derive(Debug, Clone)]
pub(crate) struct Dense<K, V> {
    index: HashMap<K, usize>,
    entries: Vec<(K, V)>,
}

impl<K, V> Default for Dense<K, V> {
    fn default() -> Self {
        Self {
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Dense<K, V> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            index: HashMap::with_capacity(capacity),
            entries: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn insert(&mut self, key: K, value: V) {
        match self.index.get(&key) {
            Some(&i) => self.entries[i].1 = value,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    pub(crate) fn get(&self, key: &K) -> Option<V> {
        self.index.get(key).map(|&i| self.entries[i].1.clone())
    }

    pub(crate) fn remove(&mut self, key: &K) -> Option<V> {
        let i = self.index.remove(key)?;
        let (_, value) = self.entries.swap_remove(i);
        // The former last entry now sits at `i`.
        if let Some((moved, _)) = self.entries.get(i) {
            self.index.insert(moved.clone(), i);
        }
        Some(value)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn sample(&self) -> Option<(K, V)> {
        if self.entries.is_empty() {
            return None;
        }
        let (k, v) = &self.entries[fastrand::usize(..self.entries.len())];
        Some((k.clone(), v.clone()))
    }
}
