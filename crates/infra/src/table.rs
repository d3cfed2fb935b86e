//! In-memory keyed table used by the memory backend of every subsystem.

use std::collections::BTreeMap;
use std::sync::RwLock;

use vexen_core::RepositoryError;

/// In-memory ordered key/value table for tests/dev.
///
/// Keys are kept ordered so listing is deterministic.
#[derive(Debug)]
pub struct MemoryTable<K, V> {
    inner: RwLock<BTreeMap<K, V>>,
}

impl<K, V> MemoryTable<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<K, V> Default for MemoryTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> RepositoryError {
    RepositoryError::Storage("lock poisoned".to_string())
}

impl<K, V> MemoryTable<K, V>
where
    K: Ord + Clone,
    V: Clone,
{
    pub fn get(&self, key: &K) -> Result<Option<V>, RepositoryError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.get(key).cloned())
    }

    /// First value matching `pred`, in key order.
    pub fn find(&self, pred: impl Fn(&V) -> bool) -> Result<Option<V>, RepositoryError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.values().find(|v| pred(v)).cloned())
    }

    pub fn filter(&self, pred: impl Fn(&K, &V) -> bool) -> Result<Vec<V>, RepositoryError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map
            .iter()
            .filter(|(k, v)| pred(k, v))
            .map(|(_, v)| v.clone())
            .collect())
    }

    /// Keys matching `pred`, in key order.
    pub fn keys(&self, pred: impl Fn(&K) -> bool) -> Result<Vec<K>, RepositoryError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.keys().filter(|k| pred(k)).cloned().collect())
    }

    pub fn values(&self, offset: usize, limit: usize) -> Result<Vec<V>, RepositoryError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.values().skip(offset).take(limit).cloned().collect())
    }

    /// Insert under `key` unless the key exists or `conflicts` matches an
    /// existing value. Both checks happen under one write lock.
    pub fn insert_unique(
        &self,
        key: K,
        value: V,
        conflicts: impl Fn(&V) -> bool,
    ) -> Result<(), RepositoryError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        if map.contains_key(&key) || map.values().any(|v| conflicts(v)) {
            return Err(RepositoryError::Conflict("duplicate key".to_string()));
        }
        map.insert(key, value);
        Ok(())
    }

    pub fn upsert(&self, key: K, value: V) -> Result<(), RepositoryError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        map.insert(key, value);
        Ok(())
    }

    /// Replace an existing value. Returns `false` if the key was absent.
    pub fn replace(&self, key: &K, value: V) -> Result<bool, RepositoryError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        match map.get_mut(key) {
            Some(slot) => {
                *slot = value;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Replace an existing value unless `conflicts` matches another entry.
    /// Both checks happen under one write lock. Returns `false` if the key
    /// was absent.
    pub fn replace_unique(
        &self,
        key: &K,
        value: V,
        conflicts: impl Fn(&V) -> bool,
    ) -> Result<bool, RepositoryError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        if map.iter().any(|(k, v)| k != key && conflicts(v)) {
            return Err(RepositoryError::Conflict("duplicate value".to_string()));
        }
        match map.get_mut(key) {
            Some(slot) => {
                *slot = value;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Mutate the value under `key` in place, under the write lock.
    /// Returns `None` if the key was absent.
    pub fn modify<R>(&self, key: &K, f: impl FnOnce(&mut V) -> R) -> Result<Option<R>, RepositoryError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        Ok(map.get_mut(key).map(f))
    }

    pub fn remove(&self, key: &K) -> Result<bool, RepositoryError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        Ok(map.remove(key).is_some())
    }

    /// Remove every entry matching `pred`; returns how many were removed.
    pub fn remove_where(&self, pred: impl Fn(&K, &V) -> bool) -> Result<usize, RepositoryError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let before = map.len();
        map.retain(|k, v| !pred(k, v));
        Ok(before - map.len())
    }
}
