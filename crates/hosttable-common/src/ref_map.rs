//! Reference-counted registry that prevents auto-vivification bugs.
//!
//! Every entry carries a reference count of at least one. Counts live in the
//! map rather than in the values, so a value type needs no bookkeeping of its
//! own, and the only way an entry leaves the map is through
//! [`RefMap::decrement_ref`] returning [`Release::Released`], which moves the
//! value out to the caller for teardown.
//!
//! Iteration is in key order so that anything derived from a walk over the
//! registry (hardware fan-out, exported state) is deterministic.

use std::collections::BTreeMap;
use thiserror::Error;

/// Error type for RefMap operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefMapError {
    #[error("Key not found")]
    KeyNotFound,

    #[error("Key already registered")]
    AlreadyExists,
}

/// Outcome of dropping one reference.
#[derive(Debug, PartialEq, Eq)]
pub enum Release<V> {
    /// That was the last reference; the entry has been removed and is returned.
    Released(V),
    /// Other holders remain; carries the new count.
    Retained(u32),
}

impl<V> Release<V> {
    pub fn is_released(&self) -> bool {
        matches!(self, Release::Released(_))
    }
}

#[derive(Debug, Clone)]
struct Counted<V> {
    value: V,
    ref_count: u32,
}

/// A reference-counted map.
///
/// # Example
///
/// ```
/// use hosttable_common::{RefMap, Release};
///
/// let mut map: RefMap<u32, &str> = RefMap::new();
/// map.insert_new(7, "egress").unwrap();
/// assert_eq!(map.increment_ref(&7).unwrap(), 2);
///
/// assert_eq!(map.decrement_ref(&7).unwrap(), Release::Retained(1));
/// assert_eq!(map.decrement_ref(&7).unwrap(), Release::Released("egress"));
/// assert!(map.get(&7).is_none());
/// ```
#[derive(Debug, Clone)]
pub struct RefMap<K, V> {
    inner: BTreeMap<K, Counted<V>>,
}

impl<K: Ord, V> RefMap<K, V> {
    pub fn new() -> Self {
        Self {
            inner: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    /// Returns the value for `key`. **This never creates entries.**
    pub fn get(&self, key: &K) -> Option<&V> {
        self.inner.get(key).map(|e| &e.value)
    }

    /// Returns the value for `key` mutably. **This never creates entries.**
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.inner.get_mut(key).map(|e| &mut e.value)
    }

    /// Returns the reference count for `key`, or `None` if it is not registered.
    pub fn ref_count(&self, key: &K) -> Option<u32> {
        self.inner.get(key).map(|e| e.ref_count)
    }

    /// Registers a new entry holding one reference.
    ///
    /// Fails without touching the existing entry if `key` is already present.
    pub fn insert_new(&mut self, key: K, value: V) -> Result<&mut V, RefMapError> {
        use std::collections::btree_map::Entry;

        match self.inner.entry(key) {
            Entry::Occupied(_) => Err(RefMapError::AlreadyExists),
            Entry::Vacant(slot) => Ok(&mut slot
                .insert(Counted {
                    value,
                    ref_count: 1,
                })
                .value),
        }
    }

    /// Adds a reference and returns the new count.
    pub fn increment_ref(&mut self, key: &K) -> Result<u32, RefMapError> {
        let entry = self.inner.get_mut(key).ok_or(RefMapError::KeyNotFound)?;
        entry.ref_count = entry.ref_count.saturating_add(1);
        Ok(entry.ref_count)
    }

    /// Drops a reference, removing and returning the value when it was the last.
    pub fn decrement_ref(&mut self, key: &K) -> Result<Release<V>, RefMapError> {
        let entry = self.inner.get_mut(key).ok_or(RefMapError::KeyNotFound)?;
        if entry.ref_count > 1 {
            entry.ref_count -= 1;
            return Ok(Release::Retained(entry.ref_count));
        }
        match self.inner.remove(key) {
            Some(entry) => Ok(Release::Released(entry.value)),
            None => Err(RefMapError::KeyNotFound),
        }
    }

    /// Iterates over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.inner.iter().map(|(k, e)| (k, &e.value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.inner.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.inner.values().map(|e| &e.value)
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.inner.values_mut().map(|e| &mut e.value)
    }
}

impl<K: Ord, V> Default for RefMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_get_never_creates() {
        let mut map: RefMap<String, i32> = RefMap::new();

        assert!(map.get(&"missing".to_string()).is_none());
        assert!(map.get_mut(&"missing".to_string()).is_none());
        assert_eq!(map.ref_count(&"missing".to_string()), None);
        assert!(map.is_empty());
    }

    #[test]
    fn test_insert_new_starts_at_one() {
        let mut map: RefMap<&str, i32> = RefMap::new();
        *map.insert_new("a", 1).unwrap() += 10;
        assert_eq!(map.get(&"a"), Some(&11));
        assert_eq!(map.ref_count(&"a"), Some(1));
    }

    #[test]
    fn test_insert_new_rejects_duplicates() {
        let mut map: RefMap<&str, i32> = RefMap::new();
        map.insert_new("a", 1).unwrap();
        map.increment_ref(&"a").unwrap();

        assert_eq!(map.insert_new("a", 2).unwrap_err(), RefMapError::AlreadyExists);
        assert_eq!(map.get(&"a"), Some(&1));
        assert_eq!(map.ref_count(&"a"), Some(2));
    }

    #[test]
    fn test_increment_ref_requires_existing_key() {
        let mut map: RefMap<&str, i32> = RefMap::new();
        assert_eq!(map.increment_ref(&"missing"), Err(RefMapError::KeyNotFound));
        assert!(map.is_empty());
    }

    #[test]
    fn test_release_returns_value_on_last_reference() {
        let mut map: RefMap<&str, String> = RefMap::new();
        map.insert_new("a", "value".to_string()).unwrap();
        map.increment_ref(&"a").unwrap();
        map.increment_ref(&"a").unwrap();

        assert_eq!(map.decrement_ref(&"a").unwrap(), Release::Retained(2));
        assert_eq!(map.decrement_ref(&"a").unwrap(), Release::Retained(1));
        let last = map.decrement_ref(&"a").unwrap();
        assert!(last.is_released());
        assert_eq!(last, Release::Released("value".to_string()));

        assert!(!map.contains_key(&"a"));
        assert_eq!(map.decrement_ref(&"a").unwrap_err(), RefMapError::KeyNotFound);
    }

    #[test]
    fn test_iteration_is_key_ordered() {
        let mut map: RefMap<u32, char> = RefMap::new();
        for (k, v) in [(3, 'c'), (1, 'a'), (2, 'b')] {
            map.insert_new(k, v).unwrap();
        }
        let keys: Vec<u32> = map.keys().copied().collect();
        assert_eq!(keys, vec![1, 2, 3]);
        let values: String = map.values().collect();
        assert_eq!(values, "abc");

        for v in map.values_mut() {
            *v = v.to_ascii_uppercase();
        }
        let pairs: Vec<(u32, char)> = map.iter().map(|(k, v)| (*k, *v)).collect();
        assert_eq!(pairs, vec![(1, 'A'), (2, 'B'), (3, 'C')]);
    }
}
