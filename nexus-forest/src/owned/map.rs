//! OwnedMap - an ordered map that owns its storage.

use core::ops::RangeBounds;

use crate::tree::{BoxedTreeStorage, Entry, Iter, Keys, Range, TreeMap, Values};
use crate::{Compare, Full, Key, Natural};

type Inner<K, V, Idx, C> = TreeMap<K, V, BoxedTreeStorage<K, V, Idx>, Idx, C>;

/// An ordered map that owns its storage.
///
/// This is a convenience wrapper around [`TreeMap`] + [`BoxedTreeStorage`] for
/// cases where you don't need to share storage across multiple structures.
///
/// # Example
///
/// ```
/// use nexus_forest::OwnedMap;
///
/// let mut map: OwnedMap<u64, String> = OwnedMap::with_capacity(100);
///
/// map.try_insert(100, "first".into()).unwrap();
/// map.try_insert(50, "second".into()).unwrap();
///
/// assert_eq!(map.get(&50), Some(&"second".into()));
/// assert_eq!(map.first(), Some((&50, &"second".into())));
///
/// let keys: Vec<_> = map.keys().copied().collect();
/// assert_eq!(keys, vec![50, 100]);
/// ```
pub struct OwnedMap<K, V, Idx: Key = u32, C = Natural> {
    storage: BoxedTreeStorage<K, V, Idx>,
    map: Inner<K, V, Idx, C>,
}

impl<K: Ord, V, Idx: Key> OwnedMap<K, V, Idx, Natural> {
    /// Creates an empty map holding at most `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_comparator(capacity, Natural)
    }
}

impl<K, V, Idx: Key, C: Compare<K>> OwnedMap<K, V, Idx, C> {
    /// Creates an empty map ordered by `cmp`.
    pub fn with_capacity_and_comparator(capacity: usize, cmp: C) -> Self {
        Self {
            storage: BoxedTreeStorage::with_capacity(capacity),
            map: TreeMap::with_comparator(cmp),
        }
    }

    /// Returns the number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if the map is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns the storage capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.capacity()
    }

    /// Returns `true` if the map contains `key`.
    #[inline]
    pub fn contains_key(&self, key: &K) -> bool {
        self.map.contains_key(&self.storage, key)
    }

    // ========================================================================
    // Access
    // ========================================================================

    /// Returns a reference to the value for `key`.
    #[inline]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.map.get(&self.storage, key)
    }

    /// Returns a mutable reference to the value for `key`.
    #[inline]
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.map.get_mut(&mut self.storage, key)
    }

    /// Returns the smallest entry.
    #[inline]
    pub fn first(&self) -> Option<(&K, &V)> {
        self.map.first(&self.storage)
    }

    /// Returns the largest entry.
    #[inline]
    pub fn last(&self) -> Option<(&K, &V)> {
        self.map.last(&self.storage)
    }

    // ========================================================================
    // Insert / remove
    // ========================================================================

    /// Inserts a key-value pair, returning the previous value for an equal
    /// key.
    ///
    /// # Errors
    ///
    /// Returns `Err(Full((key, value)))` if storage is full.
    #[inline]
    pub fn try_insert(&mut self, key: K, value: V) -> Result<Option<V>, Full<(K, V)>> {
        self.map.try_insert(&mut self.storage, key, value)
    }

    /// Removes `key`, returning its value.
    #[inline]
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.map.remove(&mut self.storage, key)
    }

    /// Removes and returns the smallest entry.
    #[inline]
    pub fn pop_first(&mut self) -> Option<(K, V)> {
        self.map.pop_first(&mut self.storage)
    }

    /// Removes and returns the largest entry.
    #[inline]
    pub fn pop_last(&mut self) -> Option<(K, V)> {
        self.map.pop_last(&mut self.storage)
    }

    /// Removes every entry.
    #[inline]
    pub fn clear(&mut self) {
        self.map.clear(&mut self.storage);
    }

    /// Gets the entry for `key`.
    #[inline]
    pub fn entry(&mut self, key: K) -> Entry<'_, K, V, BoxedTreeStorage<K, V, Idx>, Idx, C> {
        self.map.entry(&mut self.storage, key)
    }

    // ========================================================================
    // Iteration
    // ========================================================================

    /// Iterates entries in key order.
    #[inline]
    pub fn iter(&self) -> Iter<'_, K, V, BoxedTreeStorage<K, V, Idx>, Idx> {
        self.map.iter(&self.storage)
    }

    /// Iterates keys in order.
    #[inline]
    pub fn keys(&self) -> Keys<'_, K, V, BoxedTreeStorage<K, V, Idx>, Idx> {
        self.map.keys(&self.storage)
    }

    /// Iterates values in key order.
    #[inline]
    pub fn values(&self) -> Values<'_, K, V, BoxedTreeStorage<K, V, Idx>, Idx> {
        self.map.values(&self.storage)
    }

    /// Iterates the entries whose keys fall inside `range`.
    #[inline]
    pub fn range<R: RangeBounds<K>>(&self, range: R) -> Range<'_, K, V, BoxedTreeStorage<K, V, Idx>, Idx> {
        self.map.range(&self.storage, range)
    }

    /// Checks every structural invariant of the underlying tree.
    #[inline]
    pub fn validate(&self) -> bool {
        self.map.validate(&self.storage)
    }
}
