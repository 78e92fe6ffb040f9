//! Entry API for [`TreeMap`].
//!
//! One descent finds either the matching node or the vacant slot where the
//! key belongs. The entry remembers that slot, so a following insert links
//! without searching again.

use core::cmp::Ordering;

use super::{Query, TreeMap, TreeNode, dir_of, node, node_mut};
use crate::{BoundedStorage, Compare, Full, Key, Storage, UnboundedStorage};

/// A view into a single entry of a [`TreeMap`].
pub enum Entry<'a, K, V, S, Idx, C>
where
    Idx: Key,
    S: Storage<TreeNode<K, V, Idx>, Key = Idx>,
{
    /// An occupied entry.
    Occupied(OccupiedEntry<'a, K, V, S, Idx, C>),
    /// A vacant entry.
    Vacant(VacantEntry<'a, K, V, S, Idx, C>),
}

/// A linked node found by [`TreeMap::entry`].
pub struct OccupiedEntry<'a, K, V, S, Idx, C>
where
    Idx: Key,
    S: Storage<TreeNode<K, V, Idx>, Key = Idx>,
{
    map: &'a mut TreeMap<K, V, S, Idx, C>,
    storage: &'a mut S,
    idx: Idx,
}

/// The position where an absent key belongs.
pub struct VacantEntry<'a, K, V, S, Idx, C>
where
    Idx: Key,
    S: Storage<TreeNode<K, V, Idx>, Key = Idx>,
{
    map: &'a mut TreeMap<K, V, S, Idx, C>,
    storage: &'a mut S,
    key: K,
    parent: Idx,
    dir: usize,
}

impl<K, V, S, Idx, C> TreeMap<K, V, S, Idx, C>
where
    Idx: Key,
    S: Storage<TreeNode<K, V, Idx>, Key = Idx>,
    C: Compare<K>,
{
    /// Gets the entry for `key`.
    ///
    /// # Example
    ///
    /// ```
    /// use nexus_forest::{BoxedTreeStorage, TreeMap};
    ///
    /// let mut storage: BoxedTreeStorage<&str, u32> = BoxedTreeStorage::with_capacity(8);
    /// let mut counts: TreeMap<&str, u32, _> = TreeMap::new();
    ///
    /// for word in ["a", "b", "a"] {
    ///     *counts.entry(&mut storage, word).or_try_insert(0).unwrap() += 1;
    /// }
    /// assert_eq!(counts.get(&storage, &"a"), Some(&2));
    /// assert_eq!(counts.get(&storage, &"b"), Some(&1));
    /// ```
    pub fn entry<'a>(&'a mut self, storage: &'a mut S, key: K) -> Entry<'a, K, V, S, Idx, C> {
        let Query { node, ord } = self.search(storage, &key);

        if ord == Ordering::Equal {
            Entry::Occupied(OccupiedEntry {
                map: self,
                storage,
                idx: node,
            })
        } else {
            Entry::Vacant(VacantEntry {
                map: self,
                storage,
                key,
                parent: node,
                dir: dir_of(ord),
            })
        }
    }
}

impl<'a, K, V, S, Idx, C> Entry<'a, K, V, S, Idx, C>
where
    Idx: Key,
    S: Storage<TreeNode<K, V, Idx>, Key = Idx>,
    C: Compare<K>,
{
    /// Returns a reference to the key.
    pub fn key(&self) -> &K {
        match self {
            Entry::Occupied(e) => e.key(),
            Entry::Vacant(e) => &e.key,
        }
    }

    /// Modifies an existing entry before any insert.
    pub fn and_modify<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut V),
    {
        if let Entry::Occupied(ref mut e) = self {
            f(e.get_mut());
        }
        self
    }
}

impl<'a, K, V, S, Idx, C> Entry<'a, K, V, S, Idx, C>
where
    Idx: Key,
    S: BoundedStorage<TreeNode<K, V, Idx>, Key = Idx>,
    C: Compare<K>,
{
    /// Ensures a value is in the entry by inserting `default` if empty.
    ///
    /// # Errors
    ///
    /// Returns the key and value if storage is full.
    pub fn or_try_insert(self, default: V) -> Result<&'a mut V, Full<(K, V)>> {
        self.or_try_insert_with(|| default)
    }

    /// Ensures a value is in the entry by inserting the result of `f` if empty.
    ///
    /// # Errors
    ///
    /// Returns the key and value if storage is full.
    pub fn or_try_insert_with<F: FnOnce() -> V>(self, f: F) -> Result<&'a mut V, Full<(K, V)>> {
        match self {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(e) => e.try_insert(f()),
        }
    }
}

impl<'a, K, V, S, Idx, C> Entry<'a, K, V, S, Idx, C>
where
    Idx: Key,
    S: UnboundedStorage<TreeNode<K, V, Idx>, Key = Idx>,
    C: Compare<K>,
{
    /// Ensures a value is in the entry by inserting `default` if empty.
    pub fn or_insert(self, default: V) -> &'a mut V {
        self.or_insert_with(|| default)
    }

    /// Ensures a value is in the entry by inserting the result of `f` if empty.
    pub fn or_insert_with<F: FnOnce() -> V>(self, f: F) -> &'a mut V {
        match self {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => e.insert(f()),
        }
    }

    /// Like [`or_insert_with`](Self::or_insert_with), but `f` sees the key.
    pub fn or_insert_with_key<F: FnOnce(&K) -> V>(self, f: F) -> &'a mut V {
        match self {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                let value = f(&e.key);
                e.insert(value)
            }
        }
    }

    /// Ensures a value is in the entry by inserting the default value if empty.
    pub fn or_default(self) -> &'a mut V
    where
        V: Default,
    {
        self.or_insert_with(V::default)
    }
}

impl<'a, K, V, S, Idx, C> OccupiedEntry<'a, K, V, S, Idx, C>
where
    Idx: Key,
    S: Storage<TreeNode<K, V, Idx>, Key = Idx>,
    C: Compare<K>,
{
    /// Returns the storage handle of the node.
    #[inline]
    pub fn handle(&self) -> Idx {
        self.idx
    }

    /// Returns the stored key.
    #[inline]
    pub fn key(&self) -> &K {
        &node(&*self.storage, self.idx).key
    }

    /// Gets a reference to the value.
    #[inline]
    pub fn get(&self) -> &V {
        &node(&*self.storage, self.idx).value
    }

    /// Gets a mutable reference to the value.
    #[inline]
    pub fn get_mut(&mut self) -> &mut V {
        &mut node_mut(&mut *self.storage, self.idx).value
    }

    /// Converts to a mutable reference to the value.
    #[inline]
    pub fn into_mut(self) -> &'a mut V {
        &mut node_mut(self.storage, self.idx).value
    }

    /// Replaces the value, returning the old one.
    #[inline]
    pub fn insert(&mut self, value: V) -> V {
        core::mem::replace(self.get_mut(), value)
    }

    /// Removes the entry and returns the value.
    pub fn remove(self) -> V {
        self.remove_entry().1
    }

    /// Removes the entry and returns the stored key and value.
    pub fn remove_entry(self) -> (K, V) {
        self.map.detach(self.storage, self.idx);
        self.storage
            .remove(self.idx)
            .map(TreeNode::into_parts)
            .expect("occupied entry names a stored node")
    }
}

impl<'a, K, V, S, Idx, C> VacantEntry<'a, K, V, S, Idx, C>
where
    Idx: Key,
    S: Storage<TreeNode<K, V, Idx>, Key = Idx>,
{
    /// Returns the key that would be inserted.
    #[inline]
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Takes back the key.
    #[inline]
    pub fn into_key(self) -> K {
        self.key
    }
}

impl<'a, K, V, S, Idx, C> VacantEntry<'a, K, V, S, Idx, C>
where
    Idx: Key,
    S: BoundedStorage<TreeNode<K, V, Idx>, Key = Idx>,
    C: Compare<K>,
{
    /// Inserts `value` at the remembered position.
    ///
    /// # Errors
    ///
    /// Returns the key and value if storage is full. The map is unchanged.
    pub fn try_insert(self, value: V) -> Result<&'a mut V, Full<(K, V)>> {
        let VacantEntry {
            map,
            storage,
            key,
            parent,
            dir,
        } = self;

        let idx = storage
            .try_insert(TreeNode::new(key, value))
            .map_err(|Full(n)| Full(n.into_parts()))?;
        map.attach(storage, idx, parent, dir);
        Ok(&mut node_mut(storage, idx).value)
    }
}

impl<'a, K, V, S, Idx, C> VacantEntry<'a, K, V, S, Idx, C>
where
    Idx: Key,
    S: UnboundedStorage<TreeNode<K, V, Idx>, Key = Idx>,
    C: Compare<K>,
{
    /// Inserts `value` at the remembered position.
    pub fn insert(self, value: V) -> &'a mut V {
        let VacantEntry {
            map,
            storage,
            key,
            parent,
            dir,
        } = self;

        let idx = storage.insert(TreeNode::new(key, value));
        map.attach(storage, idx, parent, dir);
        &mut node_mut(storage, idx).value
    }
}
