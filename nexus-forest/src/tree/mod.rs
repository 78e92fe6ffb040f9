//! Rank-balanced (WAVL) ordered map over external storage.
//!
//! A weak AVL tree keeps a rank per node such that every rank difference
//! between parent and child is 1 or 2 and every leaf has rank 0. That bounds
//! height by `2 log2(n)` and keeps every operation strictly O(log n). Ranks are
//! never stored: each node keeps one parity bit, and because differences are
//! only ever 1 or 2, a child whose parity differs from its parent's is a
//! 1-child and one with equal parity is a 2-child. The `NONE` handle acts as
//! the sentinel end node with rank -1 (parity 1).
//!
//! Insertion promotes up the tree and finishes with at most one single or
//! double rotation. Deletion demotes up the tree and also finishes with at
//! most one rotation, returning immediately after it.
//!
//! # Allocating and non-allocating use
//!
//! The map moves values into storage itself (`try_insert`, `insert`, entry
//! API) and frees them on removal. Alternatively the caller stores a
//! [`TreeNode`] and only asks the map to [`link`](TreeMap::link) and
//! [`unlink`](TreeMap::unlink) it; the slot is never freed by the map.
//!
//! # Storage Invariant
//!
//! A map instance must always be used with the same storage instance. This is
//! the caller's responsibility (same discipline as the `slab` crate).
//!
//! # Example
//!
//! ```
//! use nexus_forest::{BoxedTreeStorage, TreeMap};
//!
//! let mut storage: BoxedTreeStorage<u64, &str> = BoxedTreeStorage::with_capacity(16);
//! let mut map: TreeMap<u64, &str, _> = TreeMap::new();
//!
//! map.try_insert(&mut storage, 5, "five").unwrap();
//! map.try_insert(&mut storage, 1, "one").unwrap();
//! map.try_insert(&mut storage, 3, "three").unwrap();
//!
//! let keys: Vec<_> = map.keys(&storage).copied().collect();
//! assert_eq!(keys, [1, 3, 5]);
//!
//! assert_eq!(map.remove(&mut storage, &3), Some("three"));
//! assert!(map.validate(&storage));
//! ```

mod entry;
mod iter;

use core::cmp::Ordering;
use core::fmt;
use core::marker::PhantomData;
use core::ops::{Bound, RangeBounds};

use tracing::{debug, trace};

use crate::{BoundedStorage, BoxedStorage, Compare, Full, Key, LinkError, Natural, Storage, UnboundedStorage};

pub use entry::{Entry, OccupiedEntry, VacantEntry};
pub use iter::{Iter, Keys, Range, Values};

/// Type alias for bounded tree storage backed by a boxed allocation.
pub type BoxedTreeStorage<K, V, Idx = u32> = BoxedStorage<TreeNode<K, V, Idx>, Idx>;

/// Type alias for unbounded tree storage backed by `slab::Slab`.
#[cfg(feature = "slab")]
pub type SlabTreeStorage<K, V> = slab::Slab<TreeNode<K, V, usize>>;

const LEFT: usize = 0;
const RIGHT: usize = 1;

/// A key-value record with embedded tree links.
///
/// The links are two children indexed by direction, a parent, and the rank
/// parity bit. Only the map touches them; the key is read-only once the node
/// is linked.
#[derive(Debug)]
pub struct TreeNode<K, V, Idx: Key = u32> {
    key: K,
    value: V,
    branch: [Idx; 2],
    parent: Idx,
    parity: bool,
}

impl<K, V, Idx: Key> TreeNode<K, V, Idx> {
    /// Creates an unlinked node.
    #[inline]
    pub fn new(key: K, value: V) -> Self {
        Self {
            key,
            value,
            branch: [Idx::NONE; 2],
            parent: Idx::NONE,
            parity: false,
        }
    }

    /// Returns the key.
    #[inline]
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Returns the value.
    #[inline]
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Returns the value mutably. The key stays fixed.
    #[inline]
    pub fn value_mut(&mut self) -> &mut V {
        &mut self.value
    }

    /// Consumes the node, returning its key and value.
    #[inline]
    pub fn into_parts(self) -> (K, V) {
        (self.key, self.value)
    }

    #[inline]
    fn reset(&mut self) {
        self.branch = [Idx::NONE; 2];
        self.parent = Idx::NONE;
        self.parity = false;
    }

    #[inline]
    fn is_leaf(&self) -> bool {
        self.branch[LEFT].is_none() && self.branch[RIGHT].is_none()
    }
}

// =============================================================================
// Link access
// =============================================================================

#[inline]
fn node<K, V, Idx, S>(storage: &S, idx: Idx) -> &TreeNode<K, V, Idx>
where
    Idx: Key,
    S: Storage<TreeNode<K, V, Idx>, Key = Idx>,
{
    storage.get(idx).expect("tree link points at a vacant slot")
}

#[inline]
fn node_mut<K, V, Idx, S>(storage: &mut S, idx: Idx) -> &mut TreeNode<K, V, Idx>
where
    Idx: Key,
    S: Storage<TreeNode<K, V, Idx>, Key = Idx>,
{
    storage.get_mut(idx).expect("tree link points at a vacant slot")
}

/// Walks from `idx` as far as possible toward `dir`.
fn extreme<K, V, Idx, S>(storage: &S, mut idx: Idx, dir: usize) -> Idx
where
    Idx: Key,
    S: Storage<TreeNode<K, V, Idx>, Key = Idx>,
{
    loop {
        let next = node(storage, idx).branch[dir];
        if next.is_none() {
            return idx;
        }
        idx = next;
    }
}

/// In-order neighbor of `idx`: `RIGHT` gives the successor, `LEFT` the
/// predecessor, `NONE` past either end.
fn step<K, V, Idx, S>(storage: &S, idx: Idx, dir: usize) -> Idx
where
    Idx: Key,
    S: Storage<TreeNode<K, V, Idx>, Key = Idx>,
{
    let n = node(storage, idx);
    if n.branch[dir].is_some() {
        return extreme(storage, n.branch[dir], dir ^ 1);
    }

    let mut cur = idx;
    let mut parent = n.parent;
    while parent.is_some() {
        let p = node(storage, parent);
        if p.branch[dir] != cur {
            break;
        }
        cur = parent;
        parent = p.parent;
    }
    parent
}

#[cfg(test)]
thread_local! {
    /// Rotations performed on this thread.
    static ROTATIONS: core::cell::Cell<usize> = const { core::cell::Cell::new(0) };
}

#[inline]
fn dir_of(ord: Ordering) -> usize {
    (ord == Ordering::Greater) as usize
}

/// Result of a descent: the matching node when `ord` is `Equal`, otherwise
/// the would-be parent and the side the key belongs on.
#[derive(Debug, Clone, Copy)]
struct Query<Idx> {
    node: Idx,
    ord: Ordering,
}

// =============================================================================
// TreeMap
// =============================================================================

/// A rank-balanced ordered map over external storage.
///
/// # Type Parameters
///
/// - `K`: Key type
/// - `V`: Value type
/// - `S`: Storage type (e.g., [`BoxedTreeStorage<K, V>`])
/// - `Idx`: Storage handle type (default `u32`)
/// - `C`: Comparator over `K` (default [`Natural`])
pub struct TreeMap<K, V, S, Idx: Key = u32, C = Natural>
where
    S: Storage<TreeNode<K, V, Idx>, Key = Idx>,
{
    root: Idx,
    len: usize,
    cmp: C,
    _marker: PhantomData<(K, V, S)>,
}

impl<K, V, S, Idx: Key, C> fmt::Debug for TreeMap<K, V, S, Idx, C>
where
    S: Storage<TreeNode<K, V, Idx>, Key = Idx>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeMap")
            .field("root", &self.root)
            .field("len", &self.len)
            .finish()
    }
}

impl<K, V, S, Idx: Key, C> Default for TreeMap<K, V, S, Idx, C>
where
    S: Storage<TreeNode<K, V, Idx>, Key = Idx>,
    C: Compare<K> + Default,
{
    fn default() -> Self {
        Self::with_comparator(C::default())
    }
}

impl<K: Ord, V, S, Idx: Key> TreeMap<K, V, S, Idx, Natural>
where
    S: Storage<TreeNode<K, V, Idx>, Key = Idx>,
{
    /// Creates an empty map ordered by `K: Ord`.
    #[inline]
    pub const fn new() -> Self {
        Self::with_comparator(Natural)
    }
}

// =============================================================================
// Base impl - works with any Storage (search/link/remove operations)
// =============================================================================

impl<K, V, S, Idx: Key, C> TreeMap<K, V, S, Idx, C>
where
    S: Storage<TreeNode<K, V, Idx>, Key = Idx>,
    C: Compare<K>,
{
    /// Creates an empty map ordered by `cmp`.
    #[inline]
    pub const fn with_comparator(cmp: C) -> Self {
        Self {
            root: Idx::NONE,
            len: 0,
            cmp,
            _marker: PhantomData,
        }
    }

    /// Returns the number of linked nodes.
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the map is empty.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the comparator.
    #[inline]
    pub fn comparator(&self) -> &C {
        &self.cmp
    }

    // ========================================================================
    // Search
    // ========================================================================

    /// Returns the handle of the node with `key`, if linked.
    #[inline]
    pub fn find(&self, storage: &S, key: &K) -> Option<Idx> {
        let query = self.search(storage, key);
        (query.ord == Ordering::Equal).then_some(query.node)
    }

    /// Returns `true` if a node with `key` is linked.
    #[inline]
    pub fn contains_key(&self, storage: &S, key: &K) -> bool {
        self.find(storage, key).is_some()
    }

    /// Returns a reference to the value for `key`.
    #[inline]
    pub fn get<'a>(&self, storage: &'a S, key: &K) -> Option<&'a V>
    where
        K: 'a,
        V: 'a,
        Idx: 'a,
    {
        let idx = self.find(storage, key)?;
        Some(&node(storage, idx).value)
    }

    /// Returns a mutable reference to the value for `key`.
    #[inline]
    pub fn get_mut<'a>(&self, storage: &'a mut S, key: &K) -> Option<&'a mut V>
    where
        K: 'a,
        V: 'a,
        Idx: 'a,
    {
        let idx = self.find(storage, key)?;
        Some(&mut node_mut(storage, idx).value)
    }

    /// Returns the stored key and value for `key`.
    #[inline]
    pub fn get_key_value<'a>(&self, storage: &'a S, key: &K) -> Option<(&'a K, &'a V)>
    where
        K: 'a,
        V: 'a,
        Idx: 'a,
    {
        let idx = self.find(storage, key)?;
        let n = node(storage, idx);
        Some((&n.key, &n.value))
    }

    /// Returns `true` if `idx` is linked into this map.
    ///
    /// A node that is the root of a *different* map sharing the storage is
    /// reported as unlinked. [`link`](Self::link) still rejects such a root
    /// unless that map holds only it.
    #[inline]
    pub fn is_linked(&self, storage: &S, idx: Idx) -> bool {
        storage
            .get(idx)
            .is_some_and(|n| n.parent.is_some() || self.root == idx)
    }

    /// Returns the key and value of a linked node by handle.
    #[inline]
    pub fn entry_at<'a>(&self, storage: &'a S, idx: Idx) -> Option<(&'a K, &'a V)>
    where
        K: 'a,
        V: 'a,
        Idx: 'a,
    {
        if !self.is_linked(storage, idx) {
            return None;
        }
        let n = node(storage, idx);
        Some((&n.key, &n.value))
    }

    // ========================================================================
    // Ordered access
    // ========================================================================

    /// Returns the handle of the smallest key.
    #[inline]
    pub fn first_key(&self, storage: &S) -> Option<Idx> {
        self.end_key(storage, LEFT)
    }

    /// Returns the handle of the largest key.
    #[inline]
    pub fn last_key(&self, storage: &S) -> Option<Idx> {
        self.end_key(storage, RIGHT)
    }

    /// Returns the handle following `idx` in key order, or `None` at the end.
    ///
    /// `idx` must be linked into this map.
    #[inline]
    pub fn next_key(&self, storage: &S, idx: Idx) -> Option<Idx> {
        debug_assert!(self.is_linked(storage, idx), "next_key on an unlinked node");
        let next = step(storage, idx, RIGHT);
        next.is_some().then_some(next)
    }

    /// Returns the handle preceding `idx` in key order, or `None` at the start.
    ///
    /// `idx` must be linked into this map.
    #[inline]
    pub fn prev_key(&self, storage: &S, idx: Idx) -> Option<Idx> {
        debug_assert!(self.is_linked(storage, idx), "prev_key on an unlinked node");
        let prev = step(storage, idx, LEFT);
        prev.is_some().then_some(prev)
    }

    /// Returns the smallest key and its value.
    #[inline]
    pub fn first<'a>(&self, storage: &'a S) -> Option<(&'a K, &'a V)>
    where
        K: 'a,
        V: 'a,
        Idx: 'a,
    {
        let n = node(storage, self.first_key(storage)?);
        Some((&n.key, &n.value))
    }

    /// Returns the largest key and its value.
    #[inline]
    pub fn last<'a>(&self, storage: &'a S) -> Option<(&'a K, &'a V)>
    where
        K: 'a,
        V: 'a,
        Idx: 'a,
    {
        let n = node(storage, self.last_key(storage)?);
        Some((&n.key, &n.value))
    }

    /// Iterates in ascending key order. Use `.rev()` for descending order.
    #[inline]
    pub fn iter<'a>(&self, storage: &'a S) -> Iter<'a, K, V, S, Idx> {
        let front = self.first_key(storage).unwrap_or(Idx::NONE);
        let back = self.last_key(storage).unwrap_or(Idx::NONE);
        Iter::new(storage, front, back, self.len)
    }

    /// Iterates keys in ascending order.
    #[inline]
    pub fn keys<'a>(&self, storage: &'a S) -> Keys<'a, K, V, S, Idx> {
        Keys::new(self.iter(storage))
    }

    /// Iterates values in ascending key order.
    #[inline]
    pub fn values<'a>(&self, storage: &'a S) -> Values<'a, K, V, S, Idx> {
        Values::new(self.iter(storage))
    }

    /// Iterates the entries whose keys fall inside `range`, ascending.
    ///
    /// Use `.rev()` for the descending range. An inverted range is empty.
    ///
    /// # Example
    ///
    /// ```
    /// use nexus_forest::{BoxedTreeStorage, TreeMap};
    ///
    /// let mut storage: BoxedTreeStorage<u32, ()> = BoxedTreeStorage::with_capacity(16);
    /// let mut map: TreeMap<u32, (), _> = TreeMap::new();
    /// for k in [10, 20, 30, 40] {
    ///     map.try_insert(&mut storage, k, ()).unwrap();
    /// }
    ///
    /// let up: Vec<_> = map.range(&storage, 15..=30).map(|(k, _)| *k).collect();
    /// assert_eq!(up, [20, 30]);
    ///
    /// let down: Vec<_> = map.range(&storage, ..40).rev().map(|(k, _)| *k).collect();
    /// assert_eq!(down, [30, 20, 10]);
    /// ```
    pub fn range<'a, R>(&self, storage: &'a S, range: R) -> Range<'a, K, V, S, Idx>
    where
        R: RangeBounds<K>,
    {
        let front = self.lower_bound(storage, range.start_bound());
        let back = self.upper_bound(storage, range.end_bound());
        let empty = front.is_none()
            || back.is_none()
            || self
                .cmp
                .compare(&node(storage, front).key, &node(storage, back).key)
                == Ordering::Greater;

        if empty {
            Range::new(storage, Idx::NONE, Idx::NONE)
        } else {
            Range::new(storage, front, back)
        }
    }

    // ========================================================================
    // Link operations (no alloc/dealloc)
    // ========================================================================

    /// Links a node the caller already placed in storage.
    ///
    /// # Errors
    ///
    /// - [`LinkError::InvalidKey`] if `idx` is not occupied
    /// - [`LinkError::AlreadyLinked`] if the node is already in the map
    /// - [`LinkError::Occupied`] if an equal key is linked; nothing changes
    ///
    /// # Example
    ///
    /// ```
    /// use nexus_forest::{BoundedStorage, BoxedTreeStorage, Storage, TreeMap, TreeNode};
    ///
    /// let mut storage: BoxedTreeStorage<u32, &str> = BoxedTreeStorage::with_capacity(4);
    /// let mut map: TreeMap<u32, &str, _> = TreeMap::new();
    ///
    /// let idx = storage.try_insert(TreeNode::new(7, "seven")).unwrap();
    /// map.link(&mut storage, idx).unwrap();
    /// assert_eq!(map.get(&storage, &7), Some(&"seven"));
    ///
    /// // Unlinking leaves the node in storage for the caller to reuse.
    /// assert!(map.unlink(&mut storage, idx));
    /// assert!(map.is_empty());
    /// assert!(storage.get(idx).is_some());
    /// ```
    pub fn link(&mut self, storage: &mut S, idx: Idx) -> Result<(), LinkError> {
        let query = self.probe(storage, idx)?;
        if query.ord == Ordering::Equal {
            return Err(LinkError::Occupied);
        }
        self.attach(storage, idx, query.node, dir_of(query.ord));
        Ok(())
    }

    /// Links a stored node, displacing a linked node with an equal key.
    ///
    /// The displaced node takes no part in rebalancing: the new node inherits
    /// its position and rank. Returns the displaced handle, unlinked and still
    /// in storage.
    ///
    /// # Errors
    ///
    /// [`LinkError::InvalidKey`] or [`LinkError::AlreadyLinked`], as for
    /// [`link`](Self::link).
    pub fn link_or_replace(&mut self, storage: &mut S, idx: Idx) -> Result<Option<Idx>, LinkError> {
        let query = self.probe(storage, idx)?;
        if query.ord == Ordering::Equal {
            self.transplant(storage, query.node, idx);
            node_mut(storage, query.node).reset();
            return Ok(Some(query.node));
        }
        self.attach(storage, idx, query.node, dir_of(query.ord));
        Ok(None)
    }

    /// Unlinks a node without freeing its slot.
    ///
    /// Returns `false` if `idx` was not linked.
    pub fn unlink(&mut self, storage: &mut S, idx: Idx) -> bool {
        if !self.is_linked(storage, idx) {
            return false;
        }
        self.detach(storage, idx);
        true
    }

    /// Unlinks every node without freeing any slot.
    pub fn unlink_all(&mut self, storage: &mut S) {
        self.dismantle(storage, |storage, idx| node_mut(storage, idx).reset());
    }

    // ========================================================================
    // Remove operations (unlink + deallocate)
    // ========================================================================

    /// Removes `key`, returning its value.
    #[inline]
    pub fn remove(&mut self, storage: &mut S, key: &K) -> Option<V> {
        self.remove_entry(storage, key).map(|(_, value)| value)
    }

    /// Removes `key`, returning the stored key and value.
    pub fn remove_entry(&mut self, storage: &mut S, key: &K) -> Option<(K, V)> {
        let idx = self.find(storage, key)?;
        self.detach(storage, idx);
        storage.remove(idx).map(TreeNode::into_parts)
    }

    /// Removes a linked node by handle.
    ///
    /// Returns `None` if `idx` is not linked.
    pub fn remove_at(&mut self, storage: &mut S, idx: Idx) -> Option<(K, V)> {
        if !self.is_linked(storage, idx) {
            return None;
        }
        self.detach(storage, idx);
        storage.remove(idx).map(TreeNode::into_parts)
    }

    /// Removes and returns the smallest entry.
    pub fn pop_first(&mut self, storage: &mut S) -> Option<(K, V)> {
        let idx = self.first_key(storage)?;
        self.detach(storage, idx);
        storage.remove(idx).map(TreeNode::into_parts)
    }

    /// Removes and returns the largest entry.
    pub fn pop_last(&mut self, storage: &mut S) -> Option<(K, V)> {
        let idx = self.last_key(storage)?;
        self.detach(storage, idx);
        storage.remove(idx).map(TreeNode::into_parts)
    }

    /// Removes every node, freeing their slots.
    ///
    /// Runs in O(n) without recursion or allocation.
    pub fn clear(&mut self, storage: &mut S) {
        self.dismantle(storage, |storage, idx| {
            storage.remove(idx);
        });
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Checks every structural invariant.
    ///
    /// Verifies key ordering per subtree, parent back-links, the rank rule
    /// (all rank differences 1 or 2, all leaves rank 0), and the count.
    /// O(n); meant for tests and debug builds. Each failure is reported with
    /// a `debug!` event naming the offending handle.
    pub fn validate(&self, storage: &S) -> bool {
        if self.root.is_none() {
            if self.len != 0 {
                debug!(len = self.len, "empty tree with a nonzero count");
                return false;
            }
            return true;
        }

        match storage.get(self.root) {
            Some(root) if root.parent.is_none() => {}
            _ => {
                debug!(root = ?self.root, "root is vacant or has a parent");
                return false;
            }
        }

        let mut count = 0;
        if self
            .validate_subtree(storage, self.root, None, None, &mut count)
            .is_none()
        {
            return false;
        }
        if count != self.len {
            debug!(count, len = self.len, "reachable nodes disagree with the count");
            return false;
        }
        true
    }

    /// Returns the rank of the subtree at `idx`, or `None` on any violation.
    fn validate_subtree(
        &self,
        storage: &S,
        idx: Idx,
        lo: Option<&K>,
        hi: Option<&K>,
        count: &mut usize,
    ) -> Option<i64> {
        if idx.is_none() {
            return Some(-1);
        }

        *count += 1;
        if *count > self.len {
            debug!(?idx, len = self.len, "more reachable nodes than the count");
            return None;
        }

        let Some(n) = storage.get(idx) else {
            debug!(?idx, "linked handle is vacant in storage");
            return None;
        };

        let below_lo = lo.is_some_and(|lo| self.cmp.compare(&n.key, lo) != Ordering::Greater);
        let above_hi = hi.is_some_and(|hi| self.cmp.compare(&n.key, hi) != Ordering::Less);
        if below_lo || above_hi {
            debug!(?idx, "key outside its subtree bounds");
            return None;
        }

        let mut ranks = [0i64; 2];
        for dir in [LEFT, RIGHT] {
            let child = n.branch[dir];
            if child.is_some() && storage.get(child).is_none_or(|c| c.parent != idx) {
                debug!(?idx, ?child, "child does not link back to its parent");
                return None;
            }

            let (child_lo, child_hi) = if dir == LEFT {
                (lo, Some(&n.key))
            } else {
                (Some(&n.key), hi)
            };
            let child_rank = self.validate_subtree(storage, child, child_lo, child_hi, count)?;
            let gap = if Self::parity(storage, child) != n.parity { 1 } else { 2 };
            ranks[dir] = child_rank + gap;
        }

        if ranks[LEFT] != ranks[RIGHT] {
            debug!(?idx, left = ranks[LEFT], right = ranks[RIGHT], "rank differences break the rank rule");
            return None;
        }
        if n.is_leaf() && ranks[LEFT] != 0 {
            debug!(?idx, rank = ranks[LEFT], "leaf with nonzero rank");
            return None;
        }
        Some(ranks[LEFT])
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn search(&self, storage: &S, key: &K) -> Query<Idx> {
        let mut query = Query {
            node: Idx::NONE,
            ord: Ordering::Less,
        };
        let mut cur = self.root;
        while cur.is_some() {
            let n = node(storage, cur);
            query = Query {
                node: cur,
                ord: self.cmp.compare(key, &n.key),
            };
            if query.ord == Ordering::Equal {
                break;
            }
            cur = n.branch[dir_of(query.ord)];
        }
        query
    }

    /// Checks that `idx` is a stored, unlinked node and searches for its key.
    ///
    /// Unlinked nodes have no children, so this also rejects the root of any
    /// other non-empty map of two or more nodes.
    fn probe(&self, storage: &S, idx: Idx) -> Result<Query<Idx>, LinkError> {
        let n = storage.get(idx).ok_or(LinkError::InvalidKey)?;
        if n.parent.is_some() || self.root == idx || !n.is_leaf() {
            return Err(LinkError::AlreadyLinked);
        }
        Ok(self.search(storage, &n.key))
    }

    fn end_key(&self, storage: &S, dir: usize) -> Option<Idx> {
        if self.root.is_none() {
            return None;
        }
        Some(extreme(storage, self.root, dir))
    }

    /// First node inside `bound` from below.
    fn lower_bound(&self, storage: &S, bound: Bound<&K>) -> Idx {
        let mut best = Idx::NONE;
        let mut cur = self.root;
        while cur.is_some() {
            let n = node(storage, cur);
            let inside = match bound {
                Bound::Included(k) => self.cmp.compare(&n.key, k) != Ordering::Less,
                Bound::Excluded(k) => self.cmp.compare(&n.key, k) == Ordering::Greater,
                Bound::Unbounded => true,
            };
            if inside {
                best = cur;
                cur = n.branch[LEFT];
            } else {
                cur = n.branch[RIGHT];
            }
        }
        best
    }

    /// Last node inside `bound` from above.
    fn upper_bound(&self, storage: &S, bound: Bound<&K>) -> Idx {
        let mut best = Idx::NONE;
        let mut cur = self.root;
        while cur.is_some() {
            let n = node(storage, cur);
            let inside = match bound {
                Bound::Included(k) => self.cmp.compare(&n.key, k) != Ordering::Greater,
                Bound::Excluded(k) => self.cmp.compare(&n.key, k) == Ordering::Less,
                Bound::Unbounded => true,
            };
            if inside {
                best = cur;
                cur = n.branch[RIGHT];
            } else {
                cur = n.branch[LEFT];
            }
        }
        best
    }

    #[inline]
    fn parity(storage: &S, idx: Idx) -> bool {
        idx.is_none() || node(storage, idx).parity
    }

    /// Promotes or demotes `idx` by one rank.
    #[inline]
    fn flip(storage: &mut S, idx: Idx) {
        let n = node_mut(storage, idx);
        n.parity = !n.parity;
    }

    #[inline]
    fn branch(storage: &S, idx: Idx, dir: usize) -> Idx {
        node(storage, idx).branch[dir]
    }

    #[inline]
    fn parent_of(storage: &S, idx: Idx) -> Idx {
        node(storage, idx).parent
    }

    #[inline]
    fn set_parent(storage: &mut S, idx: Idx, parent: Idx) {
        if idx.is_some() {
            node_mut(storage, idx).parent = parent;
        }
    }

    #[inline]
    fn is_leaf(storage: &S, idx: Idx) -> bool {
        node(storage, idx).is_leaf()
    }

    /// Points the link that held `old` under `parent` (or the root) at `new`.
    fn replace_child(&mut self, storage: &mut S, parent: Idx, old: Idx, new: Idx) {
        if parent.is_none() {
            self.root = new;
            return;
        }
        let p = node_mut(storage, parent);
        let dir = (p.branch[RIGHT] == old) as usize;
        p.branch[dir] = new;
    }

    /// Puts `new` in `old`'s place: same parent, children and rank.
    fn transplant(&mut self, storage: &mut S, old: Idx, new: Idx) {
        let (branch, parent, parity) = {
            let o = node(storage, old);
            (o.branch, o.parent, o.parity)
        };
        {
            let n = node_mut(storage, new);
            n.branch = branch;
            n.parent = parent;
            n.parity = parity;
        }
        self.replace_child(storage, parent, old, new);
        Self::set_parent(storage, branch[LEFT], new);
        Self::set_parent(storage, branch[RIGHT], new);
    }

    /// Lifts `x`, the child of `z` on side `dir`, above `z`. Ranks untouched.
    fn rotate(&mut self, storage: &mut S, z: Idx, x: Idx, dir: usize) {
        trace!(?z, ?x, "rotate");
        #[cfg(test)]
        ROTATIONS.with(|r| r.set(r.get() + 1));
        let g = Self::parent_of(storage, z);
        let inner = Self::branch(storage, x, dir ^ 1);

        node_mut(storage, z).branch[dir] = inner;
        Self::set_parent(storage, inner, z);

        node_mut(storage, x).branch[dir ^ 1] = z;
        node_mut(storage, z).parent = x;

        node_mut(storage, x).parent = g;
        self.replace_child(storage, g, z, x);
    }

    /// Lifts `y`, the inner grandchild of `z` through `x`, above both.
    fn double_rotate(&mut self, storage: &mut S, z: Idx, x: Idx, y: Idx, dir: usize) {
        self.rotate(storage, x, y, dir ^ 1);
        self.rotate(storage, z, y, dir);
    }

    /// Links a fresh node under `parent` on side `dir` and rebalances.
    fn attach(&mut self, storage: &mut S, idx: Idx, parent: Idx, dir: usize) {
        let n = node_mut(storage, idx);
        n.reset();
        n.parent = parent;
        self.len += 1;

        if parent.is_none() {
            self.root = idx;
            return;
        }

        let p = node_mut(storage, parent);
        p.branch[dir] = idx;
        // Rank 0 parent means it was a leaf and the new node is a 0-child.
        if !p.parity {
            self.insert_fixup(storage, idx);
        }
    }

    /// Restores the rank rule while `x` is a 0-child.
    fn insert_fixup(&mut self, storage: &mut S, mut x: Idx) {
        loop {
            let p = Self::parent_of(storage, x);
            let dir = (Self::branch(storage, p, RIGHT) == x) as usize;
            let sibling = Self::branch(storage, p, dir ^ 1);

            if Self::parity(storage, sibling) != Self::parity(storage, p) {
                // p is 0,1: promote and carry the violation upward.
                Self::flip(storage, p);
                let g = Self::parent_of(storage, p);
                if g.is_none() || Self::parity(storage, g) != Self::parity(storage, p) {
                    return;
                }
                x = p;
                continue;
            }

            // p is 0,2: one rotation settles it.
            let inner = Self::branch(storage, x, dir ^ 1);
            if Self::parity(storage, inner) == Self::parity(storage, x) {
                self.rotate(storage, p, x, dir);
                Self::flip(storage, p);
            } else {
                self.double_rotate(storage, p, x, inner, dir);
                Self::flip(storage, inner);
                Self::flip(storage, x);
                Self::flip(storage, p);
            }
            return;
        }
    }

    /// Unlinks `idx` and rebalances. The slot stays in storage, reset.
    fn detach(&mut self, storage: &mut S, idx: Idx) {
        let (left, right, parent) = {
            let n = node(storage, idx);
            (n.branch[LEFT], n.branch[RIGHT], n.parent)
        };

        // `x` fills the vacated position under `p`; `two_child` records
        // whether the vacated position was a 2-child, making `x` a 3-child.
        let (x, p, two_child) = if left.is_none() || right.is_none() {
            let x = if left.is_none() { right } else { left };
            let two_child =
                parent.is_some() && Self::parity(storage, parent) == Self::parity(storage, idx);
            Self::set_parent(storage, x, parent);
            self.replace_child(storage, parent, idx, x);
            (x, parent, two_child)
        } else {
            let succ = extreme(storage, right, LEFT);
            let mut p = Self::parent_of(storage, succ);
            let x = Self::branch(storage, succ, RIGHT);
            let two_child = Self::parity(storage, p) == Self::parity(storage, succ);
            Self::set_parent(storage, x, p);
            self.replace_child(storage, p, succ, x);
            self.transplant(storage, idx, succ);
            if p == idx {
                p = succ;
            }
            (x, p, two_child)
        };

        if p.is_some() {
            if two_child {
                self.rebalance_3_child(storage, p, x);
            } else if x.is_none() && Self::is_leaf(storage, p) {
                // p lost its only child and is a 2,2 leaf of rank 1.
                Self::flip(storage, p);
                let g = Self::parent_of(storage, p);
                if g.is_some() && Self::parity(storage, g) != Self::parity(storage, p) {
                    self.rebalance_3_child(storage, g, p);
                }
            }
        }

        node_mut(storage, idx).reset();
        self.len -= 1;
    }

    /// Restores the rank rule while `x` is a 3-child of `p`.
    fn rebalance_3_child(&mut self, storage: &mut S, mut p: Idx, mut x: Idx) {
        loop {
            let dir = if Self::branch(storage, p, LEFT) == x { LEFT } else { RIGHT };
            let y = Self::branch(storage, p, dir ^ 1);
            let y_parity = Self::parity(storage, y);

            if y_parity == Self::parity(storage, p) {
                // Sibling is a 2-child: demote p.
                Self::flip(storage, p);
            } else {
                let outer = Self::branch(storage, y, dir ^ 1);
                let inner = Self::branch(storage, y, dir);
                let outer_two = Self::parity(storage, outer) == y_parity;
                let inner_two = Self::parity(storage, inner) == y_parity;

                if outer_two && inner_two {
                    // Sibling is 2,2: demote both.
                    Self::flip(storage, p);
                    Self::flip(storage, y);
                } else if !outer_two {
                    self.rotate(storage, p, y, dir ^ 1);
                    Self::flip(storage, y);
                    Self::flip(storage, p);
                    if Self::is_leaf(storage, p) {
                        Self::flip(storage, p);
                    }
                    return;
                } else {
                    // inner is promoted twice and p demoted twice: parities hold.
                    self.double_rotate(storage, p, y, inner, dir ^ 1);
                    Self::flip(storage, y);
                    return;
                }
            }

            let g = Self::parent_of(storage, p);
            if g.is_none() || Self::parity(storage, g) == Self::parity(storage, p) {
                return;
            }
            x = p;
            p = g;
        }
    }

    /// Post-order walk handing each node to `release` after cutting it loose.
    fn dismantle(&mut self, storage: &mut S, mut release: impl FnMut(&mut S, Idx)) {
        let mut cur = self.root;
        while cur.is_some() {
            let n = node(storage, cur);
            let child = if n.branch[LEFT].is_some() {
                n.branch[LEFT]
            } else {
                n.branch[RIGHT]
            };
            if child.is_some() {
                cur = child;
                continue;
            }

            let parent = n.parent;
            if parent.is_some() {
                let p = node_mut(storage, parent);
                let dir = (p.branch[RIGHT] == cur) as usize;
                p.branch[dir] = Idx::NONE;
            }
            release(storage, cur);
            cur = parent;
        }

        self.root = Idx::NONE;
        self.len = 0;
    }
}

// =============================================================================
// Bounded storage impl - fallible insertion
// =============================================================================

impl<K, V, S, Idx: Key, C> TreeMap<K, V, S, Idx, C>
where
    S: BoundedStorage<TreeNode<K, V, Idx>, Key = Idx>,
    C: Compare<K>,
{
    /// Inserts a key-value pair, overwriting the value of an equal key.
    ///
    /// Returns the previous value if the key was present.
    ///
    /// # Errors
    ///
    /// Returns `Err(Full((key, value)))` if storage is full. The map is
    /// unchanged.
    pub fn try_insert(&mut self, storage: &mut S, key: K, value: V) -> Result<Option<V>, Full<(K, V)>> {
        let query = self.search(storage, &key);
        if query.ord == Ordering::Equal {
            let n = node_mut(storage, query.node);
            return Ok(Some(core::mem::replace(&mut n.value, value)));
        }

        let idx = storage
            .try_insert(TreeNode::new(key, value))
            .map_err(|Full(n)| Full(n.into_parts()))?;
        self.attach(storage, idx, query.node, dir_of(query.ord));
        Ok(None)
    }
}

// =============================================================================
// Unbounded storage impl - infallible insertion
// =============================================================================

impl<K, V, S, Idx: Key, C> TreeMap<K, V, S, Idx, C>
where
    S: UnboundedStorage<TreeNode<K, V, Idx>, Key = Idx>,
    C: Compare<K>,
{
    /// Inserts a key-value pair, overwriting the value of an equal key.
    ///
    /// Returns the previous value if the key was present.
    pub fn insert(&mut self, storage: &mut S, key: K, value: V) -> Option<V> {
        let query = self.search(storage, &key);
        if query.ord == Ordering::Equal {
            let n = node_mut(storage, query.node);
            return Some(core::mem::replace(&mut n.value, value));
        }

        let idx = storage.insert(TreeNode::new(key, value));
        self.attach(storage, idx, query.node, dir_of(query.ord));
        None
    }
}
