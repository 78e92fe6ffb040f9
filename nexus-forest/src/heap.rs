//! Pairing heap over external storage with removal and re-keying by handle.
//!
//! The heap is a multiway tree: each node keeps a handle to its youngest
//! child, and siblings form a circular doubly linked ring through
//! `next`/`prev`. Following `next` from the youngest child walks toward older
//! siblings; the youngest's `prev` is the oldest.
//!
//! Push is one comparison. Pop removes the root and pairs its children from
//! oldest to youngest, folding each pair into a running accumulator, which
//! gives the amortized O(log n) bound.
//!
//! # Storage Invariant
//!
//! A heap instance must always be used with the same storage instance. This
//! is the caller's responsibility (same discipline as the `slab` crate).
//!
//! # Example
//!
//! ```
//! use nexus_forest::{BoxedHeapStorage, PairingHeap};
//!
//! let mut storage: BoxedHeapStorage<u64> = BoxedHeapStorage::with_capacity(16);
//! let mut heap: PairingHeap<u64, _> = PairingHeap::min();
//!
//! for v in [5, 3, 8, 1] {
//!     heap.try_push(&mut storage, v).unwrap();
//! }
//! assert_eq!(heap.front(&storage), Some(&1));
//!
//! assert_eq!(heap.pop(&mut storage), Some(1));
//! assert_eq!(heap.front(&storage), Some(&3));
//!
//! heap.try_push(&mut storage, 0).unwrap();
//! assert_eq!(heap.front(&storage), Some(&0));
//! ```

use core::cmp::Ordering;
use core::fmt;
use core::marker::PhantomData;

use tracing::{debug, trace};

use crate::{BoundedStorage, BoxedStorage, Compare, Full, Key, LinkError, Natural, Storage, UnboundedStorage};

/// Type alias for bounded heap storage backed by a boxed allocation.
pub type BoxedHeapStorage<T, Idx = u32> = BoxedStorage<HeapNode<T, Idx>, Idx>;

/// Type alias for unbounded heap storage backed by `slab::Slab`.
#[cfg(feature = "slab")]
pub type SlabHeapStorage<T> = slab::Slab<HeapNode<T, usize>>;

/// Which end of the order the heap serves first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HeapOrder {
    /// Smallest value first.
    #[default]
    Min,
    /// Largest value first.
    Max,
}

/// A value with embedded heap links.
#[derive(Debug)]
pub struct HeapNode<T, Idx: Key = u32> {
    data: T,
    child: Idx,
    next: Idx,
    prev: Idx,
    parent: Idx,
}

impl<T, Idx: Key> HeapNode<T, Idx> {
    /// Creates an unlinked node.
    #[inline]
    pub fn new(data: T) -> Self {
        Self {
            data,
            child: Idx::NONE,
            next: Idx::NONE,
            prev: Idx::NONE,
            parent: Idx::NONE,
        }
    }

    /// Returns the value.
    #[inline]
    pub fn value(&self) -> &T {
        &self.data
    }

    /// Consumes the node, returning the value.
    #[inline]
    pub fn into_inner(self) -> T {
        self.data
    }

    #[inline]
    fn reset(&mut self) {
        self.child = Idx::NONE;
        self.next = Idx::NONE;
        self.prev = Idx::NONE;
        self.parent = Idx::NONE;
    }
}

#[inline]
fn node<T, Idx, S>(storage: &S, idx: Idx) -> &HeapNode<T, Idx>
where
    Idx: Key,
    S: Storage<HeapNode<T, Idx>, Key = Idx>,
{
    storage.get(idx).expect("heap link points at a vacant slot")
}

#[inline]
fn node_mut<T, Idx, S>(storage: &mut S, idx: Idx) -> &mut HeapNode<T, Idx>
where
    Idx: Key,
    S: Storage<HeapNode<T, Idx>, Key = Idx>,
{
    storage.get_mut(idx).expect("heap link points at a vacant slot")
}

/// A pairing heap over external storage.
///
/// # Type Parameters
///
/// - `T`: Element type
/// - `S`: Storage type (e.g., [`BoxedHeapStorage<T>`])
/// - `Idx`: Storage handle type (default `u32`)
/// - `C`: Comparator over `T` (default [`Natural`])
pub struct PairingHeap<T, S, Idx: Key = u32, C = Natural>
where
    S: Storage<HeapNode<T, Idx>, Key = Idx>,
{
    root: Idx,
    len: usize,
    order: HeapOrder,
    cmp: C,
    _marker: PhantomData<(T, S)>,
}

impl<T, S, Idx: Key, C> fmt::Debug for PairingHeap<T, S, Idx, C>
where
    S: Storage<HeapNode<T, Idx>, Key = Idx>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PairingHeap")
            .field("root", &self.root)
            .field("len", &self.len)
            .field("order", &self.order)
            .finish()
    }
}

impl<T, S, Idx: Key, C> Default for PairingHeap<T, S, Idx, C>
where
    S: Storage<HeapNode<T, Idx>, Key = Idx>,
    C: Compare<T> + Default,
{
    fn default() -> Self {
        Self::with_comparator(HeapOrder::Min, C::default())
    }
}

impl<T: Ord, S, Idx: Key> PairingHeap<T, S, Idx, Natural>
where
    S: Storage<HeapNode<T, Idx>, Key = Idx>,
{
    /// Creates an empty heap ordered by `T: Ord`.
    #[inline]
    pub const fn new(order: HeapOrder) -> Self {
        Self::with_comparator(order, Natural)
    }

    /// Creates an empty min-heap.
    #[inline]
    pub const fn min() -> Self {
        Self::new(HeapOrder::Min)
    }

    /// Creates an empty max-heap.
    #[inline]
    pub const fn max() -> Self {
        Self::new(HeapOrder::Max)
    }
}

// =============================================================================
// Base impl - works with any Storage
// =============================================================================

impl<T, S, Idx: Key, C> PairingHeap<T, S, Idx, C>
where
    S: Storage<HeapNode<T, Idx>, Key = Idx>,
    C: Compare<T>,
{
    /// Creates an empty heap serving `order` first under `cmp`.
    #[inline]
    pub const fn with_comparator(order: HeapOrder, cmp: C) -> Self {
        Self {
            root: Idx::NONE,
            len: 0,
            order,
            cmp,
            _marker: PhantomData,
        }
    }

    /// Returns the configured order.
    #[inline]
    pub const fn order(&self) -> HeapOrder {
        self.order
    }

    /// Returns the number of linked nodes.
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the heap is empty.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the front value without removing it.
    #[inline]
    pub fn front<'a>(&self, storage: &'a S) -> Option<&'a T>
    where
        T: 'a,
        Idx: 'a,
    {
        let idx = self.front_key()?;
        Some(&node(storage, idx).data)
    }

    /// Returns the handle of the front node.
    #[inline]
    pub fn front_key(&self) -> Option<Idx> {
        self.root.is_some().then_some(self.root)
    }

    /// Returns `true` if `idx` is linked into this heap.
    #[inline]
    pub fn contains(&self, storage: &S, idx: Idx) -> bool {
        storage
            .get(idx)
            .is_some_and(|n| n.parent.is_some() || self.root == idx)
    }

    /// Returns the value of a linked node.
    #[inline]
    pub fn get<'a>(&self, storage: &'a S, idx: Idx) -> Option<&'a T>
    where
        T: 'a,
        Idx: 'a,
    {
        if !self.contains(storage, idx) {
            return None;
        }
        Some(&node(storage, idx).data)
    }

    // ========================================================================
    // Link operations (no alloc/dealloc)
    // ========================================================================

    /// Links a node the caller already placed in storage.
    ///
    /// # Errors
    ///
    /// [`LinkError::InvalidKey`] if `idx` is not occupied,
    /// [`LinkError::AlreadyLinked`] if it is already in this or another heap.
    pub fn link(&mut self, storage: &mut S, idx: Idx) -> Result<(), LinkError> {
        match storage.get(idx) {
            None => return Err(LinkError::InvalidKey),
            // Linked nodes always sit in a sibling ring.
            Some(n) if n.next.is_some() => return Err(LinkError::AlreadyLinked),
            Some(_) => {}
        }
        self.attach(storage, idx);
        Ok(())
    }

    /// Unlinks the front node without freeing its slot.
    pub fn unlink_front(&mut self, storage: &mut S) -> Option<Idx> {
        let idx = self.front_key()?;
        self.detach(storage, idx);
        Some(idx)
    }

    /// Unlinks any node without freeing its slot.
    ///
    /// Returns `false` if `idx` was not linked.
    pub fn unlink(&mut self, storage: &mut S, idx: Idx) -> bool {
        if !self.contains(storage, idx) {
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

    /// Removes and returns the front value.
    pub fn pop(&mut self, storage: &mut S) -> Option<T> {
        let idx = self.unlink_front(storage)?;
        storage.remove(idx).map(HeapNode::into_inner)
    }

    /// Removes a linked node by handle.
    ///
    /// Returns `None` if `idx` is not linked.
    pub fn remove(&mut self, storage: &mut S, idx: Idx) -> Option<T> {
        if !self.contains(storage, idx) {
            return None;
        }
        self.detach(storage, idx);
        storage.remove(idx).map(HeapNode::into_inner)
    }

    /// Removes every node, freeing their slots.
    pub fn clear(&mut self, storage: &mut S) {
        self.dismantle(storage, |storage, idx| {
            storage.remove(idx);
        });
    }

    // ========================================================================
    // Re-keying
    // ========================================================================

    /// Mutates a value whose change of direction is unknown.
    ///
    /// The node is cut and merged at the root only if it now compares
    /// strictly better than its parent. In every other case it is unlinked
    /// and linked again.
    ///
    /// # Errors
    ///
    /// [`LinkError::InvalidKey`] or [`LinkError::NotLinked`]; `f` is not
    /// called.
    pub fn update<F>(&mut self, storage: &mut S, idx: Idx, f: F) -> Result<(), LinkError>
    where
        F: FnOnce(&mut T),
    {
        self.mutate(storage, idx, f)?;

        let parent = node(storage, idx).parent;
        if parent.is_some() && self.better(storage, idx, parent) {
            trace!(?idx, "update: cut and merge");
            self.promote(storage, idx);
        } else {
            trace!(?idx, "update: relink");
            self.relink(storage, idx);
        }
        Ok(())
    }

    /// Mutates a value that only grew.
    ///
    /// On a max-heap the node moves toward the front by cut and merge. On a
    /// min-heap it is unlinked and linked again.
    ///
    /// # Errors
    ///
    /// [`LinkError::InvalidKey`] or [`LinkError::NotLinked`]; `f` is not
    /// called.
    pub fn increase<F>(&mut self, storage: &mut S, idx: Idx, f: F) -> Result<(), LinkError>
    where
        F: FnOnce(&mut T),
    {
        self.rekey(storage, idx, f, HeapOrder::Max)
    }

    /// Mutates a value that only shrank.
    ///
    /// On a min-heap the node moves toward the front by cut and merge. On a
    /// max-heap it is unlinked and linked again.
    ///
    /// # Errors
    ///
    /// [`LinkError::InvalidKey`] or [`LinkError::NotLinked`]; `f` is not
    /// called.
    ///
    /// # Example
    ///
    /// ```
    /// use nexus_forest::{BoxedHeapStorage, PairingHeap};
    ///
    /// let mut storage: BoxedHeapStorage<u32> = BoxedHeapStorage::with_capacity(8);
    /// let mut heap: PairingHeap<u32, _> = PairingHeap::min();
    ///
    /// heap.try_push(&mut storage, 5).unwrap();
    /// let e = heap.try_push(&mut storage, 10).unwrap();
    ///
    /// heap.decrease(&mut storage, e, |v| *v = 2).unwrap();
    /// assert_eq!(heap.front(&storage), Some(&2));
    /// ```
    pub fn decrease<F>(&mut self, storage: &mut S, idx: Idx, f: F) -> Result<(), LinkError>
    where
        F: FnOnce(&mut T),
    {
        self.rekey(storage, idx, f, HeapOrder::Min)
    }

    /// Applies `f`, then restores order knowing the value moved toward
    /// `toward`'s front.
    fn rekey<F>(&mut self, storage: &mut S, idx: Idx, f: F, toward: HeapOrder) -> Result<(), LinkError>
    where
        F: FnOnce(&mut T),
    {
        self.mutate(storage, idx, f)?;
        if toward == self.order {
            self.promote(storage, idx);
        } else {
            self.relink(storage, idx);
        }
        Ok(())
    }

    fn mutate<F>(&mut self, storage: &mut S, idx: Idx, f: F) -> Result<(), LinkError>
    where
        F: FnOnce(&mut T),
    {
        if storage.get(idx).is_none() {
            return Err(LinkError::InvalidKey);
        }
        if !self.contains(storage, idx) {
            return Err(LinkError::NotLinked);
        }
        f(&mut node_mut(storage, idx).data);
        Ok(())
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Checks every structural invariant.
    ///
    /// Verifies ring closure, parent back-links, that no child compares
    /// better than its parent, that the root stands alone, and the count.
    /// O(n); meant for tests and debug builds. Each failure is reported with
    /// a `debug!` event naming the offending handle.
    pub fn validate(&self, storage: &S) -> bool {
        if self.root.is_none() {
            if self.len != 0 {
                debug!(len = self.len, "empty heap with a nonzero count");
                return false;
            }
            return true;
        }

        match storage.get(self.root) {
            Some(r) if r.parent.is_none() && r.next == self.root && r.prev == self.root => {}
            _ => {
                debug!(root = ?self.root, "root is vacant, has a parent, or has siblings");
                return false;
            }
        }

        let mut count = 0usize;
        let mut stack = vec![self.root];
        while let Some(idx) = stack.pop() {
            count += 1;
            if count > self.len {
                debug!(?idx, len = self.len, "more reachable nodes than the count");
                return false;
            }

            let head = node(storage, idx).child;
            if head.is_none() {
                continue;
            }

            let mut cur = head;
            let mut ring = 0usize;
            loop {
                let Some(c) = storage.get(cur) else {
                    debug!(parent = ?idx, child = ?cur, "ring member is vacant in storage");
                    return false;
                };
                if c.parent != idx {
                    debug!(parent = ?idx, child = ?cur, "child does not link back to its parent");
                    return false;
                }
                if storage.get(c.next).is_none_or(|n| n.prev != cur) {
                    debug!(child = ?cur, next = ?c.next, "sibling ring is not closed");
                    return false;
                }
                if self.better(storage, cur, idx) {
                    debug!(parent = ?idx, child = ?cur, "child orders before its parent");
                    return false;
                }

                ring += 1;
                if ring > self.len {
                    debug!(parent = ?idx, "sibling ring never returns to its head");
                    return false;
                }
                stack.push(cur);
                cur = c.next;
                if cur == head {
                    break;
                }
            }
        }

        if count != self.len {
            debug!(count, len = self.len, "reachable nodes disagree with the count");
            return false;
        }
        true
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// `true` if `a` is served strictly before `b`.
    #[inline]
    fn better(&self, storage: &S, a: Idx, b: Idx) -> bool {
        let ord = self.cmp.compare(&node(storage, a).data, &node(storage, b).data);
        match self.order {
            HeapOrder::Min => ord == Ordering::Less,
            HeapOrder::Max => ord == Ordering::Greater,
        }
    }

    /// Makes `idx` a lone root: no parent, a ring of one.
    #[inline]
    fn make_root(storage: &mut S, idx: Idx) {
        let n = node_mut(storage, idx);
        n.parent = Idx::NONE;
        n.next = idx;
        n.prev = idx;
    }

    /// Links lone root `c` as the youngest child of `parent`.
    fn adopt(storage: &mut S, parent: Idx, c: Idx) {
        let head = node(storage, parent).child;
        if head.is_none() {
            let n = node_mut(storage, c);
            n.next = c;
            n.prev = c;
        } else {
            let oldest = node(storage, head).prev;
            {
                let n = node_mut(storage, c);
                n.next = head;
                n.prev = oldest;
            }
            node_mut(storage, oldest).next = c;
            node_mut(storage, head).prev = c;
        }
        node_mut(storage, c).parent = parent;
        node_mut(storage, parent).child = c;
    }

    /// Two-way merge of lone roots. Ties keep `a` on top.
    fn merge(&self, storage: &mut S, a: Idx, b: Idx) -> Idx {
        if a.is_none() {
            return b;
        }
        if b.is_none() {
            return a;
        }
        if self.better(storage, b, a) {
            Self::adopt(storage, b, a);
            b
        } else {
            Self::adopt(storage, a, b);
            a
        }
    }

    /// Detaches `idx` from its parent's ring, leaving it a lone root.
    fn cut(storage: &mut S, idx: Idx) {
        let (parent, next, prev) = {
            let n = node(storage, idx);
            (n.parent, n.next, n.prev)
        };

        let p = node_mut(storage, parent);
        if p.child == idx {
            p.child = if next == idx { Idx::NONE } else { next };
        }
        if next != idx {
            node_mut(storage, prev).next = next;
            node_mut(storage, next).prev = prev;
        }
        Self::make_root(storage, idx);
    }

    /// Pairs the children of `idx` from oldest to youngest and returns the
    /// merged tree as a lone root. `idx` is left childless.
    fn combine_children(&self, storage: &mut S, idx: Idx) -> Idx {
        let head = node(storage, idx).child;
        if head.is_none() {
            return Idx::NONE;
        }
        node_mut(storage, idx).child = Idx::NONE;

        let oldest = node(storage, head).prev;
        let mut cur = node(storage, oldest).prev;
        Self::make_root(storage, oldest);
        let mut acc = oldest;

        while cur != oldest {
            let next = node(storage, cur).prev;
            if next == oldest {
                // Odd one out.
                Self::make_root(storage, cur);
                acc = self.merge(storage, acc, cur);
                break;
            }

            let after = node(storage, next).prev;
            Self::make_root(storage, cur);
            Self::make_root(storage, next);
            let pair = self.merge(storage, cur, next);
            acc = self.merge(storage, acc, pair);
            cur = after;
        }
        acc
    }

    /// Links an unlinked stored node.
    fn attach(&mut self, storage: &mut S, idx: Idx) {
        node_mut(storage, idx).reset();
        Self::make_root(storage, idx);
        self.root = self.merge(storage, self.root, idx);
        self.len += 1;
    }

    /// Unlinks a linked node, merging its children back in.
    fn detach(&mut self, storage: &mut S, idx: Idx) {
        if idx == self.root {
            self.root = self.combine_children(storage, idx);
        } else {
            Self::cut(storage, idx);
            let sub = self.combine_children(storage, idx);
            self.root = self.merge(storage, self.root, sub);
        }
        node_mut(storage, idx).reset();
        self.len -= 1;
    }

    /// Moves a node that now orders at least as well as before toward the
    /// front. Its subtree comes along.
    fn promote(&mut self, storage: &mut S, idx: Idx) {
        if idx == self.root {
            return;
        }
        Self::cut(storage, idx);
        self.root = self.merge(storage, self.root, idx);
    }

    /// Unlinks and links again.
    fn relink(&mut self, storage: &mut S, idx: Idx) {
        self.detach(storage, idx);
        self.attach(storage, idx);
    }

    fn dismantle(&mut self, storage: &mut S, mut release: impl FnMut(&mut S, Idx)) {
        let mut stack = Vec::new();
        if self.root.is_some() {
            stack.push(self.root);
        }

        while let Some(idx) = stack.pop() {
            let head = node(storage, idx).child;
            if head.is_some() {
                let mut cur = head;
                loop {
                    stack.push(cur);
                    cur = node(storage, cur).next;
                    if cur == head {
                        break;
                    }
                }
            }
            release(storage, idx);
        }

        self.root = Idx::NONE;
        self.len = 0;
    }
}

// =============================================================================
// Bounded storage impl - fallible push
// =============================================================================

impl<T, S, Idx: Key, C> PairingHeap<T, S, Idx, C>
where
    S: BoundedStorage<HeapNode<T, Idx>, Key = Idx>,
    C: Compare<T>,
{
    /// Pushes a value, returning its handle.
    ///
    /// # Errors
    ///
    /// Returns `Err(Full(value))` if storage is full. The heap is unchanged.
    pub fn try_push(&mut self, storage: &mut S, value: T) -> Result<Idx, Full<T>> {
        let idx = storage
            .try_insert(HeapNode::new(value))
            .map_err(|Full(n)| Full(n.into_inner()))?;
        self.attach(storage, idx);
        Ok(idx)
    }
}

// =============================================================================
// Unbounded storage impl - infallible push
// =============================================================================

impl<T, S, Idx: Key, C> PairingHeap<T, S, Idx, C>
where
    S: UnboundedStorage<HeapNode<T, Idx>, Key = Idx>,
    C: Compare<T>,
{
    /// Pushes a value, returning its handle.
    pub fn push(&mut self, storage: &mut S, value: T) -> Idx {
        let idx = storage.insert(HeapNode::new(value));
        self.attach(storage, idx);
        idx
    }
}
