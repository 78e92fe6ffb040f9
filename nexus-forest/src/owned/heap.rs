//! OwnedHeap - a pairing heap that owns its storage.

use crate::heap::{BoxedHeapStorage, HeapOrder, PairingHeap};
use crate::{Compare, Full, Key, LinkError, Natural};

/// A pairing heap that owns its storage.
///
/// This is a convenience wrapper around [`PairingHeap`] + [`BoxedHeapStorage`]
/// for cases where you don't need to share storage across multiple structures.
///
/// # Example
///
/// ```
/// use nexus_forest::OwnedHeap;
///
/// let mut heap: OwnedHeap<u64> = OwnedHeap::with_capacity(100);
///
/// heap.try_push(5).unwrap();
/// heap.try_push(1).unwrap();
/// heap.try_push(3).unwrap();
///
/// assert_eq!(heap.len(), 3);
/// assert_eq!(heap.front(), Some(&1));
///
/// assert_eq!(heap.pop(), Some(1));
/// assert_eq!(heap.pop(), Some(3));
/// assert_eq!(heap.pop(), Some(5));
/// assert_eq!(heap.pop(), None);
/// ```
///
/// # Re-keying
///
/// ```
/// use nexus_forest::OwnedHeap;
///
/// let mut heap: OwnedHeap<i64> = OwnedHeap::with_capacity(100);
///
/// heap.try_push(10).unwrap();
/// heap.try_push(20).unwrap();
/// let c = heap.try_push(30).unwrap();
///
/// heap.decrease(c, |v| *v = 5).unwrap();
/// assert_eq!(heap.front(), Some(&5));
/// ```
pub struct OwnedHeap<T, Idx: Key = u32, C = Natural> {
    storage: BoxedHeapStorage<T, Idx>,
    heap: PairingHeap<T, BoxedHeapStorage<T, Idx>, Idx, C>,
}

impl<T: Ord, Idx: Key> OwnedHeap<T, Idx, Natural> {
    /// Creates an empty min-heap holding at most `capacity` values.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_order(capacity, HeapOrder::Min)
    }

    /// Creates an empty heap serving `order` first.
    pub fn with_order(capacity: usize, order: HeapOrder) -> Self {
        Self::with_comparator(capacity, order, Natural)
    }
}

impl<T, Idx: Key, C: Compare<T>> OwnedHeap<T, Idx, C> {
    /// Creates an empty heap serving `order` first under `cmp`.
    pub fn with_comparator(capacity: usize, order: HeapOrder, cmp: C) -> Self {
        Self {
            storage: BoxedHeapStorage::with_capacity(capacity),
            heap: PairingHeap::with_comparator(order, cmp),
        }
    }

    /// Returns the number of values in the heap.
    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns `true` if the heap is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Returns the storage capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.capacity()
    }

    /// Returns the configured order.
    #[inline]
    pub fn order(&self) -> HeapOrder {
        self.heap.order()
    }

    // ========================================================================
    // Insert / remove
    // ========================================================================

    /// Pushes a value, returning its handle.
    ///
    /// # Errors
    ///
    /// Returns `Err(Full(value))` if storage is full.
    #[inline]
    pub fn try_push(&mut self, value: T) -> Result<Idx, Full<T>> {
        self.heap.try_push(&mut self.storage, value)
    }

    /// Removes and returns the front value.
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        self.heap.pop(&mut self.storage)
    }

    /// Removes a value by handle.
    #[inline]
    pub fn remove(&mut self, idx: Idx) -> Option<T> {
        self.heap.remove(&mut self.storage, idx)
    }

    /// Removes every value.
    #[inline]
    pub fn clear(&mut self) {
        self.heap.clear(&mut self.storage);
    }

    // ========================================================================
    // Access
    // ========================================================================

    /// Returns the front value.
    #[inline]
    pub fn front(&self) -> Option<&T> {
        self.heap.front(&self.storage)
    }

    /// Returns the value behind a handle.
    #[inline]
    pub fn get(&self, idx: Idx) -> Option<&T> {
        self.heap.get(&self.storage, idx)
    }

    /// Returns `true` if the handle names a value in the heap.
    #[inline]
    pub fn contains(&self, idx: Idx) -> bool {
        self.heap.contains(&self.storage, idx)
    }

    // ========================================================================
    // Re-keying
    // ========================================================================

    /// Mutates a value whose direction of change is unknown.
    ///
    /// # Errors
    ///
    /// Returns a [`LinkError`] if `idx` is not in the heap.
    #[inline]
    pub fn update<F: FnOnce(&mut T)>(&mut self, idx: Idx, f: F) -> Result<(), LinkError> {
        self.heap.update(&mut self.storage, idx, f)
    }

    /// Mutates a value that only grew.
    ///
    /// # Errors
    ///
    /// Returns a [`LinkError`] if `idx` is not in the heap.
    #[inline]
    pub fn increase<F: FnOnce(&mut T)>(&mut self, idx: Idx, f: F) -> Result<(), LinkError> {
        self.heap.increase(&mut self.storage, idx, f)
    }

    /// Mutates a value that only shrank.
    ///
    /// # Errors
    ///
    /// Returns a [`LinkError`] if `idx` is not in the heap.
    #[inline]
    pub fn decrease<F: FnOnce(&mut T)>(&mut self, idx: Idx, f: F) -> Result<(), LinkError> {
        self.heap.decrease(&mut self.storage, idx, f)
    }

    /// Checks every structural invariant of the underlying heap.
    #[inline]
    pub fn validate(&self) -> bool {
        self.heap.validate(&self.storage)
    }
}
