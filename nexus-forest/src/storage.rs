//! Slab-like storage with stable keys.
//!
//! Trees and heaps in this crate never own node memory. Nodes live in a
//! [`Storage`], and a key stays valid until the node is removed from it, so
//! a handle held by the caller survives any number of unrelated inserts and
//! removals.
//!
//! ```text
//! Storage<T>              - get, get_mut, remove, len
//!     │
//!     ├── BoundedStorage<T>   - fixed capacity, try_insert -> Result<Key, Full<T>>
//!     │
//!     └── UnboundedStorage<T> - growable, insert -> Key
//! ```
//!
//! The split picks the insertion API on the data structures: `try_insert` /
//! `try_push` for bounded storage, `insert` / `push` for unbounded storage.

use core::fmt;
use core::marker::PhantomData;

use crate::Key;

/// Slab-like storage with stable keys.
///
/// Implementations must keep a key valid until that key is removed and must
/// never hand out [`Key::NONE`].
pub trait Storage<T> {
    /// Handle type for this storage.
    type Key: Key;

    /// Returns a reference to the value at `key`, if present.
    fn get(&self, key: Self::Key) -> Option<&T>;

    /// Returns a mutable reference to the value at `key`, if present.
    fn get_mut(&mut self, key: Self::Key) -> Option<&mut T>;

    /// Removes and returns the value at `key`, if present.
    fn remove(&mut self, key: Self::Key) -> Option<T>;

    /// Returns the number of occupied slots.
    fn len(&self) -> usize;

    /// Returns `true` if no slots are occupied.
    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fixed-capacity storage. Insertion fails once every slot is taken.
pub trait BoundedStorage<T>: Storage<T> {
    /// Inserts a value, handing it back inside [`Full`] when no slot is free.
    fn try_insert(&mut self, value: T) -> Result<Self::Key, Full<T>>;

    /// Returns the total number of slots.
    fn capacity(&self) -> usize;
}

/// Growable storage. Insertion always succeeds.
pub trait UnboundedStorage<T>: Storage<T> {
    /// Inserts a value, returning its stable key.
    fn insert(&mut self, value: T) -> Self::Key;
}

/// Error returned when fixed-capacity storage is full.
///
/// Carries the rejected value so the caller can retry or fall back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Full<T>(pub T);

impl<T> Full<T> {
    /// Returns the value that could not be inserted.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Display for Full<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("storage is full")
    }
}

impl<T: fmt::Debug> std::error::Error for Full<T> {}

// =============================================================================
// BoxedStorage - runtime capacity, single allocation, embedded free list
// =============================================================================

enum Slot<T> {
    Occupied(T),
    /// Position of the next free slot, or `usize::MAX` at the end of the list.
    Vacant(usize),
}

const END: usize = usize::MAX;

/// Fixed-capacity storage with runtime-determined size.
///
/// One boxed slot array allocated up front; vacant slots thread a LIFO free
/// list through themselves, so insert and remove never allocate.
///
/// # Example
///
/// ```
/// use nexus_forest::{BoundedStorage, BoxedStorage, Storage};
///
/// let mut storage: BoxedStorage<u64> = BoxedStorage::with_capacity(100);
/// assert_eq!(storage.capacity(), 100);
///
/// let key = storage.try_insert(42).unwrap();
/// assert_eq!(storage.get(key), Some(&42));
/// assert_eq!(storage.remove(key), Some(42));
/// ```
pub struct BoxedStorage<T, K: Key = u32> {
    slots: Box<[Slot<T>]>,
    free_head: usize,
    len: usize,
    _marker: PhantomData<K>,
}

impl<T, K: Key> BoxedStorage<T, K> {
    /// Creates storage with exactly `capacity` slots.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0 or the key type cannot address every slot.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be > 0");
        assert!(
            capacity <= K::NONE.as_usize(),
            "capacity exceeds key type maximum"
        );

        let slots = (0..capacity)
            .map(|i| Slot::Vacant(if i + 1 < capacity { i + 1 } else { END }))
            .collect();

        Self {
            slots,
            free_head: 0,
            len: 0,
            _marker: PhantomData,
        }
    }

    /// Returns the number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the number of occupied slots.
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no slots are occupied.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns `true` if every slot is occupied.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.free_head == END
    }

    /// Drops every stored value and makes all slots free.
    ///
    /// Any tree or heap still holding keys into this storage is left with
    /// dangling links; clear or drop those first. The owned wrappers do this
    /// for you.
    pub fn clear(&mut self) {
        let capacity = self.slots.len();
        for (i, slot) in self.slots.iter_mut().enumerate() {
            *slot = Slot::Vacant(if i + 1 < capacity { i + 1 } else { END });
        }
        self.free_head = 0;
        self.len = 0;
    }
}

impl<T, K: Key> Storage<T> for BoxedStorage<T, K> {
    type Key = K;

    #[inline]
    fn get(&self, key: K) -> Option<&T> {
        match self.slots.get(key.as_usize()) {
            Some(Slot::Occupied(value)) => Some(value),
            _ => None,
        }
    }

    #[inline]
    fn get_mut(&mut self, key: K) -> Option<&mut T> {
        match self.slots.get_mut(key.as_usize()) {
            Some(Slot::Occupied(value)) => Some(value),
            _ => None,
        }
    }

    #[inline]
    fn remove(&mut self, key: K) -> Option<T> {
        let i = key.as_usize();
        match self.slots.get(i) {
            Some(Slot::Occupied(_)) => {}
            _ => return None,
        }

        let slot = core::mem::replace(&mut self.slots[i], Slot::Vacant(self.free_head));
        self.free_head = i;
        self.len -= 1;

        match slot {
            Slot::Occupied(value) => Some(value),
            Slot::Vacant(_) => None,
        }
    }

    #[inline]
    fn len(&self) -> usize {
        self.len
    }
}

impl<T, K: Key> BoundedStorage<T> for BoxedStorage<T, K> {
    #[inline]
    fn try_insert(&mut self, value: T) -> Result<K, Full<T>> {
        let i = self.free_head;
        if i == END {
            return Err(Full(value));
        }

        let slot = core::mem::replace(&mut self.slots[i], Slot::Occupied(value));
        self.free_head = match slot {
            Slot::Vacant(next) => next,
            Slot::Occupied(_) => unreachable!("free list points at an occupied slot"),
        };
        self.len += 1;

        Ok(K::from_usize(i))
    }

    #[inline]
    fn capacity(&self) -> usize {
        self.slots.len()
    }
}

impl<T, K: Key> fmt::Debug for BoxedStorage<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxedStorage")
            .field("len", &self.len)
            .field("capacity", &self.slots.len())
            .finish()
    }
}

// =============================================================================
// slab::Slab implementation
// =============================================================================

#[cfg(feature = "slab")]
impl<T> Storage<T> for slab::Slab<T> {
    type Key = usize;

    #[inline]
    fn get(&self, key: usize) -> Option<&T> {
        slab::Slab::get(self, key)
    }

    #[inline]
    fn get_mut(&mut self, key: usize) -> Option<&mut T> {
        slab::Slab::get_mut(self, key)
    }

    #[inline]
    fn remove(&mut self, key: usize) -> Option<T> {
        self.try_remove(key)
    }

    #[inline]
    fn len(&self) -> usize {
        slab::Slab::len(self)
    }
}

#[cfg(feature = "slab")]
impl<T> UnboundedStorage<T> for slab::Slab<T> {
    #[inline]
    fn insert(&mut self, value: T) -> usize {
        slab::Slab::insert(self, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_is_empty() {
        let storage: BoxedStorage<u64> = BoxedStorage::with_capacity(16);
        assert!(storage.is_empty());
        assert!(!storage.is_full());
        assert_eq!(storage.len(), 0);
        assert_eq!(storage.capacity(), 16);
    }

    #[test]
    fn insert_get_remove() {
        let mut storage: BoxedStorage<u64> = BoxedStorage::with_capacity(16);

        let key = storage.try_insert(42).unwrap();
        assert_eq!(storage.len(), 1);
        assert_eq!(storage.get(key), Some(&42));

        assert_eq!(storage.remove(key), Some(42));
        assert_eq!(storage.get(key), None);
        assert!(storage.is_empty());
    }

    #[test]
    fn get_mut() {
        let mut storage: BoxedStorage<u64> = BoxedStorage::with_capacity(4);

        let key = storage.try_insert(10).unwrap();
        *storage.get_mut(key).unwrap() = 20;

        assert_eq!(storage.get(key), Some(&20));
    }

    #[test]
    fn fill_to_capacity() {
        let mut storage: BoxedStorage<u64> = BoxedStorage::with_capacity(3);

        let k0 = storage.try_insert(0).unwrap();
        let k1 = storage.try_insert(1).unwrap();
        let k2 = storage.try_insert(2).unwrap();
        assert!(storage.is_full());

        let err = storage.try_insert(3).unwrap_err();
        assert_eq!(err.into_inner(), 3);
        assert_eq!(err.to_string(), "storage is full");

        assert_eq!(storage.get(k0), Some(&0));
        assert_eq!(storage.get(k1), Some(&1));
        assert_eq!(storage.get(k2), Some(&2));
    }

    #[test]
    fn slot_reuse_is_lifo() {
        let mut storage: BoxedStorage<u64> = BoxedStorage::with_capacity(4);

        let k0 = storage.try_insert(0).unwrap();
        let k1 = storage.try_insert(1).unwrap();

        storage.remove(k0);
        storage.remove(k1);

        assert_eq!(storage.try_insert(2).unwrap(), k1);
        assert_eq!(storage.try_insert(3).unwrap(), k0);
    }

    #[test]
    fn remove_twice() {
        let mut storage: BoxedStorage<u64> = BoxedStorage::with_capacity(4);

        let key = storage.try_insert(42).unwrap();
        storage.remove(key);

        assert_eq!(storage.remove(key), None);
        assert_eq!(storage.remove(u32::NONE), None);
        assert_eq!(storage.len(), 0);
    }

    #[test]
    fn clear_frees_every_slot() {
        let mut storage: BoxedStorage<String> = BoxedStorage::with_capacity(2);
        storage.try_insert("a".into()).unwrap();
        storage.try_insert("b".into()).unwrap();
        assert!(storage.is_full());

        storage.clear();
        assert!(storage.is_empty());
        storage.try_insert("c".into()).unwrap();
        storage.try_insert("d".into()).unwrap();
        assert!(storage.is_full());
    }

    #[test]
    fn drop_cleans_up() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        static DROP_COUNT: AtomicUsize = AtomicUsize::new(0);

        struct DropCounter;
        impl Drop for DropCounter {
            fn drop(&mut self) {
                DROP_COUNT.fetch_add(1, Ordering::SeqCst);
            }
        }

        {
            let mut storage: BoxedStorage<DropCounter> = BoxedStorage::with_capacity(8);
            let _ = storage.try_insert(DropCounter);
            let _ = storage.try_insert(DropCounter);
            let _ = storage.try_insert(DropCounter);
        }

        assert_eq!(DROP_COUNT.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn u16_keys() {
        let mut storage: BoxedStorage<u64, u16> = BoxedStorage::with_capacity(100);

        let key = storage.try_insert(42).unwrap();
        assert_eq!(storage.get(key), Some(&42));
    }

    #[test]
    #[should_panic(expected = "capacity exceeds key type maximum")]
    fn capacity_beyond_key_range() {
        let _storage: BoxedStorage<u8, u16> = BoxedStorage::with_capacity(70_000);
    }

    #[cfg(feature = "slab")]
    mod slab_tests {
        use super::*;

        #[test]
        fn insert_get_remove() {
            let mut storage = slab::Slab::new();

            let key = UnboundedStorage::insert(&mut storage, 42);
            assert_eq!(Storage::get(&storage, key), Some(&42));

            assert_eq!(Storage::remove(&mut storage, key), Some(42));
            assert_eq!(Storage::remove(&mut storage, key), None);
            assert!(Storage::is_empty(&storage));
        }
    }
}
