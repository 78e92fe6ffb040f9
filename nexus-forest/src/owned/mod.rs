//! Convenience wrappers that own their storage.
//!
//! The types in this module combine a data structure with its backing storage,
//! providing a simpler API for cases where you don't need to share storage
//! across multiple data structures.
//!
//! # When to use owned variants
//!
//! Use [`OwnedMap`] or [`OwnedHeap`] when:
//! - You have a single data structure, not several sharing one pool
//! - You want a simpler API without passing `&mut storage` to every method
//!
//! # When to use the raw variants
//!
//! Use [`TreeMap`](crate::TreeMap) or [`PairingHeap`](crate::PairingHeap)
//! with external storage when several structures share one storage pool, when
//! nodes move between structures via `unlink`/`link`, or when you hold handles
//! and link nodes yourself.
//!
//! # Example
//!
//! ```
//! use nexus_forest::{OwnedHeap, OwnedMap};
//!
//! let mut book: OwnedMap<u64, u32> = OwnedMap::with_capacity(100);
//! book.try_insert(101, 5).unwrap();
//! book.try_insert(99, 7).unwrap();
//! assert_eq!(book.first(), Some((&99, &7)));
//!
//! let mut pq: OwnedHeap<u64> = OwnedHeap::with_capacity(100);
//! pq.try_push(5).unwrap();
//! pq.try_push(1).unwrap();
//! pq.try_push(3).unwrap();
//! assert_eq!(pq.pop(), Some(1)); // min first
//! ```

mod heap;
mod map;

pub use heap::OwnedHeap;
pub use map::OwnedMap;
