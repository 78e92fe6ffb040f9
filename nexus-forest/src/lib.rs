//! Ordered maps and priority queues over external storage.
//!
//! This crate provides two link-based containers for latency-critical
//! systems: a rank-balanced (WAVL) ordered map and a pairing heap. As with
//! the rest of nexus, storage is separate from structure.
//!
//! # Design Philosophy
//!
//! Traditional collections own their data:
//!
//! ```text
//! BTreeMap<K,V>  - owns entries, moves them between nodes on rebalance
//! BinaryHeap<T>  - owns values, positions change on every push/pop
//! ```
//!
//! This crate inverts the model:
//!
//! ```text
//! Storage (Slab)        - owns nodes, provides stable keys
//! TreeMap / PairingHeap - link keys together, don't own data
//! ```
//!
//! Benefits:
//! - **Stable handles**: a node keeps its storage key for as long as it is
//!   stored, across any number of unrelated inserts and removals
//! - **Zero allocation on hot path**: pre-allocate storage at startup
//! - **Removal and re-keying by handle**: no search needed
//! - **Shared storage**: several structures can reference the same pool
//!
//! # Quick Start
//!
//! ```
//! use nexus_forest::{BoxedTreeStorage, TreeMap};
//!
//! let mut storage: BoxedTreeStorage<u64, &str> = BoxedTreeStorage::with_capacity(1000);
//! let mut map: TreeMap<u64, &str, _> = TreeMap::new();
//!
//! for (k, v) in [(5, "e"), (3, "c"), (8, "h"), (1, "a"), (4, "d"), (7, "g"), (9, "i")] {
//!     map.try_insert(&mut storage, k, v).unwrap();
//! }
//! let keys: Vec<_> = map.keys(&storage).copied().collect();
//! assert_eq!(keys, [1, 3, 4, 5, 7, 8, 9]);
//!
//! map.remove(&mut storage, &5);
//! let keys: Vec<_> = map.keys(&storage).copied().collect();
//! assert_eq!(keys, [1, 3, 4, 7, 8, 9]);
//! assert!(map.validate(&storage));
//! ```
//!
//! # Allocating and Non-Allocating Modes
//!
//! Every engine works in two modes over the same storage traits:
//!
//! - **Allocating**: the engine moves values into storage (`try_insert`,
//!   `try_push`, the entry API) and frees them on removal (`remove`, `pop`).
//! - **Non-allocating**: the caller places a [`TreeNode`] or [`HeapNode`] in
//!   storage and the engine only links and unlinks it (`link`, `unlink`,
//!   `unlink_front`). The slot is never freed by the engine, so a node can
//!   move between structures under the same handle.
//!
//! ```
//! use nexus_forest::{BoundedStorage, BoxedHeapStorage, HeapNode, PairingHeap};
//!
//! let mut storage: BoxedHeapStorage<u32> = BoxedHeapStorage::with_capacity(16);
//! let mut ready: PairingHeap<u32, _> = PairingHeap::min();
//! let mut parked: PairingHeap<u32, _> = PairingHeap::min();
//!
//! let job = storage.try_insert(HeapNode::new(7)).unwrap();
//! ready.link(&mut storage, job).unwrap();
//!
//! // Move between heaps - the handle stays valid
//! assert_eq!(ready.unlink_front(&mut storage), Some(job));
//! parked.link(&mut storage, job).unwrap();
//! assert_eq!(parked.get(&storage, job), Some(&7));
//! ```
//!
//! # Critical Invariant: Same Storage Instance
//!
//! All operations on a structure must use the same storage instance.
//! This is the caller's responsibility (same discipline as the `slab` crate).
//! Handles from another storage are meaningless and may panic.
//!
//! # Storage Options
//!
//! | Storage | Capacity | Allocation | Use Case |
//! |---------|----------|------------|----------|
//! | [`BoxedStorage`] | Fixed (runtime) | Single heap alloc | Default choice |
//! | `slab::Slab` | Growable | May reallocate | When size unknown |
//!
//! # Storage Traits
//!
//! ```text
//! Storage<T>           - base trait: get, remove, len
//!     │
//!     ├── BoundedStorage<T>   - fixed capacity, try_insert -> Result
//!     │
//!     └── UnboundedStorage<T> - growable, insert -> Key (infallible)
//! ```
//!
//! This enables different APIs for data structures:
//! - `try_insert` / `try_push` for bounded storage (returns `Result<_, Full<_>>`)
//! - `insert` / `push` for unbounded storage (infallible)
//!
//! # Data Structures
//!
//! | Structure | Use Case | Key Operations |
//! |-----------|----------|----------------|
//! | [`TreeMap`] | Order books, ordered indexes | O(log n) insert/remove, ≤ 2 rotations per update |
//! | [`PairingHeap`] | Timers, schedulers | O(1) push, amortized O(log n) pop, cheap decrease-key |
//!
//! # Logging
//!
//! Rotations emit `tracing` events at `TRACE`; `validate` reports every
//! failed invariant at `DEBUG`. No subscriber is installed by the library.
//!
//! # Feature Flags
//!
//! - `slab` (default) - Enable [`Storage`] impl for `slab::Slab`

#![warn(missing_docs)]

pub mod compare;
pub mod error;
pub mod heap;
pub mod key;
pub mod owned;
pub mod storage;
pub mod tree;

pub use compare::{Compare, Natural};
pub use error::LinkError;
pub use heap::{BoxedHeapStorage, HeapNode, HeapOrder, PairingHeap};
pub use key::Key;
pub use owned::{OwnedHeap, OwnedMap};
pub use storage::{BoundedStorage, BoxedStorage, Full, Storage, UnboundedStorage};
pub use tree::{BoxedTreeStorage, Entry, OccupiedEntry, TreeMap, TreeNode, VacantEntry};

#[cfg(feature = "slab")]
pub use heap::SlabHeapStorage;
#[cfg(feature = "slab")]
pub use tree::SlabTreeStorage;
