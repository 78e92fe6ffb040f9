//! Handle trait for storage slots.
//!
//! Every node in a tree or heap is named by a [`Key`] into its storage.
//! Links between nodes are keys too, with a reserved [`Key::NONE`] value
//! standing in for "no node". The tree uses `NONE` as its sentinel end node.

use core::fmt::Debug;

/// A copyable storage handle with a reserved sentinel value.
///
/// # Example
///
/// ```
/// use nexus_forest::Key;
///
/// let key: u32 = 7;
/// assert!(key.is_some());
/// assert!(u32::NONE.is_none());
/// assert_eq!(u32::from_usize(7), key);
/// ```
pub trait Key: Copy + Eq + Debug {
    /// Sentinel meaning "no node". Never handed out by storage.
    const NONE: Self;

    /// Creates a key from a slot position.
    fn from_usize(val: usize) -> Self;

    /// Returns the slot position for this key.
    fn as_usize(self) -> usize;

    /// Returns `true` if this is the sentinel.
    #[inline]
    fn is_none(self) -> bool {
        self == Self::NONE
    }

    /// Returns `true` if this names a real slot.
    #[inline]
    fn is_some(self) -> bool {
        !self.is_none()
    }
}

macro_rules! impl_key_for_unsigned {
    ($($ty:ty),*) => {
        $(
            impl Key for $ty {
                const NONE: Self = <$ty>::MAX;

                #[inline]
                fn from_usize(val: usize) -> Self {
                    val as Self
                }

                #[inline]
                fn as_usize(self) -> usize {
                    self as usize
                }
            }
        )*
    };
}

impl_key_for_unsigned!(u16, u32, u64, usize);
