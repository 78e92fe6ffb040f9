//! Three-way comparators.
//!
//! Trees order keys and heaps order values through [`Compare`] rather than
//! requiring `Ord`, so one element type can be ordered several ways and a
//! comparator can carry whatever context it needs.

use core::cmp::Ordering;

/// A total order over `T`.
///
/// Implemented by [`Natural`] and by any `Fn(&T, &T) -> Ordering`, so a
/// closure capturing context works as a comparator directly.
///
/// # Example
///
/// ```
/// use nexus_forest::{Compare, Natural};
/// use std::cmp::Ordering;
///
/// assert_eq!(Natural.compare(&1, &2), Ordering::Less);
///
/// let by_len = |a: &&str, b: &&str| a.len().cmp(&b.len());
/// assert_eq!(by_len.compare(&"abc", &"de"), Ordering::Greater);
/// ```
pub trait Compare<T: ?Sized> {
    /// Compares `a` with `b`.
    fn compare(&self, a: &T, b: &T) -> Ordering;
}

/// The `Ord` ordering of `T`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Natural;

impl<T: Ord + ?Sized> Compare<T> for Natural {
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        a.cmp(b)
    }
}

impl<T: ?Sized, F> Compare<T> for F
where
    F: Fn(&T, &T) -> Ordering,
{
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        self(a, b)
    }
}
