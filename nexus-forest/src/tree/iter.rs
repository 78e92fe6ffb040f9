//! Ordered iterators over a [`TreeMap`](super::TreeMap).

use core::iter::FusedIterator;
use core::marker::PhantomData;

use super::{LEFT, RIGHT, TreeNode, node, step};
use crate::{Key, Storage};

// =============================================================================
// Iter
// =============================================================================

/// An iterator over key-value pairs in key order.
pub struct Iter<'a, K, V, S, Idx>
where
    Idx: Key,
    S: Storage<TreeNode<K, V, Idx>, Key = Idx>,
{
    storage: &'a S,
    front: Idx,
    back: Idx,
    remaining: usize,
    _marker: PhantomData<(K, V)>,
}

impl<'a, K, V, S, Idx> Iter<'a, K, V, S, Idx>
where
    Idx: Key,
    S: Storage<TreeNode<K, V, Idx>, Key = Idx>,
{
    pub(super) fn new(storage: &'a S, front: Idx, back: Idx, remaining: usize) -> Self {
        Self {
            storage,
            front,
            back,
            remaining,
            _marker: PhantomData,
        }
    }
}

impl<'a, K: 'a, V: 'a, S, Idx: Key + 'a> Iterator for Iter<'a, K, V, S, Idx>
where
    S: Storage<TreeNode<K, V, Idx>, Key = Idx>,
{
    type Item = (&'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let n = node(self.storage, self.front);
        self.remaining -= 1;
        if self.remaining > 0 {
            self.front = step(self.storage, self.front, RIGHT);
        }
        Some((&n.key, &n.value))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K: 'a, V: 'a, S, Idx: Key + 'a> DoubleEndedIterator for Iter<'a, K, V, S, Idx>
where
    S: Storage<TreeNode<K, V, Idx>, Key = Idx>,
{
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let n = node(self.storage, self.back);
        self.remaining -= 1;
        if self.remaining > 0 {
            self.back = step(self.storage, self.back, LEFT);
        }
        Some((&n.key, &n.value))
    }
}

impl<'a, K: 'a, V: 'a, S, Idx: Key + 'a> ExactSizeIterator for Iter<'a, K, V, S, Idx> where
    S: Storage<TreeNode<K, V, Idx>, Key = Idx>
{
}

impl<'a, K: 'a, V: 'a, S, Idx: Key + 'a> FusedIterator for Iter<'a, K, V, S, Idx> where
    S: Storage<TreeNode<K, V, Idx>, Key = Idx>
{
}

// =============================================================================
// Keys / Values
// =============================================================================

/// An iterator over keys in order.
pub struct Keys<'a, K, V, S, Idx>
where
    Idx: Key,
    S: Storage<TreeNode<K, V, Idx>, Key = Idx>,
{
    inner: Iter<'a, K, V, S, Idx>,
}

impl<'a, K, V, S, Idx> Keys<'a, K, V, S, Idx>
where
    Idx: Key,
    S: Storage<TreeNode<K, V, Idx>, Key = Idx>,
{
    pub(super) fn new(inner: Iter<'a, K, V, S, Idx>) -> Self {
        Self { inner }
    }
}

impl<'a, K: 'a, V: 'a, S, Idx: Key + 'a> Iterator for Keys<'a, K, V, S, Idx>
where
    S: Storage<TreeNode<K, V, Idx>, Key = Idx>,
{
    type Item = &'a K;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, K: 'a, V: 'a, S, Idx: Key + 'a> DoubleEndedIterator for Keys<'a, K, V, S, Idx>
where
    S: Storage<TreeNode<K, V, Idx>, Key = Idx>,
{
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(k, _)| k)
    }
}

impl<'a, K: 'a, V: 'a, S, Idx: Key + 'a> ExactSizeIterator for Keys<'a, K, V, S, Idx> where
    S: Storage<TreeNode<K, V, Idx>, Key = Idx>
{
}

/// An iterator over values in key order.
pub struct Values<'a, K, V, S, Idx>
where
    Idx: Key,
    S: Storage<TreeNode<K, V, Idx>, Key = Idx>,
{
    inner: Iter<'a, K, V, S, Idx>,
}

impl<'a, K, V, S, Idx> Values<'a, K, V, S, Idx>
where
    Idx: Key,
    S: Storage<TreeNode<K, V, Idx>, Key = Idx>,
{
    pub(super) fn new(inner: Iter<'a, K, V, S, Idx>) -> Self {
        Self { inner }
    }
}

impl<'a, K: 'a, V: 'a, S, Idx: Key + 'a> Iterator for Values<'a, K, V, S, Idx>
where
    S: Storage<TreeNode<K, V, Idx>, Key = Idx>,
{
    type Item = &'a V;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, K: 'a, V: 'a, S, Idx: Key + 'a> DoubleEndedIterator for Values<'a, K, V, S, Idx>
where
    S: Storage<TreeNode<K, V, Idx>, Key = Idx>,
{
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(_, v)| v)
    }
}

impl<'a, K: 'a, V: 'a, S, Idx: Key + 'a> ExactSizeIterator for Values<'a, K, V, S, Idx> where
    S: Storage<TreeNode<K, V, Idx>, Key = Idx>
{
}

// =============================================================================
// Range
// =============================================================================

/// An iterator over the entries inside a key range.
///
/// `front` and `back` are the first and last entries still to be yielded;
/// both go `NONE` once they meet.
pub struct Range<'a, K, V, S, Idx>
where
    Idx: Key,
    S: Storage<TreeNode<K, V, Idx>, Key = Idx>,
{
    storage: &'a S,
    front: Idx,
    back: Idx,
    _marker: PhantomData<(K, V)>,
}

impl<'a, K, V, S, Idx> Range<'a, K, V, S, Idx>
where
    Idx: Key,
    S: Storage<TreeNode<K, V, Idx>, Key = Idx>,
{
    pub(super) fn new(storage: &'a S, front: Idx, back: Idx) -> Self {
        Self {
            storage,
            front,
            back,
            _marker: PhantomData,
        }
    }
}

impl<'a, K: 'a, V: 'a, S, Idx: Key + 'a> Iterator for Range<'a, K, V, S, Idx>
where
    S: Storage<TreeNode<K, V, Idx>, Key = Idx>,
{
    type Item = (&'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.front.is_none() {
            return None;
        }
        let n = node(self.storage, self.front);

        // Check if we've met in the middle
        if self.front == self.back {
            self.front = Idx::NONE;
            self.back = Idx::NONE;
        } else {
            self.front = step(self.storage, self.front, RIGHT);
        }

        Some((&n.key, &n.value))
    }
}

impl<'a, K: 'a, V: 'a, S, Idx: Key + 'a> DoubleEndedIterator for Range<'a, K, V, S, Idx>
where
    S: Storage<TreeNode<K, V, Idx>, Key = Idx>,
{
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.back.is_none() {
            return None;
        }
        let n = node(self.storage, self.back);

        if self.front == self.back {
            self.front = Idx::NONE;
            self.back = Idx::NONE;
        } else {
            self.back = step(self.storage, self.back, LEFT);
        }

        Some((&n.key, &n.value))
    }
}

impl<'a, K: 'a, V: 'a, S, Idx: Key + 'a> FusedIterator for Range<'a, K, V, S, Idx> where
    S: Storage<TreeNode<K, V, Idx>, Key = Idx>
{
}
