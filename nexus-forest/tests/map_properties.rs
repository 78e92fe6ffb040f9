//! Property tests for `TreeMap` against `BTreeMap`.

use std::collections::BTreeMap;
use std::ops::Bound;

use nexus_forest::{BoundedStorage, BoxedTreeStorage, Storage, TreeMap, TreeNode};
use proptest::prelude::*;

type TestStorage = BoxedTreeStorage<u16, u32>;
type TestMap = TreeMap<u16, u32, TestStorage>;

const CAPACITY: usize = 256;

#[derive(Clone, Debug)]
enum Op {
    Insert(u16, u32),
    Remove(u16),
    PopFirst,
    PopLast,
    Unlink(u16),
    Entry(u16),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u16..300, any::<u32>()).prop_map(|(k, v)| Op::Insert(k, v)),
        3 => (0u16..300).prop_map(Op::Remove),
        1 => Just(Op::PopFirst),
        1 => Just(Op::PopLast),
        1 => (0u16..300).prop_map(Op::Unlink),
        1 => (0u16..300).prop_map(Op::Entry),
    ]
}

fn bound_strategy() -> impl Strategy<Value = Bound<u16>> {
    prop_oneof![
        (0u16..320).prop_map(Bound::Included),
        (0u16..320).prop_map(Bound::Excluded),
        Just(Bound::Unbounded),
    ]
}

/// Applies `ops` to both maps, checking every result and the invariants.
fn run(ops: Vec<Op>) -> (TestMap, TestStorage, BTreeMap<u16, u32>) {
    let mut storage = TestStorage::with_capacity(CAPACITY);
    let mut map = TestMap::new();
    let mut model = BTreeMap::new();

    for op in ops {
        match op {
            Op::Insert(k, v) => match map.try_insert(&mut storage, k, v) {
                Ok(old) => assert_eq!(old, model.insert(k, v)),
                Err(full) => {
                    assert_eq!(full.into_inner(), (k, v));
                    assert!(!model.contains_key(&k));
                    assert_eq!(model.len(), CAPACITY);
                }
            },
            Op::Remove(k) => assert_eq!(map.remove(&mut storage, &k), model.remove(&k)),
            Op::PopFirst => assert_eq!(map.pop_first(&mut storage), model.pop_first()),
            Op::PopLast => assert_eq!(map.pop_last(&mut storage), model.pop_last()),
            Op::Unlink(k) => {
                // Unlink then relink: the node keeps its handle and slot.
                if let Some(idx) = map.find(&storage, &k) {
                    assert!(map.unlink(&mut storage, idx));
                    assert!(!map.contains_key(&storage, &k));
                    assert!(storage.get(idx).is_some());
                    map.link(&mut storage, idx).unwrap();
                    assert_eq!(map.find(&storage, &k), Some(idx));
                }
            }
            Op::Entry(k) => {
                if let Ok(v) = map.entry(&mut storage, k).or_try_insert(0) {
                    *v = v.wrapping_add(1);
                    let m = model.entry(k).or_insert(0);
                    *m = m.wrapping_add(1);
                }
            }
        }
        assert!(map.validate(&storage));
        assert_eq!(map.len(), model.len());
    }

    (map, storage, model)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn matches_btreemap(ops in prop::collection::vec(op_strategy(), 0..400)) {
        let (map, storage, model) = run(ops);

        let ours: Vec<_> = map.iter(&storage).map(|(k, v)| (*k, *v)).collect();
        let theirs: Vec<_> = model.iter().map(|(k, v)| (*k, *v)).collect();
        prop_assert_eq!(ours, theirs);

        let ours: Vec<_> = map.iter(&storage).rev().map(|(k, _)| *k).collect();
        let theirs: Vec<_> = model.keys().rev().copied().collect();
        prop_assert_eq!(ours, theirs);
        prop_assert_eq!(storage.len(), model.len());
    }

    #[test]
    fn range_matches_btreemap(
        keys in prop::collection::btree_set(0u16..300, 0..200),
        lo in bound_strategy(),
        hi in bound_strategy(),
    ) {
        let mut storage = TestStorage::with_capacity(CAPACITY);
        let mut map = TestMap::new();
        let mut model = BTreeMap::new();
        for &k in &keys {
            map.try_insert(&mut storage, k, u32::from(k)).unwrap();
            model.insert(k, u32::from(k));
        }

        // BTreeMap::range panics on inverted or doubly-excluded equal bounds.
        let inverted = match (lo, hi) {
            (Bound::Included(a), Bound::Included(b)) => a > b,
            (Bound::Included(a) | Bound::Excluded(a), Bound::Included(b) | Bound::Excluded(b)) => a >= b,
            _ => false,
        };

        let ours: Vec<_> = map.range(&storage, (lo, hi)).map(|(k, _)| *k).collect();
        let down: Vec<_> = map.range(&storage, (lo, hi)).rev().map(|(k, _)| *k).collect();
        if inverted {
            prop_assert!(ours.is_empty());
            prop_assert!(down.is_empty());
        } else {
            let theirs: Vec<_> = model.range((lo, hi)).map(|(k, _)| *k).collect();
            let theirs_down: Vec<_> = model.range((lo, hi)).rev().map(|(k, _)| *k).collect();
            prop_assert_eq!(ours, theirs);
            prop_assert_eq!(down, theirs_down);
        }
    }

    #[test]
    fn handle_walk_visits_in_order(keys in prop::collection::vec(any::<u16>(), 0..200)) {
        let mut storage = TestStorage::with_capacity(CAPACITY);
        let mut map = TestMap::new();
        for &k in &keys {
            map.try_insert(&mut storage, k, 0).unwrap();
        }

        let mut walked = Vec::new();
        let mut cur = map.first_key(&storage);
        while let Some(idx) = cur {
            walked.push(*map.entry_at(&storage, idx).unwrap().0);
            cur = map.next_key(&storage, idx);
        }

        let mut expected = keys.clone();
        expected.sort_unstable();
        expected.dedup();
        prop_assert_eq!(walked, expected);
    }

    #[test]
    fn link_or_replace_keeps_one_node_per_key(keys in prop::collection::vec(0u16..64, 1..120)) {
        let mut storage = TestStorage::with_capacity(CAPACITY);
        let mut map = TestMap::new();
        let mut model = BTreeMap::new();

        for (i, &k) in keys.iter().enumerate() {
            let idx = storage.try_insert(TreeNode::new(k, i as u32)).unwrap();
            if let Some(old) = map.link_or_replace(&mut storage, idx).unwrap() {
                prop_assert_eq!(storage.remove(old).map(TreeNode::into_parts), Some((k, model[&k])));
            }
            model.insert(k, i as u32);
            prop_assert!(map.validate(&storage));
        }

        let ours: Vec<_> = map.iter(&storage).map(|(k, v)| (*k, *v)).collect();
        let theirs: Vec<_> = model.into_iter().collect();
        prop_assert_eq!(ours, theirs);
    }
}
