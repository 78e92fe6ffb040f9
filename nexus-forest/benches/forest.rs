//! Benchmarks comparing nexus-forest against the std collections.
//!
//! Run with: cargo bench --bench forest
//!
//! Storage is pre-allocated once and reused via clear().

use std::collections::{BTreeMap, BinaryHeap};
use std::cmp::Reverse;

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use nexus_forest::{BoxedHeapStorage, BoxedTreeStorage, PairingHeap, TreeMap};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

const COUNT: usize = 10_000;

fn shuffled_keys() -> Vec<u64> {
    let mut keys: Vec<u64> = (0..COUNT as u64).collect();
    keys.shuffle(&mut SmallRng::seed_from_u64(7));
    keys
}

// ============================================================================
// Map: insert
// ============================================================================

fn bench_map_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_insert");
    group.throughput(Throughput::Elements(COUNT as u64));
    let keys = shuffled_keys();

    let mut storage: BoxedTreeStorage<u64, u64> = BoxedTreeStorage::with_capacity(COUNT);
    let mut map: TreeMap<u64, u64, _> = TreeMap::new();

    group.bench_function("TreeMap", |b| {
        b.iter(|| {
            for &k in &keys {
                black_box(map.try_insert(&mut storage, k, k).unwrap());
            }
            map.clear(&mut storage);
        });
    });

    group.bench_function("BTreeMap", |b| {
        b.iter(|| {
            let mut map = BTreeMap::new();
            for &k in &keys {
                black_box(map.insert(k, k));
            }
        });
    });

    group.finish();
}

// ============================================================================
// Map: lookup
// ============================================================================

fn bench_map_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_get");
    group.throughput(Throughput::Elements(COUNT as u64));
    let keys = shuffled_keys();

    let mut storage: BoxedTreeStorage<u64, u64> = BoxedTreeStorage::with_capacity(COUNT);
    let mut map: TreeMap<u64, u64, _> = TreeMap::new();
    let mut std_map = BTreeMap::new();
    for &k in &keys {
        map.try_insert(&mut storage, k, k).unwrap();
        std_map.insert(k, k);
    }

    group.bench_function("TreeMap", |b| {
        b.iter(|| {
            for k in &keys {
                black_box(map.get(&storage, k));
            }
        });
    });

    group.bench_function("BTreeMap", |b| {
        b.iter(|| {
            for k in &keys {
                black_box(std_map.get(k));
            }
        });
    });

    group.finish();
}

// ============================================================================
// Map: insert + remove churn
// ============================================================================

fn bench_map_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_churn");
    group.throughput(Throughput::Elements(COUNT as u64));
    let keys = shuffled_keys();

    let mut storage: BoxedTreeStorage<u64, u64> = BoxedTreeStorage::with_capacity(COUNT);
    let mut map: TreeMap<u64, u64, _> = TreeMap::new();
    let mut std_map = BTreeMap::new();
    for &k in &keys[..COUNT / 2] {
        map.try_insert(&mut storage, k, k).unwrap();
        std_map.insert(k, k);
    }

    // Remove the resident half and put it straight back.
    group.bench_function("TreeMap", |b| {
        b.iter(|| {
            for k in &keys[..COUNT / 2] {
                let v = map.remove(&mut storage, k).unwrap();
                black_box(map.try_insert(&mut storage, *k, v).unwrap());
            }
        });
    });

    group.bench_function("BTreeMap", |b| {
        b.iter(|| {
            for k in &keys[..COUNT / 2] {
                let v = std_map.remove(k).unwrap();
                black_box(std_map.insert(*k, v));
            }
        });
    });

    group.finish();
}

// ============================================================================
// Heap: push + pop
// ============================================================================

fn bench_heap_push_pop(c: &mut Criterion) {
    let mut group = c.benchmark_group("heap_push_pop");
    group.throughput(Throughput::Elements(COUNT as u64));
    let keys = shuffled_keys();

    let mut storage: BoxedHeapStorage<u64> = BoxedHeapStorage::with_capacity(COUNT);
    let mut heap: PairingHeap<u64, _> = PairingHeap::min();

    group.bench_function("PairingHeap", |b| {
        b.iter(|| {
            for &k in &keys {
                black_box(heap.try_push(&mut storage, k).unwrap());
            }
            while let Some(v) = heap.pop(&mut storage) {
                black_box(v);
            }
        });
    });

    group.bench_function("BinaryHeap", |b| {
        b.iter(|| {
            let mut heap = BinaryHeap::with_capacity(COUNT);
            for &k in &keys {
                heap.push(Reverse(k));
            }
            while let Some(v) = heap.pop() {
                black_box(v);
            }
        });
    });

    group.finish();
}

// ============================================================================
// Heap: decrease-key
// ============================================================================

fn bench_heap_decrease(c: &mut Criterion) {
    let mut group = c.benchmark_group("heap_decrease");
    group.throughput(Throughput::Elements(COUNT as u64));
    let keys = shuffled_keys();

    let mut storage: BoxedHeapStorage<u64> = BoxedHeapStorage::with_capacity(COUNT);
    let mut heap: PairingHeap<u64, _> = PairingHeap::min();

    // BinaryHeap has no decrease-key, so there is no std baseline here.
    group.bench_function("PairingHeap", |b| {
        b.iter(|| {
            let handles: Vec<u32> = keys
                .iter()
                .map(|&k| heap.try_push(&mut storage, k + COUNT as u64).unwrap())
                .collect();
            for (&idx, &k) in handles.iter().zip(&keys) {
                heap.decrease(&mut storage, idx, |v| *v = k).unwrap();
            }
            heap.clear(&mut storage);
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_map_insert,
    bench_map_get,
    bench_map_churn,
    bench_heap_push_pop,
    bench_heap_decrease,
);

criterion_main!(benches);
