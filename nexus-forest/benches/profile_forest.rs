// benches/profile_forest.rs
//! Per-operation latency for nexus-forest
//!
//! Measures a steady-state order book (TreeMap) and timer wheel (PairingHeap)
//! at a fixed resident size, one operation per sample.
//!
//! For best results, disable turbo boost and pin to a physical core:
//!   echo 1 | sudo tee /sys/devices/system/cpu/intel_pstate/no_turbo
//!   sudo taskset -c 0 ./target/release/deps/profile_forest-*

use std::collections::BTreeMap;
use std::hint::black_box;
use std::thread;
use std::time::{Duration, Instant};

use hdrhistogram::Histogram;
use nexus_forest::{BoxedHeapStorage, BoxedTreeStorage, PairingHeap, TreeMap};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

const RESIDENT: usize = 10_000;
const WARMUP: usize = 100_000;
const SAMPLES: usize = 1_000_000;

#[cfg(target_arch = "x86_64")]
#[inline]
fn rdtscp() -> u64 {
    unsafe {
        let mut aux: u32 = 0;
        core::arch::x86_64::__rdtscp(&mut aux)
    }
}

#[cfg(not(target_arch = "x86_64"))]
#[inline]
fn rdtscp() -> u64 {
    Instant::now().elapsed().as_nanos() as u64
}

fn estimate_cpu_freq_ghz() -> f64 {
    let start_cycles = rdtscp();
    let start_time = Instant::now();
    thread::sleep(Duration::from_millis(10));
    let end_cycles = rdtscp();
    let elapsed = start_time.elapsed();
    end_cycles.wrapping_sub(start_cycles) as f64 / elapsed.as_nanos() as f64
}

fn new_histogram() -> Histogram<u64> {
    Histogram::<u64>::new_with_max(1_000_000, 3).unwrap()
}

// ============================================================================
// TreeMap: remove a resident key, insert a fresh one
// ============================================================================

fn bench_tree_churn() -> (Histogram<u64>, Histogram<u64>) {
    let mut rng = SmallRng::seed_from_u64(42);
    let mut storage: BoxedTreeStorage<u64, u64> = BoxedTreeStorage::with_capacity(RESIDENT + 1);
    let mut map: TreeMap<u64, u64, _> = TreeMap::new();
    let mut resident: Vec<u64> = Vec::with_capacity(RESIDENT);

    while resident.len() < RESIDENT {
        let k = rng.gen_range(0..u64::MAX / 2);
        if map.try_insert(&mut storage, k, k).unwrap().is_none() {
            resident.push(k);
        }
    }

    let mut insert_hist = new_histogram();
    let mut remove_hist = new_histogram();

    for i in 0..WARMUP + SAMPLES {
        let slot = rng.gen_range(0..RESIDENT);
        let old = resident[slot];
        let fresh = rng.gen_range(0..u64::MAX / 2);

        let start = rdtscp();
        black_box(map.remove(&mut storage, &old));
        let removed = rdtscp();
        black_box(map.try_insert(&mut storage, fresh, fresh).unwrap());
        let inserted = rdtscp();

        // Collisions overwrite in place; keep the resident set honest.
        if map.len() < RESIDENT {
            map.try_insert(&mut storage, old, old).unwrap();
        } else {
            resident[slot] = fresh;
        }

        if i >= WARMUP {
            let _ = remove_hist.record(removed.wrapping_sub(start).min(1_000_000));
            let _ = insert_hist.record(inserted.wrapping_sub(removed).min(1_000_000));
        }
    }

    (insert_hist, remove_hist)
}

fn bench_btreemap_churn() -> (Histogram<u64>, Histogram<u64>) {
    let mut rng = SmallRng::seed_from_u64(42);
    let mut map = BTreeMap::new();
    let mut resident: Vec<u64> = Vec::with_capacity(RESIDENT);

    while resident.len() < RESIDENT {
        let k = rng.gen_range(0..u64::MAX / 2);
        if map.insert(k, k).is_none() {
            resident.push(k);
        }
    }

    let mut insert_hist = new_histogram();
    let mut remove_hist = new_histogram();

    for i in 0..WARMUP + SAMPLES {
        let slot = rng.gen_range(0..RESIDENT);
        let old = resident[slot];
        let fresh = rng.gen_range(0..u64::MAX / 2);

        let start = rdtscp();
        black_box(map.remove(&old));
        let removed = rdtscp();
        black_box(map.insert(fresh, fresh));
        let inserted = rdtscp();

        if map.len() < RESIDENT {
            map.insert(old, old);
        } else {
            resident[slot] = fresh;
        }

        if i >= WARMUP {
            let _ = remove_hist.record(removed.wrapping_sub(start).min(1_000_000));
            let _ = insert_hist.record(inserted.wrapping_sub(removed).min(1_000_000));
        }
    }

    (insert_hist, remove_hist)
}

// ============================================================================
// PairingHeap: push a deadline, pop the earliest
// ============================================================================

fn bench_heap_timers() -> (Histogram<u64>, Histogram<u64>) {
    let mut rng = SmallRng::seed_from_u64(42);
    let mut storage: BoxedHeapStorage<u64> = BoxedHeapStorage::with_capacity(RESIDENT + 1);
    let mut heap: PairingHeap<u64, _> = PairingHeap::min();
    let mut now = 0u64;

    for _ in 0..RESIDENT {
        heap.try_push(&mut storage, rng.gen_range(0..1_000_000)).unwrap();
    }

    let mut push_hist = new_histogram();
    let mut pop_hist = new_histogram();

    for i in 0..WARMUP + SAMPLES {
        let deadline = now + rng.gen_range(1..1_000_000);

        let start = rdtscp();
        black_box(heap.try_push(&mut storage, deadline).unwrap());
        let pushed = rdtscp();
        let fired = heap.pop(&mut storage);
        let popped = rdtscp();

        if let Some(t) = fired {
            now = now.max(t);
        }

        if i >= WARMUP {
            let _ = push_hist.record(pushed.wrapping_sub(start).min(1_000_000));
            let _ = pop_hist.record(popped.wrapping_sub(pushed).min(1_000_000));
        }
    }

    (push_hist, pop_hist)
}

fn bench_heap_reschedule() -> Histogram<u64> {
    let mut rng = SmallRng::seed_from_u64(42);
    let mut storage: BoxedHeapStorage<u64> = BoxedHeapStorage::with_capacity(RESIDENT);
    let mut heap: PairingHeap<u64, _> = PairingHeap::min();

    let handles: Vec<u32> = (0..RESIDENT)
        .map(|_| heap.try_push(&mut storage, rng.gen_range(0..1_000_000)).unwrap())
        .collect();

    let mut hist = new_histogram();

    for i in 0..WARMUP + SAMPLES {
        let idx = handles[rng.gen_range(0..RESIDENT)];
        let deadline = rng.gen_range(0..1_000_000);

        let start = rdtscp();
        heap.update(&mut storage, idx, |v| *v = deadline).unwrap();
        let elapsed = rdtscp().wrapping_sub(start);

        if i >= WARMUP {
            let _ = hist.record(elapsed.min(1_000_000));
        }
    }

    hist
}

fn print_histogram(name: &str, hist: &Histogram<u64>, cpu_ghz: f64) {
    println!("{}:", name);
    println!("  Cycles:");
    println!("    min:   {:>7}", hist.min());
    println!("    p50:   {:>7}", hist.value_at_quantile(0.50));
    println!("    p99:   {:>7}", hist.value_at_quantile(0.99));
    println!("    p999:  {:>7}", hist.value_at_quantile(0.999));
    println!("    max:   {:>7}", hist.max());
    println!("  Nanoseconds:");
    println!("    min:   {:>7.1} ns", hist.min() as f64 / cpu_ghz);
    println!(
        "    p50:   {:>7.1} ns",
        hist.value_at_quantile(0.50) as f64 / cpu_ghz
    );
    println!(
        "    p99:   {:>7.1} ns",
        hist.value_at_quantile(0.99) as f64 / cpu_ghz
    );
    println!(
        "    p999:  {:>7.1} ns",
        hist.value_at_quantile(0.999) as f64 / cpu_ghz
    );
    println!("    max:   {:>7.1} ns", hist.max() as f64 / cpu_ghz);
    println!();
}

fn main() {
    println!("nexus-forest Latency");
    println!("====================");
    println!();
    println!("Resident: {}", RESIDENT);
    println!("Warmup:   {}", WARMUP);
    println!("Samples:  {}", SAMPLES);
    println!();

    let cpu_ghz = estimate_cpu_freq_ghz();
    println!("Estimated CPU freq: {:.2} GHz", cpu_ghz);
    println!();

    println!("=== Ordered Map (remove + insert) ===");
    println!();
    let (tree_insert, tree_remove) = bench_tree_churn();
    print_histogram("TreeMap insert", &tree_insert, cpu_ghz);
    print_histogram("TreeMap remove", &tree_remove, cpu_ghz);
    let (std_insert, std_remove) = bench_btreemap_churn();
    print_histogram("BTreeMap insert", &std_insert, cpu_ghz);
    print_histogram("BTreeMap remove", &std_remove, cpu_ghz);

    println!("=== Priority Queue (push + pop) ===");
    println!();
    let (push, pop) = bench_heap_timers();
    print_histogram("PairingHeap push", &push, cpu_ghz);
    print_histogram("PairingHeap pop", &pop, cpu_ghz);
    let update = bench_heap_reschedule();
    print_histogram("PairingHeap update", &update, cpu_ghz);

    println!("=== Summary (p50 cycles) ===");
    println!(
        "  insert:  TreeMap {:>5}  BTreeMap {:>5}",
        tree_insert.value_at_quantile(0.50),
        std_insert.value_at_quantile(0.50)
    );
    println!(
        "  remove:  TreeMap {:>5}  BTreeMap {:>5}",
        tree_remove.value_at_quantile(0.50),
        std_remove.value_at_quantile(0.50)
    );
    println!(
        "  heap:    push {:>5}  pop {:>5}  update {:>5}",
        push.value_at_quantile(0.50),
        pop.value_at_quantile(0.50),
        update.value_at_quantile(0.50)
    );
}
