//! Merge throughput for overlapping replicas
//!
//! Run with: cargo bench -p shelf-core --bench merge

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use shelf_core::{Item, MergeEngine, Snapshot, Transaction, TxKind};

/// Build a replica with `n` items and `4n` transactions; `offset` shifts the
/// key range so two replicas overlap by half.
fn replica(n: usize, offset: usize, stamp: u64) -> Snapshot {
    let mut snap = Snapshot::new();
    for i in offset..offset + n {
        let mut item = Item::placeholder(format!("SKU-{:05}", i));
        item.updated_at = stamp + i as u64;
        snap.items.push(item);
    }
    for i in offset * 4..(offset + n) * 4 {
        let mut tx = Transaction::new(format!("SKU-{:05}", i / 4), TxKind::In, 1.0, 0.0, i as u64)
            .expect("valid transaction");
        tx.id = format!("TX-{:08}", i);
        snap.transactions.push(tx);
    }
    snap
}

fn bench_merge(c: &mut Criterion) {
    let engine = MergeEngine::default();
    let mut group = c.benchmark_group("merge");

    for size in [100usize, 1_000, 10_000] {
        let local = replica(size, 0, 1_000);
        let remote = replica(size, size / 2, 2_000);

        group.throughput(Throughput::Elements((size * 5) as u64));
        group.bench_with_input(BenchmarkId::new("half_overlap", size), &size, |b, _| {
            b.iter(|| engine.merge(black_box(&local), black_box(&remote)))
        });
        group.bench_with_input(BenchmarkId::new("self", size), &size, |b, _| {
            b.iter(|| engine.merge(black_box(&local), black_box(&local)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_merge);
criterion_main!(benches);
