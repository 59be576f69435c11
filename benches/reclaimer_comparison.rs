use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use crossbeam_epoch::{self as epoch, Owned};
use multiqueue_epoch::{Entry, Reclaimer, VertexId};
use std::hint::black_box;
use std::thread;

const ROUNDS_PER_THREAD: u64 = 10_000;

// Benchmark 1: Single-threaded pin/unpin overhead
fn bench_single_thread_pin_unpin(c: &mut Criterion) {
    c.bench_function("reclaimer_single_thread_pin_unpin", |b| {
        let reclaimer = Reclaimer::new(1).unwrap();
        let mut participant = reclaimer.participant(0).unwrap();

        b.iter(|| {
            let _guard = participant.pin();
            black_box(());
        });
    });

    c.bench_function("crossbeam_epoch_single_thread_pin_unpin", |b| {
        b.iter(|| {
            let _guard = epoch::pin();
            black_box(());
        });
    });
}

// Benchmark 2: Allocate, read and retire one entry per pin
fn bench_allocate_retire(c: &mut Criterion) {
    c.bench_function("reclaimer_allocate_retire", |b| {
        let reclaimer = Reclaimer::new(1).unwrap();
        let mut participant = reclaimer.participant(0).unwrap();

        b.iter(|| {
            let mut guard = participant.pin();
            let id = guard.allocate(Entry::new(VertexId(1), 42));
            black_box(guard.load(id));
            guard.retire(id);
        });
    });

    c.bench_function("crossbeam_epoch_allocate_retire", |b| {
        b.iter(|| {
            let guard = epoch::pin();
            let shared = Owned::new(Entry::new(VertexId(1), 42)).into_shared(&guard);
            // SAFETY: `shared` was never published, so no other thread can hold it.
            unsafe {
                black_box(*shared.deref());
                guard.defer_destroy(shared);
            }
        });
    });
}

// Benchmark 3: Churn from several threads at once
fn bench_concurrent_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_churn");

    for threads in [2usize, 4, 8] {
        group.bench_with_input(BenchmarkId::new("reclaimer", threads), &threads, |b, &threads| {
            b.iter(|| {
                let reclaimer = Reclaimer::new(threads).unwrap();
                thread::scope(|scope| {
                    for tid in 0..threads {
                        let mut participant = reclaimer.participant(tid).unwrap();
                        scope.spawn(move || {
                            for round in 0..ROUNDS_PER_THREAD {
                                let mut guard = participant.pin();
                                let id = guard.allocate(Entry::new(VertexId(tid as u32), round));
                                black_box(guard.load(id));
                                guard.retire(id);
                            }
                        });
                    }
                });
            });
        });

        group.bench_with_input(BenchmarkId::new("crossbeam_epoch", threads), &threads, |b, &threads| {
            b.iter(|| {
                thread::scope(|scope| {
                    for tid in 0..threads {
                        scope.spawn(move || {
                            for round in 0..ROUNDS_PER_THREAD {
                                let guard = epoch::pin();
                                let shared = Owned::new(Entry::new(VertexId(tid as u32), round)).into_shared(&guard);
                                // SAFETY: `shared` was never published, so no other thread can hold it.
                                unsafe {
                                    black_box(*shared.deref());
                                    guard.defer_destroy(shared);
                                }
                            }
                        });
                    }
                });
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_single_thread_pin_unpin,
    bench_allocate_retire,
    bench_concurrent_churn,
);

criterion_main!(benches);
