/// 并发测试模块
/// 测试多线程插入、取出与纪元回收
use crate::{MultiQueue, QueueWorker, Reclaimer, VertexId};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Barrier, Mutex};
use std::thread;

const THREADS: usize = 4;

fn queue(c: usize, p: usize) -> MultiQueue {
    let reclaimer = Reclaimer::builder().check_interval(4).pool_batch(16).build(p).unwrap();
    MultiQueue::builder()
        .queues_per_thread(c)
        .threads(p)
        .initial_capacity(8)
        .build(reclaimer)
        .unwrap()
}

fn workers(queue: &MultiQueue) -> Vec<QueueWorker<'_>> {
    (0..queue.threads()).map(|tid| queue.worker(tid).unwrap()).collect()
}

/// 测试1: 并发插入后并发取出，每个条目恰好返回一次
#[test]
fn test_every_entry_returned_exactly_once() {
    const PER_THREAD: u32 = 2_000;
    let queue = queue(2, THREADS);
    let barrier = Barrier::new(THREADS);
    let seen = Mutex::new(Vec::new());

    thread::scope(|scope| {
        for mut worker in workers(&queue) {
            let barrier = &barrier;
            let seen = &seen;
            scope.spawn(move || {
                let base = worker.tid() as u32 * PER_THREAD;
                for i in 0..PER_THREAD {
                    worker.insert(VertexId(base + i), u64::from((i * 7919) % 1000));
                }
                barrier.wait();

                let mut local = Vec::new();
                while let Some(entry) = worker.delete_min() {
                    local.push(entry.vertex.0);
                }
                seen.lock().unwrap().extend(local);
            });
        }
    });

    let seen = seen.into_inner().unwrap();
    let total = THREADS * PER_THREAD as usize;
    assert_eq!(seen.len(), total);
    let unique: HashSet<u32> = seen.into_iter().collect();
    assert_eq!(unique.len(), total);
    assert!(queue.is_empty());

    let stats = queue.reclaimer().stats();
    assert_eq!(stats.allocated, total as u64);
    assert_eq!(stats.retired, total as u64);
}

/// 测试2: 插入与取出交错进行，取出总数等于插入总数
#[test]
fn test_interleaved_insert_and_delete() {
    const ROUNDS: u64 = 5_000;
    let queue = queue(2, THREADS);
    let extracted = AtomicUsize::new(0);

    thread::scope(|scope| {
        for mut worker in workers(&queue) {
            let extracted = &extracted;
            scope.spawn(move || {
                let vertex = VertexId(worker.tid() as u32);
                for round in 0..ROUNDS {
                    worker.insert(vertex, round);
                    worker.insert(vertex, ROUNDS - round);
                    if worker.delete_min().is_some() {
                        extracted.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    });

    // 剩余条目由一个线程取尽
    let mut worker = queue.worker(0).unwrap();
    let remaining = std::iter::from_fn(|| worker.delete_min()).count();

    let inserted = THREADS * 2 * ROUNDS as usize;
    assert_eq!(extracted.load(Ordering::Relaxed) + remaining, inserted);
    assert!(queue.is_empty());
}

/// 测试3: 所有参与者退出后，已退休条目最终全部被释放
#[test]
fn test_all_retired_entries_eventually_freed() {
    const ROUNDS: u64 = 3_000;
    let queue = queue(2, THREADS);

    thread::scope(|scope| {
        for mut worker in workers(&queue) {
            scope.spawn(move || {
                let vertex = VertexId(worker.tid() as u32);
                for round in 0..ROUNDS {
                    worker.insert(vertex, round);
                    worker.delete_min();
                }
            });
        }
    });

    let mut worker = queue.worker(0).unwrap();
    while worker.delete_min().is_some() {}

    // 剩下的唯一参与者推进纪元并接收孤儿袋
    let participant = worker.participant();
    for _ in 0..400 {
        drop(participant.pin());
    }
    let stats = queue.reclaimer().stats();
    assert_eq!(stats.allocated, THREADS as u64 * ROUNDS);
    assert_eq!(stats.live(), 0);
    assert_eq!(stats.pending(), 0);
    assert_eq!(participant.pending(), 0);
}

/// 测试4: 一个线程保持活跃时，其他线程退休的条目不会被复用
#[test]
fn test_active_thread_blocks_reuse() {
    let reclaimer = Reclaimer::builder().check_interval(1).build(2).unwrap();
    let pinned = AtomicBool::new(false);
    let release = AtomicBool::new(false);

    thread::scope(|scope| {
        let mut holder = reclaimer.participant(0).unwrap();
        let (pinned, release) = (&pinned, &release);
        scope.spawn(move || {
            let _guard = holder.pin();
            pinned.store(true, Ordering::SeqCst);
            while !release.load(Ordering::SeqCst) {
                thread::yield_now();
            }
        });
        while !pinned.load(Ordering::SeqCst) {
            thread::yield_now();
        }

        let mut retirer = reclaimer.participant(1).unwrap();
        let start = reclaimer.epoch();
        let retired = {
            let mut guard = retirer.pin();
            let id = guard.allocate(crate::Entry::new(VertexId(1), 1));
            guard.retire(id);
            id
        };
        for _ in 0..100 {
            let mut guard = retirer.pin();
            let id = guard.allocate(crate::Entry::new(VertexId(2), 2));
            assert_ne!(id, retired);
            guard.retire(id);
        }
        assert!(reclaimer.epoch() <= start + crate::EPOCH_INCREMENT);
        assert_eq!(reclaimer.stats().freed, 0);

        release.store(true, Ordering::SeqCst);
    });

    // 持有者退出后纪元可以继续推进
    let mut retirer = reclaimer.participant(1).unwrap();
    let before = reclaimer.epoch();
    for _ in 0..8 {
        drop(retirer.pin());
    }
    assert!(reclaimer.epoch() > before);
}

/// 测试5: 其他线程分配与退休的同时读取统计，快照保持一致
#[test]
fn test_stats_consistent_under_churn() {
    const ROUNDS: u64 = 20_000;
    let reclaimer = Reclaimer::builder().check_interval(1).pool_batch(4).build(THREADS).unwrap();
    let running = AtomicUsize::new(THREADS);

    thread::scope(|scope| {
        for tid in 0..THREADS {
            let mut participant = reclaimer.participant(tid).unwrap();
            let running = &running;
            scope.spawn(move || {
                for round in 0..ROUNDS {
                    let mut guard = participant.pin();
                    let id = guard.allocate(crate::Entry::new(VertexId(tid as u32), round));
                    guard.retire(id);
                }
                running.fetch_sub(1, Ordering::SeqCst);
            });
        }

        while running.load(Ordering::SeqCst) > 0 {
            let stats = reclaimer.stats();
            assert!(stats.freed <= stats.retired, "{stats:?}");
            assert!(stats.retired <= stats.allocated, "{stats:?}");
            assert!(stats.pending() <= stats.retired);
        }
    });

    let stats = reclaimer.stats();
    assert_eq!(stats.allocated, THREADS as u64 * ROUNDS);
    assert_eq!(stats.live(), 0);
}
