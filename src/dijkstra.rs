//! Parallel single-source shortest paths over a `MultiQueue`.
//!
//! Every worker thread repeatedly extracts a near-minimal entry, settles its
//! vertex if the entry improves on the recorded distance, and relaxes the
//! vertex's edges by inserting improved offers. Entries may come out of order,
//! so a vertex can be settled more than once; the final distances are exact
//! regardless.
//!
//! 基于 `MultiQueue` 的并行单源最短路径。
//! 每个工作线程反复取出一个接近最小的条目；若该条目优于已记录的距离则更新其顶点，
//! 并通过插入更优的报价来松弛该顶点的边。条目可能乱序输出，因此一个顶点可能被更新多次；
//! 最终距离依然是精确的。

use crate::arena::{Distance, VertexId, INFINITY};
use crate::domain::{Reclaimer, ReclaimerStats};
use crate::error::Result;
use crate::graph::Graph;
use crate::multiqueue::{MultiQueue, QueueWorker};
use crate::sync::{spin_loop, AtomicBool, Mutex, Ordering};
use std::io::Write;
use std::num::NonZeroUsize;
use std::panic;
use std::thread;
use std::time::{Duration, Instant};

/// Settings of one shortest-path run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsspConfig {
    /// Partitions per thread (c).
    pub queues_per_thread: usize,
    /// Worker threads (p).
    pub threads: usize,
    /// Seed for partition sampling; `None` draws seeds from the OS.
    pub seed: Option<u64>,
}

impl SsspConfig {
    #[inline]
    pub fn new(queues_per_thread: usize, threads: usize) -> Self {
        Self { queues_per_thread, threads, seed: None }
    }

    #[inline]
    pub fn seed(mut self, seed: impl Into<Option<u64>>) -> Self {
        self.seed = seed.into();
        self
    }
}

impl Default for SsspConfig {
    /// Two partitions per thread and one thread per available core.
    fn default() -> Self {
        let threads = thread::available_parallelism().map_or(1, NonZeroUsize::get);
        Self::new(2, threads)
    }
}

/// What one worker thread did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Entries taken out of the queue.
    pub extracted: u64,
    /// Extracted entries that lowered their vertex's distance.
    pub settled: u64,
    /// Offers inserted by relaxation.
    pub inserted: u64,
}

impl WorkerStats {
    fn merge(mut self, other: WorkerStats) -> WorkerStats {
        self.extracted += other.extracted;
        self.settled += other.settled;
        self.inserted += other.inserted;
        self
    }
}

/// Totals of a finished run.
#[derive(Debug, Clone, Copy)]
pub struct RunStats {
    pub workers: WorkerStats,
    pub reclaimer: ReclaimerStats,
    pub elapsed: Duration,
}

/// Distances from the source plus statistics of the run that computed them.
#[derive(Debug, Clone)]
pub struct Solution {
    /// Indexed by vertex id; unreachable vertices hold `INFINITY`.
    pub distances: Vec<Distance>,
    pub stats: RunStats,
}

/// Compute shortest distances from the graph's source to every vertex.
///
/// 计算从图的源点到每个顶点的最短距离。
pub fn shortest_paths(graph: &Graph, config: &SsspConfig) -> Result<Vec<Distance>> {
    run(graph, config).map(|solution| solution.distances)
}

/// Like `shortest_paths`, also returning per-run statistics.
///
/// Builds a reclaimer for `config.threads` participants and a queue with
/// `queues_per_thread * threads` partitions, seeds the queue with the source at
/// distance 0 and runs one scoped worker thread per participant until all of
/// them agree the queue is drained.
///
/// 与 `shortest_paths` 相同，但同时返回本次运行的统计信息。
pub fn run(graph: &Graph, config: &SsspConfig) -> Result<Solution> {
    let started = Instant::now();
    let reclaimer = Reclaimer::new(config.threads)?;
    let mut builder = MultiQueue::builder()
        .queues_per_thread(config.queues_per_thread)
        .threads(config.threads);
    if let Some(seed) = config.seed {
        builder = builder.seed(seed);
    }
    let queue = builder.build(reclaimer.clone())?;
    let mut workers = (0..config.threads)
        .map(|tid| queue.worker(tid))
        .collect::<Result<Vec<_>>>()?;

    log::info!(
        "solving {} vertices / {} edges from {} with {} threads and {} partitions",
        graph.num_vertices(),
        graph.num_edges(),
        graph.source(),
        config.threads,
        queue.num_partitions()
    );

    let relaxer = Relaxer::new(graph, config.threads);
    workers[0].insert(graph.source(), 0);

    let totals = thread::scope(|scope| {
        let relaxer = &relaxer;
        let handles: Vec<_> = workers
            .into_iter()
            .map(|worker| scope.spawn(move || relaxer.work(worker)))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or_else(|payload| panic::resume_unwind(payload)))
            .fold(WorkerStats::default(), WorkerStats::merge)
    });

    let distances = relaxer.into_distances();
    let stats = RunStats {
        workers: totals,
        reclaimer: reclaimer.stats(),
        elapsed: started.elapsed(),
    };
    let reached = distances.iter().filter(|&&d| d != INFINITY).count();
    log::info!(
        "reached {reached}/{} vertices in {:?}: {} extracted, {} settled, {} inserted",
        distances.len(),
        stats.elapsed,
        totals.extracted,
        totals.settled,
        totals.inserted
    );

    Ok(Solution { distances, stats })
}

/// Write one distance per line, in vertex order.
///
/// Unreachable vertices are written as the numeric value of `INFINITY`.
pub fn write_distances<W: Write>(mut writer: W, distances: &[Distance]) -> Result<()> {
    for distance in distances {
        writeln!(writer, "{distance}")?;
    }
    writer.flush()?;
    Ok(())
}

/// State shared by the worker threads of one run.
///
/// Per vertex there is a settled distance and a best offer, each behind its own
/// lock. `relax` takes the offer lock first and the distance lock inside it;
/// settling takes only the distance lock.
struct Relaxer<'g> {
    graph: &'g Graph,
    distances: Box<[Mutex<Distance>]>,
    offers: Box<[Mutex<Distance>]>,
    /// Set while a worker believes the queue is drained.
    done: Box<[AtomicBool]>,
}

impl<'g> Relaxer<'g> {
    fn new(graph: &'g Graph, threads: usize) -> Self {
        let n = graph.num_vertices();
        Self {
            graph,
            distances: (0..n).map(|_| Mutex::new(INFINITY)).collect(),
            offers: (0..n).map(|_| Mutex::new(INFINITY)).collect(),
            done: (0..threads).map(|_| AtomicBool::new(false)).collect(),
        }
    }

    fn all_done(&self) -> bool {
        self.done.iter().all(|flag| flag.load(Ordering::SeqCst))
    }

    /// Worker loop of thread `worker.tid()`.
    ///
    /// A worker raises its done flag only after seeing the queue empty and lowers
    /// it before extracting, so it never holds an entry while flagged. It leaves
    /// once every flag reads as raised. A worker that leaves early while another
    /// still relaxes loses no work: the remaining workers drain whatever is
    /// inserted afterwards.
    ///
    /// 线程 `worker.tid()` 的工作循环。
    /// 工作线程只有在看到队列为空后才设置完成标志，并在取出条目前清除它，
    /// 因此设置标志时从不持有条目。当所有标志都被读到已设置时退出。
    fn work(&self, mut worker: QueueWorker<'_>) -> WorkerStats {
        let tid = worker.tid();
        let queue = worker.queue();
        let mut stats = WorkerStats::default();
        let _raise = RaiseOnExit(&self.done[tid]);

        loop {
            if queue.is_empty() {
                self.done[tid].store(true, Ordering::SeqCst);
                if self.all_done() {
                    break;
                }
                spin_loop();
                continue;
            }
            self.done[tid].store(false, Ordering::SeqCst);

            let Some(entry) = worker.delete_min() else {
                continue;
            };
            stats.extracted += 1;

            if !self.settle(entry.vertex, entry.distance) {
                continue;
            }
            stats.settled += 1;

            for &(neighbor, weight) in self.graph.neighbors(entry.vertex) {
                let alt = entry.distance.saturating_add(weight);
                if self.relax(&mut worker, neighbor, alt) {
                    stats.inserted += 1;
                }
            }
        }

        log::debug!("worker {tid} finished: {stats:?}");
        stats
    }

    /// Record `distance` for `vertex` if it beats the current one.
    fn settle(&self, vertex: VertexId, distance: Distance) -> bool {
        let mut current = self.distances[vertex.index()].lock();
        if distance < *current {
            *current = distance;
            true
        } else {
            false
        }
    }

    /// Offer `alt` for `vertex`; inserts only if it beats both the settled
    /// distance and the best outstanding offer.
    fn relax(&self, worker: &mut QueueWorker<'_>, vertex: VertexId, alt: Distance) -> bool {
        let mut offer = self.offers[vertex.index()].lock();
        let settled = *self.distances[vertex.index()].lock();
        if alt < settled && alt < *offer {
            worker.insert(vertex, alt);
            *offer = alt;
            true
        } else {
            false
        }
    }

    fn into_distances(self) -> Vec<Distance> {
        self.distances.iter().map(|distance| *distance.lock()).collect()
    }
}

/// Raises a worker's done flag however its loop ends, so a panicking worker
/// does not leave the others waiting for it.
struct RaiseOnExit<'a>(&'a AtomicBool);

impl Drop for RaiseOnExit<'_> {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}
