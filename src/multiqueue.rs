use crate::arena::{Distance, Entry, EntryId, VertexId, INFINITY};
use crate::domain::Reclaimer;
use crate::error::{Error, Result};
use crate::heap::{DAryHeap, Keyed, DEFAULT_ARITY};
use crate::participant::Participant;
use crate::sync::{spin_loop, AtomicU64, AtomicUsize, Mutex, Ordering};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::fmt;

/// Initial capacity of every partition heap.
/// 每个分区堆的初始容量。
pub const DEFAULT_QUEUE_CAPACITY: usize = 2048;

/// What a partition heap stores: the key next to the arena id it orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Queued {
    distance: Distance,
    id: EntryId,
}

impl Keyed for Queued {
    #[inline]
    fn key(&self) -> Distance {
        self.distance
    }
}

/// One independently locked heap.
///
/// `len` and `min` mirror the heap and are rewritten under the lock after every
/// mutation. `delete_min` reads them without the lock to choose between two
/// partitions; a stale value only leads to a worse choice or a resample.
///
/// 一个独立加锁的堆。
/// `len` 与 `min` 是堆的镜像，每次修改后都在锁内重写。
/// `delete_min` 不加锁读取它们以在两个分区间做选择；过期的值只会导致较差的选择或重新采样。
#[repr(align(64))]
struct Partition {
    heap: Mutex<DAryHeap<Queued>>,
    len: AtomicUsize,
    min: AtomicU64,
}

impl Partition {
    fn new(capacity: usize, arity: usize) -> Self {
        Self {
            heap: Mutex::new(DAryHeap::with_arity(capacity, arity)),
            len: AtomicUsize::new(0),
            min: AtomicU64::new(INFINITY),
        }
    }

    /// Unlocked minimum hint; `None` if the partition looked empty.
    #[inline]
    fn hint(&self) -> Option<Distance> {
        if self.len.load(Ordering::Acquire) == 0 {
            None
        } else {
            Some(self.min.load(Ordering::Relaxed))
        }
    }

    /// Refresh the hints; the caller holds the lock that guards `heap`.
    #[inline]
    fn publish(&self, heap: &DAryHeap<Queued>) {
        self.min
            .store(heap.find_min().map_or(INFINITY, |top| top.distance), Ordering::Relaxed);
        self.len.store(heap.len(), Ordering::Release);
    }
}

/// Builder for configuring a `MultiQueue`.
///
/// - `queues_per_thread` (c) and `threads` (p): the queue has `c * p` partitions
/// - `initial_capacity`: starting capacity of every partition heap
/// - `arity`: fan-out of every partition heap
/// - `seed`: make partition sampling reproducible
///
/// 用于配置 `MultiQueue` 的构建器。
#[derive(Debug, Clone)]
pub struct MultiQueueBuilder {
    queues_per_thread: usize,
    threads: usize,
    initial_capacity: usize,
    arity: usize,
    seed: Option<u64>,
}

impl MultiQueueBuilder {
    #[inline]
    pub fn new() -> Self {
        Self {
            queues_per_thread: 1,
            threads: 1,
            initial_capacity: DEFAULT_QUEUE_CAPACITY,
            arity: DEFAULT_ARITY,
            seed: None,
        }
    }

    /// Partitions per worker thread (c). Default: `1`
    #[inline]
    pub fn queues_per_thread(mut self, c: usize) -> Self {
        self.queues_per_thread = c;
        self
    }

    /// Number of worker threads (p). Default: `1`
    #[inline]
    pub fn threads(mut self, p: usize) -> Self {
        self.threads = p;
        self
    }

    /// Default: `2048`
    #[inline]
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Default: `8`
    #[inline]
    pub fn arity(mut self, d: usize) -> Self {
        self.arity = d;
        self
    }

    /// Seed every worker's random generator from `seed` and its thread id.
    ///
    /// Without a seed each worker draws its generator from the OS.
    #[inline]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Build the queue on top of `reclaimer`, which must cover thread ids `0..threads`.
    ///
    /// 在 `reclaimer` 之上构建队列，`reclaimer` 必须覆盖线程 id `0..threads`。
    pub fn build(self, reclaimer: Reclaimer) -> Result<MultiQueue> {
        if self.queues_per_thread == 0 {
            return Err(Error::InvalidConfig("queues_per_thread must be at least 1"));
        }
        if self.threads == 0 {
            return Err(Error::InvalidConfig("threads must be at least 1"));
        }
        if self.initial_capacity == 0 {
            return Err(Error::InvalidConfig("initial_capacity must be at least 1"));
        }
        if self.arity < 2 {
            return Err(Error::InvalidConfig("arity must be at least 2"));
        }
        if reclaimer.num_threads() < self.threads {
            return Err(Error::InvalidConfig("reclaimer has fewer thread slots than the queue has threads"));
        }
        let num_partitions = self
            .queues_per_thread
            .checked_mul(self.threads)
            .ok_or(Error::InvalidConfig("queues_per_thread * threads overflows"))?;

        let partitions = (0..num_partitions)
            .map(|_| Partition::new(self.initial_capacity, self.arity))
            .collect();
        log::debug!(
            "multiqueue built with {num_partitions} partitions (c={}, p={}), capacity {} and arity {}",
            self.queues_per_thread,
            self.threads,
            self.initial_capacity,
            self.arity
        );

        Ok(MultiQueue {
            partitions,
            live: AtomicUsize::new(0),
            reclaimer,
            threads: self.threads,
            seed: self.seed,
        })
    }
}

impl Default for MultiQueueBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A relaxed concurrent priority queue over `c * p` locked d-ary heaps.
///
/// Inserts go to a random partition that could be locked without blocking.
/// `delete_min` samples two partitions, picks the one whose minimum looks
/// smaller and extracts from it, so results come out in roughly, not strictly,
/// ascending order.
///
/// Threads operate through a `QueueWorker` obtained with `worker(tid)`, which
/// carries that thread's reclaimer participant and random generator.
///
/// **Typical Usage**:
/// ```
/// use multiqueue_epoch::{MultiQueue, Reclaimer, VertexId};
///
/// let reclaimer = Reclaimer::new(1).unwrap();
/// let queue = MultiQueue::new(1, 1, reclaimer).unwrap();
/// let mut worker = queue.worker(0).unwrap();
///
/// worker.insert(VertexId(4), 5);
/// let entry = worker.delete_min().unwrap();
/// assert_eq!((entry.vertex, entry.distance), (VertexId(4), 5));
/// assert!(worker.delete_min().is_none());
/// ```
///
/// 基于 `c * p` 个加锁 d 叉堆的松弛并发优先队列。
/// 插入操作进入一个无需阻塞即可加锁的随机分区。
/// `delete_min` 采样两个分区，选择最小值看起来更小的那个并从中取出，
/// 因此结果大致（而非严格）按升序输出。
pub struct MultiQueue {
    partitions: Box<[Partition]>,
    /// Entries allocated by `insert` and not yet taken by `delete_min`.
    live: AtomicUsize,
    reclaimer: Reclaimer,
    threads: usize,
    seed: Option<u64>,
}

impl MultiQueue {
    /// Build a queue with `c * p` partitions and default heap settings.
    #[inline]
    pub fn new(queues_per_thread: usize, threads: usize, reclaimer: Reclaimer) -> Result<Self> {
        Self::builder()
            .queues_per_thread(queues_per_thread)
            .threads(threads)
            .build(reclaimer)
    }

    #[inline]
    pub fn builder() -> MultiQueueBuilder {
        MultiQueueBuilder::new()
    }

    /// Create the handle through which thread `tid` inserts and extracts.
    ///
    /// Registers `tid` with the reclaimer, so only one worker per thread id can
    /// be alive at a time.
    ///
    /// 创建线程 `tid` 用于插入和取出的句柄。
    /// 会向回收器注册 `tid`，因此每个线程 id 同时只能存在一个 worker。
    pub fn worker(&self, tid: usize) -> Result<QueueWorker<'_>> {
        if tid >= self.threads {
            return Err(Error::ThreadIdOutOfRange { tid, num_threads: self.threads });
        }
        let participant = self.reclaimer.participant(tid)?;
        let rng = match self.seed {
            Some(seed) => SmallRng::seed_from_u64(seed ^ (tid as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)),
            None => SmallRng::from_os_rng(),
        };
        Ok(QueueWorker { queue: self, participant, rng })
    }

    /// `true` when no inserted entry is waiting to be extracted.
    ///
    /// Best effort under concurrency: an entry being inserted is counted before
    /// it becomes visible in a partition.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn len(&self) -> usize {
        // SeqCst: the termination barrier orders its done flags against this counter.
        self.live.load(Ordering::SeqCst)
    }

    #[inline]
    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    #[inline]
    pub fn threads(&self) -> usize {
        self.threads
    }

    #[inline]
    pub fn reclaimer(&self) -> &Reclaimer {
        &self.reclaimer
    }
}

impl fmt::Debug for MultiQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiQueue")
            .field("partitions", &self.partitions.len())
            .field("threads", &self.threads)
            .field("live", &self.live.load(Ordering::Relaxed))
            .finish()
    }
}

/// Identity of an inserted entry.
///
/// Only useful for debugging: once another thread extracts the entry its id is
/// retired and may later name a different entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryHandle(EntryId);

impl EntryHandle {
    #[inline]
    pub fn id(self) -> EntryId {
        self.0
    }
}

/// Pick two distinct partitions, or the only one there is.
#[inline]
fn sample_pair(rng: &mut SmallRng, n: usize) -> (usize, usize) {
    if n == 1 {
        return (0, 0);
    }
    let i = rng.random_range(0..n);
    let mut j = rng.random_range(0..n - 1);
    if j >= i {
        j += 1;
    }
    (i, j)
}

/// One thread's handle on a `MultiQueue`.
///
/// Every operation pins the thread's participant for its duration, so entries
/// are only allocated, read and retired while the thread is announced.
///
/// 一个线程在 `MultiQueue` 上的句柄。
/// 每个操作在执行期间都会钉住线程的参与者，因此条目只在线程已公告时被分配、读取和退休。
pub struct QueueWorker<'q> {
    queue: &'q MultiQueue,
    participant: Participant,
    rng: SmallRng,
}

impl<'q> QueueWorker<'q> {
    #[inline]
    pub fn tid(&self) -> usize {
        self.participant.tid()
    }

    #[inline]
    pub fn queue(&self) -> &'q MultiQueue {
        self.queue
    }

    /// The reclaimer participant behind this worker.
    #[inline]
    pub fn participant(&mut self) -> &mut Participant {
        &mut self.participant
    }

    /// Insert `(vertex, distance)` into a random partition.
    ///
    /// Spins over random partitions until one can be locked without blocking.
    ///
    /// 将 `(vertex, distance)` 插入一个随机分区。
    /// 在随机分区之间自旋，直到某个分区可以无阻塞地加锁。
    pub fn insert(&mut self, vertex: VertexId, distance: Distance) -> EntryHandle {
        let partitions = &self.queue.partitions;
        let mut guard = self.participant.pin();

        let id = guard.allocate(Entry::new(vertex, distance));
        self.queue.live.fetch_add(1, Ordering::SeqCst);

        let queued = Queued { distance, id };
        loop {
            let index = self.rng.random_range(0..partitions.len());
            if let Ok(mut heap) = partitions[index].heap.try_lock() {
                heap.insert(queued);
                partitions[index].publish(&heap);
                break;
            }
            spin_loop();
        }

        EntryHandle(id)
    }

    /// Extract an entry close to the global minimum.
    ///
    /// Returns `None` once the queue holds no entries. The choice between the two
    /// sampled partitions uses unlocked hints and may be stale by the time the
    /// lock is taken; the extracted entry is then simply not the better of the two.
    ///
    /// 取出一个接近全局最小值的条目。
    /// 队列中没有条目时返回 `None`。两个采样分区之间的选择使用未加锁的提示，
    /// 在拿到锁时可能已经过期；此时取出的条目只是不是两者中更优的那个。
    pub fn delete_min(&mut self) -> Option<Entry> {
        let partitions = &self.queue.partitions;
        let mut guard = self.participant.pin();

        loop {
            if self.queue.live.load(Ordering::SeqCst) == 0 {
                return None;
            }

            let (i, j) = sample_pair(&mut self.rng, partitions.len());
            let candidate = match (partitions[i].hint(), partitions[j].hint()) {
                (None, None) => {
                    spin_loop();
                    continue;
                }
                (Some(_), None) => i,
                (None, Some(_)) => j,
                (Some(a), Some(b)) => {
                    if a < b {
                        i
                    } else {
                        j
                    }
                }
            };

            let Ok(mut heap) = partitions[candidate].heap.try_lock() else {
                spin_loop();
                continue;
            };
            // Another extractor may have emptied it since the hint was read.
            let Some(top) = heap.extract_min() else {
                continue;
            };
            partitions[candidate].publish(&heap);
            drop(heap);

            self.queue.live.fetch_sub(1, Ordering::SeqCst);
            let entry = guard.load(top.id);
            guard.retire(top.id);
            return Some(entry);
        }
    }
}

impl fmt::Debug for QueueWorker<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueWorker")
            .field("tid", &self.participant.tid())
            .field("participant", &self.participant)
            .finish()
    }
}
