use crate::arena::Arena;
use crate::error::{Error, Result};
use crate::participant::Participant;
use crate::state::{
    ReclaimerConfig, SharedState, DEFAULT_ARENA_CHUNK, DEFAULT_CHECK_INTERVAL, DEFAULT_EPOCH_BAGS,
    DEFAULT_POOL_BATCH, MAX_ARENA_CHUNK, MIN_EPOCH_BAGS,
};
use crate::sync::{Arc, Ordering};

/// Builder for configuring a `Reclaimer`.
///
/// Use this builder to customize reclamation behavior:
/// - `epoch_bags`: Number of epoch generations each participant keeps (at least 2)
/// - `check_interval`: Calls to `leave_quiescent_state` between announcement scans
/// - `arena_chunk`: Slot count of the first arena chunk
/// - `pool_batch`: Ids moved at once between a local pool and the global free list
///
/// # Example
/// ```
/// use multiqueue_epoch::Reclaimer;
///
/// let reclaimer = Reclaimer::builder()
///     .epoch_bags(3)
///     .check_interval(1)
///     .build(4)
///     .unwrap();
/// assert_eq!(reclaimer.num_threads(), 4);
/// ```
///
/// 用于配置 `Reclaimer` 的构建器。
pub struct ReclaimerBuilder {
    epoch_bags: usize,
    check_interval: usize,
    arena_chunk: usize,
    pool_batch: usize,
}

impl ReclaimerBuilder {
    /// Create a new builder with default settings.
    /// 创建一个带有默认设置的新构建器。
    #[inline]
    pub fn new() -> Self {
        Self {
            epoch_bags: DEFAULT_EPOCH_BAGS,
            check_interval: DEFAULT_CHECK_INTERVAL,
            arena_chunk: DEFAULT_ARENA_CHUNK,
            pool_batch: DEFAULT_POOL_BATCH,
        }
    }

    /// Set the number of epoch bags per participant.
    ///
    /// A retired entry is freed `epoch_bags - 1` bag rotations after it was
    /// retired. Values below 2 are rejected by `build`.
    ///
    /// Default: `3`
    ///
    /// 设置每个参与者的纪元袋数量。
    /// 已退休条目在退休后经过 `epoch_bags - 1` 次袋轮转才被释放。小于 2 的值会被 `build` 拒绝。
    #[inline]
    pub fn epoch_bags(mut self, bags: usize) -> Self {
        self.epoch_bags = bags;
        self
    }

    /// Set how many `leave_quiescent_state` calls pass between two announcement checks.
    ///
    /// Lower values advance the epoch sooner at the cost of more cross-thread reads.
    ///
    /// Default: `20`
    ///
    /// 设置两次公告检查之间经过多少次 `leave_quiescent_state` 调用。
    #[inline]
    pub fn check_interval(mut self, interval: usize) -> Self {
        self.check_interval = interval;
        self
    }

    /// Set the slot count of the first arena chunk (rounded up to a power of two).
    /// Values above `2^24` are rejected by `build`.
    ///
    /// Default: `1024`
    #[inline]
    pub fn arena_chunk(mut self, slots: usize) -> Self {
        self.arena_chunk = slots;
        self
    }

    /// Set how many ids a participant takes from, or returns to, the global free list at once.
    ///
    /// Default: `64`
    #[inline]
    pub fn pool_batch(mut self, batch: usize) -> Self {
        self.pool_batch = batch;
        self
    }

    /// Build a `Reclaimer` for thread ids `0..num_threads`.
    ///
    /// 为线程 id `0..num_threads` 构建 `Reclaimer`。
    pub fn build(self, num_threads: usize) -> Result<Reclaimer> {
        if num_threads == 0 {
            return Err(Error::InvalidConfig("a reclaimer needs at least one thread"));
        }
        if self.epoch_bags < MIN_EPOCH_BAGS {
            return Err(Error::InvalidConfig("epoch_bags must be at least 2"));
        }
        if self.check_interval == 0 {
            return Err(Error::InvalidConfig("check_interval must be at least 1"));
        }
        if self.arena_chunk > MAX_ARENA_CHUNK {
            return Err(Error::InvalidConfig("arena_chunk must be at most 2^24 slots"));
        }
        if self.pool_batch == 0 {
            return Err(Error::InvalidConfig("pool_batch must be at least 1"));
        }

        let config = ReclaimerConfig {
            epoch_bags: self.epoch_bags,
            check_interval: self.check_interval,
            pool_batch: self.pool_batch,
        };
        let shared = Arc::new(SharedState::new(num_threads, Arena::new(self.arena_chunk), config));
        log::debug!("reclaimer built for {num_threads} threads with {config:?}");

        Ok(Reclaimer { shared })
    }
}

impl Default for ReclaimerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A quiescent-state epoch reclamation domain for queue entries.
///
/// `Reclaimer` is the entry point of the reclamation system. It manages:
/// - The global epoch counter.
/// - One announcement slot per thread id.
/// - The entry arena and its free list.
///
/// `Reclaimer` is `Clone` and can be safely shared across threads; clones refer
/// to the same domain. Create one at startup, hand a clone to the `MultiQueue`,
/// and give every worker thread its own `Participant`.
///
/// **Typical Usage**:
/// ```
/// use multiqueue_epoch::{Entry, Reclaimer, VertexId};
///
/// let reclaimer = Reclaimer::new(2).unwrap();
/// let mut participant = reclaimer.participant(0).unwrap();
///
/// let mut guard = participant.pin();
/// let id = guard.allocate(Entry::new(VertexId(3), 17));
/// assert_eq!(guard.load(id).distance, 17);
/// guard.retire(id);
/// ```
///
/// 用于队列条目的静止状态纪元回收域。
/// `Reclaimer` 是回收系统的入口点。它管理：
/// - 全局纪元计数器。
/// - 每个线程 id 的公告槽。
/// - 条目 arena 及其空闲列表。
/// `Reclaimer` 是 `Clone` 的，可以安全地在线程间共享；克隆指向同一个域。
#[derive(Clone, Debug)]
pub struct Reclaimer {
    shared: Arc<SharedState>,
}

impl Reclaimer {
    /// Create a reclaimer with default settings for thread ids `0..num_threads`.
    /// 为线程 id `0..num_threads` 创建一个带默认设置的回收器。
    #[inline]
    pub fn new(num_threads: usize) -> Result<Self> {
        Self::builder().build(num_threads)
    }

    /// Create a builder for configuring the reclaimer.
    /// 创建一个用于配置回收器的构建器。
    #[inline]
    pub fn builder() -> ReclaimerBuilder {
        ReclaimerBuilder::new()
    }

    /// Register the participant for thread id `tid`.
    ///
    /// Each thread id can have at most one live participant; the id becomes
    /// available again once that participant is dropped.
    ///
    /// 为线程 id `tid` 注册参与者。
    /// 每个线程 id 同时最多只能有一个存活的参与者；该参与者被 drop 后 id 可再次使用。
    #[inline]
    pub fn participant(&self, tid: usize) -> Result<Participant> {
        Participant::new(self.shared.clone(), tid)
    }

    #[inline]
    pub fn num_threads(&self) -> usize {
        self.shared.num_threads()
    }

    /// The current global epoch. It grows by two on every advance.
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.shared.epoch.load(Ordering::SeqCst)
    }

    /// Snapshot of the reclamation counters.
    ///
    /// The counters are read one by one while other threads keep moving them.
    /// Each is read before the counter it trails, so a snapshot never shows more
    /// freed than retired entries or more retired than allocated ones.
    ///
    /// 回收计数器的快照。
    /// 计数器逐个读取，期间其他线程仍在修改它们。每个计数器都先于它所落后的计数器读取，
    /// 因此快照中释放数不会超过退休数，退休数也不会超过分配数。
    pub fn stats(&self) -> ReclaimerStats {
        let counters = &self.shared.counters;
        let freed = counters.freed.load(Ordering::Acquire);
        let retired = counters.retired.load(Ordering::Acquire);
        let allocated = counters.allocated.load(Ordering::Acquire);
        ReclaimerStats {
            epoch: self.epoch(),
            allocated,
            retired,
            freed,
            arena_capacity: self.shared.arena.capacity(),
        }
    }
}

/// Counters describing a reclaimer's history.
///
/// `allocated - retired` entries are live; `retired - freed` wait in epoch bags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReclaimerStats {
    pub epoch: u64,
    pub allocated: u64,
    pub retired: u64,
    pub freed: u64,
    pub arena_capacity: usize,
}

impl ReclaimerStats {
    #[inline]
    pub fn live(&self) -> u64 {
        self.allocated.saturating_sub(self.retired)
    }

    #[inline]
    pub fn pending(&self) -> u64 {
        self.retired.saturating_sub(self.freed)
    }
}
