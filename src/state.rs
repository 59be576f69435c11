use crate::arena::{Arena, EntryId};
use crate::sync::{AtomicBool, AtomicU64, Mutex, Ordering};
use std::vec::Vec;

/// Default number of epoch bags each participant rotates through.
/// 每个参与者轮转使用的纪元袋默认数量。
pub const DEFAULT_EPOCH_BAGS: usize = 3;

/// Fewest bags that still leave one full generation between retire and free.
/// 在退休与释放之间至少保留一个完整代所需的最少袋数。
pub(crate) const MIN_EPOCH_BAGS: usize = 2;

/// Default number of `leave_quiescent_state` calls between announcement scans.
/// 两次公告扫描之间 `leave_quiescent_state` 调用的默认次数。
pub const DEFAULT_CHECK_INTERVAL: usize = 20;

/// Default slot count of the first arena chunk. Later chunks double.
/// 第一个 arena 块的默认槽数，之后的块依次翻倍。
pub(crate) const DEFAULT_ARENA_CHUNK: usize = 1024;

/// Largest accepted first arena chunk, in slots.
/// 允许的首个 arena 块的最大槽数。
pub(crate) const MAX_ARENA_CHUNK: usize = 1 << 24;

/// Default number of entry ids moved between a local pool and the global free list.
/// 本地池与全局空闲列表之间一次搬运的条目 id 默认数量。
pub(crate) const DEFAULT_POOL_BATCH: usize = 64;

/// The global epoch advances in steps of two; bit 0 of an announcement is the quiescent flag.
/// 全局纪元每次前进 2；公告值的第 0 位是静止标志。
pub const EPOCH_INCREMENT: u64 = 2;

const QUIESCENT_BIT: u64 = 1;

#[inline]
pub(crate) fn epoch_bits(announcement: u64) -> u64 {
    announcement & !(EPOCH_INCREMENT - 1)
}

#[inline]
pub(crate) fn is_quiescent(announcement: u64) -> bool {
    announcement & QUIESCENT_BIT != 0
}

#[inline]
pub(crate) fn with_quiescent(announcement: u64) -> u64 {
    announcement | QUIESCENT_BIT
}

/// A slot owned by one participant thread id.
///
/// Cache-aligned to prevent false sharing between participants.
///
/// 属于某个参与者线程 id 的槽。
/// 缓存对齐以防止参与者之间的伪共享。
#[derive(Debug)]
#[repr(align(64))]
pub(crate) struct AnnounceSlot {
    /// Last epoch announced by the participant, with the quiescent flag in bit 0.
    /// 参与者最近公告的纪元，第 0 位为静止标志。
    pub(crate) announced: AtomicU64,
    /// Set while a `Participant` for this thread id is alive.
    /// 当此线程 id 的 `Participant` 存活时置位。
    pub(crate) claimed: AtomicBool,
}

impl AnnounceSlot {
    fn new() -> Self {
        Self {
            announced: AtomicU64::new(with_quiescent(0)),
            claimed: AtomicBool::new(false),
        }
    }
}

/// Tuning knobs fixed when the reclaimer is built.
/// 构建回收器时确定的调优参数。
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReclaimerConfig {
    pub(crate) epoch_bags: usize,
    pub(crate) check_interval: usize,
    pub(crate) pool_batch: usize,
}

/// Free list and carve cursor behind the global allocation mutex.
/// 全局分配互斥锁保护的空闲列表与切分游标。
#[derive(Debug, Default)]
pub(crate) struct AllocatorState {
    pub(crate) free: Vec<EntryId>,
    pub(crate) next_unused: u64,
}

/// Bags handed over by dropped participants, tagged with the epoch of the drop.
/// 被 drop 的参与者移交的纪元袋，带有 drop 时的纪元标记。
pub(crate) type OrphanBags = Vec<(u64, Vec<EntryId>)>;

/// Monotonic counters, for tests and diagnostics only.
/// 单调计数器，仅用于测试与诊断。
#[derive(Debug)]
pub(crate) struct Counters {
    pub(crate) allocated: AtomicU64,
    pub(crate) retired: AtomicU64,
    pub(crate) freed: AtomicU64,
}

impl Counters {
    fn new() -> Self {
        Self {
            allocated: AtomicU64::new(0),
            retired: AtomicU64::new(0),
            freed: AtomicU64::new(0),
        }
    }

    /// Release pairs with the acquire loads in `Reclaimer::stats`.
    #[inline]
    pub(crate) fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Release);
    }
}

/// Global shared state of one reclamation domain.
///
/// Contains the global epoch, one announcement slot per thread id, the entry
/// arena and the mutex-guarded allocation path.
///
/// 一个回收域的全局共享状态。
/// 包含全局纪元、每个线程 id 的公告槽、条目 arena 以及受互斥锁保护的分配路径。
#[derive(Debug)]
pub(crate) struct SharedState {
    /// The global epoch counter. Always a multiple of `EPOCH_INCREMENT`.
    /// 全局纪元计数器，始终是 `EPOCH_INCREMENT` 的倍数。
    pub(crate) epoch: AtomicU64,
    pub(crate) slots: Box<[AnnounceSlot]>,
    pub(crate) arena: Arena,
    pub(crate) allocator: Mutex<AllocatorState>,
    pub(crate) orphans: Mutex<OrphanBags>,
    pub(crate) counters: Counters,
    pub(crate) config: ReclaimerConfig,
}

impl SharedState {
    pub(crate) fn new(num_threads: usize, arena: Arena, config: ReclaimerConfig) -> Self {
        Self {
            epoch: AtomicU64::new(0),
            slots: (0..num_threads).map(|_| AnnounceSlot::new()).collect(),
            arena,
            allocator: Mutex::new(AllocatorState::default()),
            orphans: Mutex::new(Vec::new()),
            counters: Counters::new(),
            config,
        }
    }

    #[inline]
    pub(crate) fn num_threads(&self) -> usize {
        self.slots.len()
    }
}
