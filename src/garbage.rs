use crate::arena::EntryId;
use std::vec::Vec;

/// Retired entries of one participant, grouped by the epoch generation they were retired in.
///
/// This struct encapsulates the logic for:
/// - Storing retired ids in `K` rotating bags.
/// - Moving the oldest bag into the free pool on rotation.
/// - Keeping a local pool of free ids so most allocations skip the global mutex.
///
/// 一个参与者的已退休条目，按退休时所处的纪元代分组。
///
/// 此结构体封装了以下逻辑：
/// - 将已退休 id 存放在 `K` 个轮转的袋子中。
/// - 轮转时把最旧的袋子移入空闲池。
/// - 维护本地空闲 id 池，使大多数分配无需获取全局互斥锁。
#[derive(Debug)]
pub(crate) struct EpochBags {
    /// `bags[index]` receives new retirements; `bags[(index + 1) % K]` is the oldest.
    bags: Box<[Vec<EntryId>]>,
    index: usize,
    /// Ids that no thread can still observe.
    pool: Vec<EntryId>,
}

impl EpochBags {
    pub(crate) fn new(generations: usize) -> Self {
        Self {
            bags: (0..generations).map(|_| Vec::with_capacity(16)).collect(),
            index: 0,
            pool: Vec::new(),
        }
    }

    #[inline]
    pub(crate) fn add(&mut self, id: EntryId) {
        self.bags[self.index].push(id);
    }

    /// Advance to the next bag, releasing everything retired `K - 1` rotations ago.
    ///
    /// Returns the number of ids moved into the free pool.
    ///
    /// 前进到下一个袋子，释放 `K - 1` 次轮转之前退休的全部 id。
    /// 返回移入空闲池的 id 数量。
    pub(crate) fn rotate(&mut self) -> usize {
        self.index = (self.index + 1) % self.bags.len();
        let freeable = &mut self.bags[self.index];
        let freed = freeable.len();
        // `append` leaves the bag empty but keeps its allocation for reuse
        self.pool.append(freeable);
        freed
    }

    #[inline]
    pub(crate) fn pop_free(&mut self) -> Option<EntryId> {
        self.pool.pop()
    }

    #[inline]
    pub(crate) fn pool_mut(&mut self) -> &mut Vec<EntryId> {
        &mut self.pool
    }

    #[inline]
    pub(crate) fn pool_len(&self) -> usize {
        self.pool.len()
    }

    /// Ids retired but not yet freed, across all bags.
    pub(crate) fn pending(&self) -> usize {
        self.bags.iter().map(Vec::len).sum()
    }

    /// Split off everything in the pool beyond `keep` ids.
    pub(crate) fn take_surplus(&mut self, keep: usize) -> Vec<EntryId> {
        if self.pool.len() <= keep {
            return Vec::new();
        }
        self.pool.split_off(keep)
    }

    /// Empty every bag, for handing the ids over when the owner goes away.
    pub(crate) fn take_pending(&mut self) -> Vec<EntryId> {
        let mut pending = Vec::with_capacity(self.pending());
        for bag in self.bags.iter_mut() {
            pending.append(bag);
        }
        pending
    }

    pub(crate) fn take_pool(&mut self) -> Vec<EntryId> {
        std::mem::take(&mut self.pool)
    }
}
