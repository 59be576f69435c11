use crate::arena::{Entry, EntryId};
use crate::error::{Error, Result};
use crate::garbage::EpochBags;
use crate::state::{
    epoch_bits, is_quiescent, with_quiescent, AnnounceSlot, Counters, SharedState, EPOCH_INCREMENT,
};
use crate::sync::{fence, Arc, Ordering};

/// One thread's membership in a `Reclaimer`.
///
/// Each worker thread should hold exactly one `Participant`, obtained with
/// `Reclaimer::participant(tid)`. It owns that thread's epoch bags and free pool,
/// so every operation takes `&mut self` and needs no synchronisation beyond the
/// announcement slot.
///
/// A participant is either **quiescent** (holds no entry ids) or **active**
/// (announced an epoch and may allocate, read and retire entries). Use
/// `pin()` to get an `ActiveGuard` that leaves quiescence on creation and
/// re-enters it on drop.
///
/// 一个线程在 `Reclaimer` 中的成员身份。
///
/// 每个工作线程应当持有恰好一个 `Participant`，通过 `Reclaimer::participant(tid)` 获得。
/// 它拥有该线程的纪元袋和空闲池，因此所有操作都接受 `&mut self`，
/// 除公告槽外无需任何同步。
///
/// 参与者要么处于**静止**状态（不持有任何条目 id），要么处于**活跃**状态
/// （已公告一个纪元，可以分配、读取和退休条目）。
/// 使用 `pin()` 获得 `ActiveGuard`：创建时离开静止状态，drop 时重新进入。
pub struct Participant {
    tid: usize,
    shared: Arc<SharedState>,
    bags: EpochBags,
    /// How many announcement slots have been seen at the current epoch.
    checked: usize,
    ops_since_check: usize,
    active: bool,
}

impl Participant {
    pub(crate) fn new(shared: Arc<SharedState>, tid: usize) -> Result<Self> {
        let num_threads = shared.num_threads();
        let Some(slot) = shared.slots.get(tid) else {
            return Err(Error::ThreadIdOutOfRange { tid, num_threads });
        };
        if slot
            .claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::ParticipantInUse(tid));
        }

        let bags = EpochBags::new(shared.config.epoch_bags);
        Ok(Participant {
            tid,
            shared,
            bags,
            checked: 0,
            ops_since_check: 0,
            active: false,
        })
    }

    #[inline]
    fn slot(&self) -> &AnnounceSlot {
        &self.shared.slots[self.tid]
    }

    /// The thread id this participant was registered under.
    #[inline]
    pub fn tid(&self) -> usize {
        self.tid
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Number of ids retired by this participant that are not yet free.
    #[inline]
    pub fn pending(&self) -> usize {
        self.bags.pending()
    }

    /// Leave the quiescent state and announce the current global epoch.
    ///
    /// If the epoch moved since this participant last announced, its epoch bags
    /// rotate first and the oldest generation becomes free; the return value
    /// tells whether that happened. Every `check_interval` calls one other
    /// participant's announcement is inspected, and once all of them have been
    /// seen at the current epoch (or quiescent) the global epoch is advanced.
    ///
    /// Calling this while already active does nothing.
    ///
    /// 离开静止状态并公告当前全局纪元。
    ///
    /// 如果自上次公告以来纪元已变化，纪元袋会先轮转，最旧的一代变为空闲；
    /// 返回值表示是否发生了轮转。每 `check_interval` 次调用检查一个其他参与者的公告，
    /// 当所有参与者都已在当前纪元（或静止状态）被观察到时，推进全局纪元。
    ///
    /// 已处于活跃状态时调用此方法不做任何事。
    pub fn leave_quiescent_state(&mut self) -> bool {
        if self.active {
            return false;
        }

        let read_epoch = self.shared.epoch.load(Ordering::SeqCst);
        let announced = self.slot().announced.load(Ordering::Relaxed);
        debug_assert!(is_quiescent(announced), "BUG: participant {} slot is not quiescent", self.tid);

        let rotated = read_epoch != epoch_bits(announced);
        if rotated {
            self.checked = 0;
            self.rotate(read_epoch);
        }

        self.ops_since_check += 1;
        if self.ops_since_check % self.shared.config.check_interval == 0 {
            self.check_next(read_epoch);
        }

        // Announce last, then fence: the announcement must be visible before
        // any entry id is loaded from the shared structure.
        self.slot().announced.store(read_epoch, Ordering::SeqCst);
        fence(Ordering::SeqCst);
        self.active = true;

        rotated
    }

    /// Mark this participant quiescent at its last announced epoch.
    ///
    /// After this call the thread must not use any entry id it obtained while
    /// active. Calling this while already quiescent does nothing.
    ///
    /// 将此参与者标记为在其最近公告的纪元上静止。
    /// 调用之后，线程不得再使用在活跃期间获得的任何条目 id。已静止时调用不做任何事。
    pub fn enter_quiescent_state(&mut self) {
        if !self.active {
            return;
        }
        let slot = self.slot();
        let announced = slot.announced.load(Ordering::Relaxed);
        // Release: every read of an entry made while active happens-before a
        // scanner that observes this flag and advances the epoch.
        slot.announced.store(with_quiescent(announced), Ordering::Release);
        self.active = false;
    }

    /// Pin this participant: leave quiescence until the returned guard is dropped.
    ///
    /// 钉住此参与者：在返回的守卫被 drop 之前保持非静止状态。
    #[inline]
    pub fn pin(&mut self) -> ActiveGuard<'_> {
        self.leave_quiescent_state();
        ActiveGuard { participant: self }
    }

    /// Take a fresh entry slot and fill it with `entry`.
    ///
    /// Amortised O(1): ids come from the local pool, which is refilled in
    /// batches under the reclaimer's allocation mutex.
    ///
    /// 获取一个新的条目槽并写入 `entry`。
    /// 均摊 O(1)：id 来自本地池，本地池在回收器的分配互斥锁下批量补充。
    pub fn allocate(&mut self, entry: Entry) -> EntryId {
        debug_assert!(self.active, "BUG: participant {} allocated while quiescent", self.tid);
        let id = loop {
            if let Some(id) = self.bags.pop_free() {
                break id;
            }
            let batch = self.shared.config.pool_batch;
            let mut state = self.shared.allocator.lock();
            self.shared.arena.refill(&mut state, self.bags.pool_mut(), batch);
        };
        self.shared.arena.write(id, entry);
        Counters::add(&self.shared.counters.allocated, 1);
        id
    }

    /// Copy an entry out of the arena.
    #[inline]
    pub fn load(&self, id: EntryId) -> Entry {
        debug_assert!(self.active, "BUG: participant {} read {id:?} while quiescent", self.tid);
        self.shared.arena.read(id)
    }

    /// Defer freeing `id` until no participant can still observe it.
    ///
    /// 延迟释放 `id`，直到没有参与者还能观察到它。
    #[inline]
    pub fn retire(&mut self, id: EntryId) {
        debug_assert!(self.active, "BUG: participant {} retired {id:?} while quiescent", self.tid);
        self.bags.add(id);
        Counters::add(&self.shared.counters.retired, 1);
    }

    fn rotate(&mut self, read_epoch: u64) {
        let freed = self.bags.rotate() + self.adopt_orphans(read_epoch);
        Counters::add(&self.shared.counters.freed, freed);
        log::trace!("participant {} rotated at epoch {read_epoch}, freed {freed}", self.tid);

        let batch = self.shared.config.pool_batch;
        if self.bags.pool_len() > 2 * batch {
            let surplus = self.bags.take_surplus(batch);
            self.shared.allocator.lock().free.extend(surplus);
        }
    }

    /// Pull in bags left behind by dropped participants once they are two epochs old.
    fn adopt_orphans(&mut self, read_epoch: u64) -> usize {
        let Ok(mut orphans) = self.shared.orphans.try_lock() else {
            return 0;
        };
        let mut adopted = 0;
        let pool = self.bags.pool_mut();
        orphans.retain_mut(|(epoch, ids)| {
            if *epoch + 2 * EPOCH_INCREMENT <= read_epoch {
                adopted += ids.len();
                pool.append(ids);
                false
            } else {
                true
            }
        });
        adopted
    }

    /// Inspect the next announcement slot and advance the epoch once all have been seen.
    fn check_next(&mut self, read_epoch: u64) {
        let num_threads = self.shared.num_threads();
        if self.checked >= num_threads {
            return;
        }
        let other = self.shared.slots[self.checked].announced.load(Ordering::Acquire);
        if epoch_bits(other) == read_epoch || is_quiescent(other) {
            self.checked += 1;
            if self.checked >= num_threads
                && self
                    .shared
                    .epoch
                    .compare_exchange(
                        read_epoch,
                        read_epoch + EPOCH_INCREMENT,
                        Ordering::SeqCst,
                        Ordering::Relaxed,
                    )
                    .is_ok()
            {
                log::trace!("participant {} advanced the epoch to {}", self.tid, read_epoch + EPOCH_INCREMENT);
            }
        }
    }
}

impl std::fmt::Debug for Participant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Participant")
            .field("tid", &self.tid)
            .field("active", &self.active)
            .field("pending", &self.bags.pending())
            .field("pool", &self.bags.pool_len())
            .finish()
    }
}

impl Drop for Participant {
    /// Hand unfreed bags to the reclaimer and release the thread id.
    ///
    /// Pending ids are tagged with the current epoch and become free two epochs
    /// later, when another participant rotates. Pooled ids are already free and
    /// go straight back to the global free list.
    ///
    /// 将未释放的纪元袋移交给回收器并释放线程 id。
    /// 待释放的 id 会被标记为当前纪元，在两个纪元后由其他参与者轮转时释放。
    /// 池中的 id 已经空闲，直接归还全局空闲列表。
    fn drop(&mut self) {
        self.enter_quiescent_state();

        let pending = self.bags.take_pending();
        if !pending.is_empty() {
            let epoch = self.shared.epoch.load(Ordering::SeqCst);
            self.shared.orphans.lock().push((epoch, pending));
        }
        let pool = self.bags.take_pool();
        if !pool.is_empty() {
            self.shared.allocator.lock().free.extend(pool);
        }

        self.slot().claimed.store(false, Ordering::Release);
    }
}

/// A guard that keeps its participant active.
///
/// `ActiveGuard` is obtained by calling `Participant::pin()`. It mutably borrows
/// the participant, so allocation, reads and retirement can only happen while
/// the thread is announced. Dropping it enters the quiescent state again.
///
/// 保持其参与者处于活跃状态的守卫。
/// `ActiveGuard` 通过调用 `Participant::pin()` 获得。它可变借用参与者，
/// 因此分配、读取和退休只能在线程已公告时发生。drop 时重新进入静止状态。
#[must_use]
pub struct ActiveGuard<'a> {
    participant: &'a mut Participant,
}

impl ActiveGuard<'_> {
    #[inline]
    pub fn tid(&self) -> usize {
        self.participant.tid
    }

    #[inline]
    pub fn allocate(&mut self, entry: Entry) -> EntryId {
        self.participant.allocate(entry)
    }

    #[inline]
    pub fn load(&self, id: EntryId) -> Entry {
        self.participant.load(id)
    }

    #[inline]
    pub fn retire(&mut self, id: EntryId) {
        self.participant.retire(id)
    }
}

impl Drop for ActiveGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        self.participant.enter_quiescent_state();
    }
}
