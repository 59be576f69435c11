use crate::state::AllocatorState;
use crate::sync::{AtomicPtr, AtomicU32, AtomicU64, Ordering};
use std::boxed::Box;
use std::fmt;
use std::vec::Vec;

/// Tentative distance of a vertex from the source.
/// 顶点到源点的暂定距离。
pub type Distance = u64;

/// Distance of a vertex that has not been reached.
/// 尚未到达的顶点的距离。
pub const INFINITY: Distance = Distance::MAX;

/// Opaque vertex identifier, doubling as an index into per-vertex arrays.
/// 不透明的顶点标识，同时用作逐顶点数组的下标。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VertexId(pub u32);

impl VertexId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Handle to an entry slot in the reclaimer's arena.
///
/// An id is only meaningful between `allocate` and `retire`, and only while the
/// holder is active. Once retired it may be handed out again after two epochs.
///
/// 回收器 arena 中某个条目槽的句柄。
/// id 仅在 `allocate` 与 `retire` 之间、且持有者处于活跃状态时有意义。
/// 退休后，它可能在两个纪元之后被再次分配。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(u32);

impl EntryId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A `(vertex, distance)` candidate, copied out of the arena.
/// 从 arena 中复制出的 `(顶点, 距离)` 候选。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub vertex: VertexId,
    pub distance: Distance,
}

impl Entry {
    #[inline]
    pub fn new(vertex: VertexId, distance: Distance) -> Self {
        Self { vertex, distance }
    }
}

#[derive(Debug)]
struct EntrySlot {
    vertex: AtomicU32,
    distance: AtomicU64,
}

impl EntrySlot {
    fn new() -> Self {
        Self {
            vertex: AtomicU32::new(0),
            distance: AtomicU64::new(INFINITY),
        }
    }
}

/// Ids are `u32`; chunk `k` holds `base << k` slots, so 33 chunks cover every id.
const MAX_CHUNKS: usize = 33;

/// Segmented slot storage for entries.
///
/// Chunks never move once published, so a slot can be read without any lock.
/// Chunk `k` holds `base << k` slots. Only the holder of the allocator mutex
/// publishes new chunks.
///
/// 条目的分段槽存储。
/// 块一旦发布就不会移动，因此读取槽无需加锁。
/// 第 `k` 块包含 `base << k` 个槽。只有持有分配互斥锁的一方会发布新块。
pub(crate) struct Arena {
    base_shift: u32,
    chunks: [AtomicPtr<EntrySlot>; MAX_CHUNKS],
}

impl Arena {
    /// `base` is rounded up to a power of two.
    pub(crate) fn new(base: usize) -> Self {
        let base_shift = base.max(1).next_power_of_two().trailing_zeros();
        Self {
            base_shift,
            chunks: std::array::from_fn(|_| AtomicPtr::new(std::ptr::null_mut())),
        }
    }

    #[inline]
    fn chunk_len(&self, chunk: usize) -> usize {
        1usize << (self.base_shift as usize + chunk)
    }

    /// Map an id to `(chunk, offset)`.
    #[inline]
    fn locate(&self, id: u64) -> (usize, usize) {
        let n = (id >> self.base_shift) + 1;
        let chunk = (63 - n.leading_zeros()) as usize;
        let first = ((1u64 << chunk) - 1) << self.base_shift;
        (chunk, (id - first) as usize)
    }

    #[inline]
    fn slot(&self, id: EntryId) -> &EntrySlot {
        let (chunk, offset) = self.locate(id.0 as u64);
        let ptr = self.chunks[chunk].load(Ordering::Acquire);
        assert!(!ptr.is_null(), "BUG: {id:?} lies outside the published arena");
        // SAFETY:
        // 1. `ptr` points at a live boxed slice of `chunk_len(chunk)` slots, published with Release
        // 2. `offset < chunk_len(chunk)` by construction of `locate`
        // 3. Chunks are only freed in `Drop`, which has exclusive access
        unsafe { &*ptr.add(offset) }
    }

    #[inline]
    pub(crate) fn read(&self, id: EntryId) -> Entry {
        let slot = self.slot(id);
        Entry {
            vertex: VertexId(slot.vertex.load(Ordering::Relaxed)),
            distance: slot.distance.load(Ordering::Relaxed),
        }
    }

    #[inline]
    pub(crate) fn write(&self, id: EntryId, entry: Entry) {
        let slot = self.slot(id);
        slot.vertex.store(entry.vertex.0, Ordering::Relaxed);
        slot.distance.store(entry.distance, Ordering::Relaxed);
    }

    /// Hand out up to `count` ids into `out`, reusing freed ids before carving new slots.
    ///
    /// Must be called with the allocator mutex held; `state` is its payload.
    ///
    /// 向 `out` 分发最多 `count` 个 id，优先复用已释放的 id，再切分新槽。
    /// 必须在持有分配互斥锁时调用；`state` 即其保护的数据。
    pub(crate) fn refill(&self, state: &mut AllocatorState, out: &mut Vec<EntryId>, count: usize) {
        let reused = count.min(state.free.len());
        out.extend(state.free.drain(state.free.len() - reused..));

        for _ in reused..count {
            let id = state.next_unused;
            assert!(id <= u32::MAX as u64, "entry arena exhausted after {id} slots");
            let (chunk, _) = self.locate(id);
            if self.chunks[chunk].load(Ordering::Relaxed).is_null() {
                self.publish_chunk(chunk);
            }
            state.next_unused += 1;
            out.push(EntryId(id as u32));
        }
    }

    fn publish_chunk(&self, chunk: usize) {
        let len = self.chunk_len(chunk);
        let slots: Box<[EntrySlot]> = (0..len).map(|_| EntrySlot::new()).collect();
        let ptr = Box::into_raw(slots).cast::<EntrySlot>();
        self.chunks[chunk].store(ptr, Ordering::Release);
        log::debug!("arena chunk {chunk} published with {len} slots");
    }

    /// Number of slots in published chunks.
    pub(crate) fn capacity(&self) -> usize {
        (0..MAX_CHUNKS)
            .take_while(|&c| !self.chunks[c].load(Ordering::Acquire).is_null())
            .map(|c| self.chunk_len(c))
            .sum()
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("base", &(1usize << self.base_shift))
            .field("capacity", &self.capacity())
            .finish()
    }
}

impl Drop for Arena {
    /// At drop time no participant can still hold an id, so every chunk goes.
    /// drop 时不再有参与者持有 id，因此释放所有块。
    fn drop(&mut self) {
        for chunk in 0..MAX_CHUNKS {
            let ptr = self.chunks[chunk].load(Ordering::Relaxed);
            if !ptr.is_null() {
                let len = self.chunk_len(chunk);
                // SAFETY: `ptr` came from `Box::<[EntrySlot]>::into_raw` with exactly `len` slots.
                unsafe {
                    drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(ptr, len)));
                }
            }
        }
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;

    #[test]
    fn locate_walks_doubling_chunks() {
        let arena = Arena::new(4);
        assert_eq!(arena.locate(0), (0, 0));
        assert_eq!(arena.locate(3), (0, 3));
        assert_eq!(arena.locate(4), (1, 0));
        assert_eq!(arena.locate(11), (1, 7));
        assert_eq!(arena.locate(12), (2, 0));
        assert_eq!(arena.locate(27), (2, 15));
        assert_eq!(arena.locate(28), (3, 0));
    }

    #[test]
    fn refill_prefers_freed_ids() {
        let arena = Arena::new(2);
        let mut state = AllocatorState::default();
        let mut out = Vec::new();
        arena.refill(&mut state, &mut out, 3);
        assert_eq!(out, vec![EntryId(0), EntryId(1), EntryId(2)]);
        assert_eq!(arena.capacity(), 2 + 4);

        state.free.push(EntryId(1));
        out.clear();
        arena.refill(&mut state, &mut out, 2);
        assert_eq!(out, vec![EntryId(1), EntryId(3)]);
    }

    #[test]
    fn write_then_read_slot() {
        let arena = Arena::new(8);
        let mut state = AllocatorState::default();
        let mut out = Vec::new();
        arena.refill(&mut state, &mut out, 20);
        let id = out[17];
        arena.write(id, Entry::new(VertexId(7), 42));
        assert_eq!(arena.read(id), Entry::new(VertexId(7), 42));
    }
}
