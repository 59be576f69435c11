//! Array-backed d-ary min-heap.
//!
//! The heap has no synchronisation of its own; inside a `MultiQueue` every
//! heap is only touched while its partition lock is held.
//!
//! 基于数组的 d 叉最小堆。
//! 堆本身没有任何同步；在 `MultiQueue` 中，每个堆只在持有其分区锁时被访问。

use crate::arena::{Distance, Entry, INFINITY};

/// Default fan-out of each heap node.
/// 每个堆节点的默认分叉数。
pub const DEFAULT_ARITY: usize = 8;

/// Anything ordered by a distance key.
pub trait Keyed: Copy {
    fn key(&self) -> Distance;
}

impl Keyed for Distance {
    #[inline]
    fn key(&self) -> Distance {
        *self
    }
}

impl Keyed for Entry {
    #[inline]
    fn key(&self) -> Distance {
        self.distance
    }
}

#[inline]
fn parent(i: usize, d: usize) -> usize {
    (i - 1) / d
}

#[inline]
fn first_child(i: usize, d: usize) -> usize {
    d * i + 1
}

/// A resizable d-ary min-heap over `Keyed` items.
///
/// Slots past `len()` are always `None`. Capacity doubles when an insert finds
/// the array full, and existing items keep their positions.
///
/// # Example
/// ```
/// use multiqueue_epoch::heap::DAryHeap;
///
/// let mut heap = DAryHeap::with_arity(2, 4);
/// for distance in [7u64, 3, 9, 1] {
///     heap.insert(distance);
/// }
/// assert_eq!(heap.find_min(), Some(1));
/// assert_eq!(heap.extract_min(), Some(1));
/// assert_eq!(heap.extract_min(), Some(3));
/// assert_eq!(heap.capacity(), 4);
/// ```
#[derive(Debug, Clone)]
pub struct DAryHeap<T> {
    elements: Box<[Option<T>]>,
    size: usize,
    arity: usize,
}

impl<T: Keyed> DAryHeap<T> {
    /// Create a heap with the default arity of 8.
    #[inline]
    pub fn new(capacity: usize) -> Self {
        Self::with_arity(capacity, DEFAULT_ARITY)
    }

    /// # Panics
    /// If `capacity` is zero or `arity` is below two.
    pub fn with_arity(capacity: usize, arity: usize) -> Self {
        assert!(capacity > 0, "heap capacity must be positive");
        assert!(arity >= 2, "heap arity must be at least 2, got {arity}");
        Self {
            elements: vec![None; capacity].into_boxed_slice(),
            size: 0,
            arity,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.elements.len()
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Peek at the minimum without removing it.
    #[inline]
    pub fn find_min(&self) -> Option<T> {
        if self.size == 0 { None } else { self.elements[0] }
    }

    /// Insert `item`, doubling the capacity first if the array is full.
    ///
    /// The new slot counts as `INFINITY` while it sifts up, and the item is
    /// written only once its final index is known.
    ///
    /// 插入 `item`，若数组已满则先将容量翻倍。
    /// 新槽在上浮过程中视为 `INFINITY`，只有确定最终位置后才写入该元素。
    pub fn insert(&mut self, item: T) {
        if self.size == self.capacity() {
            self.grow();
        }
        let hole = self.size;
        self.size += 1;
        let index = self.decrease_key(hole, INFINITY, item.key());
        self.elements[index] = Some(item);
    }

    /// Remove and return the minimum, or `None` when empty.
    ///
    /// 移除并返回最小元素；堆为空时返回 `None`。
    pub fn extract_min(&mut self) -> Option<T> {
        if self.size == 0 {
            return None;
        }
        let last = self.size - 1;
        let min = self.elements[0].take();
        if last > 0 {
            self.elements[0] = self.elements[last].take();
        }
        self.size = last;
        self.sift_down(0);
        min
    }

    /// Move the hole at `i`, whose key is `current`, up towards the root for `key`.
    ///
    /// Returns the index where an item with `key` belongs. Parents that are
    /// larger than `key` are shifted down into the hole on the way.
    fn decrease_key(&mut self, mut i: usize, current: Distance, key: Distance) -> usize {
        assert!(
            key <= current,
            "BUG: decrease_key raised slot {i} from {current} to {key}: new key is larger than current key"
        );
        while i > 0 {
            let p = parent(i, self.arity);
            if self.key_at(p) <= key {
                break;
            }
            self.elements[i] = self.elements[p].take();
            i = p;
        }
        i
    }

    fn sift_down(&mut self, mut i: usize) {
        loop {
            let base = first_child(i, self.arity);
            if base >= self.size {
                return;
            }
            let end = (base + self.arity).min(self.size);

            let mut smallest = i;
            let mut smallest_key = self.key_at(i);
            for child in base..end {
                let key = self.key_at(child);
                if key < smallest_key {
                    smallest = child;
                    smallest_key = key;
                }
            }
            if smallest == i {
                return;
            }
            self.elements.swap(i, smallest);
            i = smallest;
        }
    }

    fn grow(&mut self) {
        let old = self.capacity();
        let mut grown = vec![None; old * 2].into_boxed_slice();
        grown[..old].copy_from_slice(&self.elements);
        self.elements = grown;
        log::debug!("heap capacity doubled from {old} to {}", old * 2);
    }

    #[inline]
    fn key_at(&self, i: usize) -> Distance {
        match &self.elements[i] {
            Some(item) => item.key(),
            None => panic!("BUG: heap slot {i} is empty below size {}", self.size),
        }
    }

    /// Check the heap property and the occupancy of every slot.
    pub fn check_invariant(&self) -> bool {
        let occupied = self.elements[..self.size].iter().all(Option::is_some)
            && self.elements[self.size..].iter().all(Option::is_none);
        occupied && (1..self.size).all(|i| self.key_at(i) >= self.key_at(parent(i, self.arity)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decrease_key_moves_hole_past_larger_parents() {
        let mut heap = DAryHeap::with_arity(8, 2);
        for distance in [2u64, 5, 9] {
            heap.insert(distance);
        }
        // Slot 2 holds 9; a key of 1 climbs to the root, 6 stays put.
        assert_eq!(heap.decrease_key(2, 9, 6), 2);
        assert_eq!(heap.decrease_key(2, 9, 1), 0);
    }

    #[test]
    #[should_panic(expected = "new key is larger than current key")]
    fn decrease_key_rejects_larger_key() {
        let mut heap = DAryHeap::with_arity(4, 2);
        heap.insert(3u64);
        heap.insert(7u64);
        heap.decrease_key(1, 7, 8);
    }
}
