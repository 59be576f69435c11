//! A relaxed concurrent priority queue (MultiQueue) whose entries are recycled
//! by quiescent-state epoch reclamation, and a parallel Dijkstra built on it.
//!
//! The pieces, bottom up:
//!
//! - [`Reclaimer`] / [`Participant`]: an epoch domain in which each worker
//!   thread alternates between quiescent and active. Entries retired while
//!   active are reused only after every thread has moved past their epoch.
//! - [`heap::DAryHeap`]: the resizable d-ary min-heap behind every partition.
//! - [`MultiQueue`] / [`QueueWorker`]: `c * p` independently locked heaps.
//!   Inserts pick a random unlocked partition; `delete_min` compares two random
//!   partitions and extracts from the better one.
//! - [`dijkstra`]: single-source shortest paths driven by `p` worker threads.
//!
//! # Example
//! ```
//! use multiqueue_epoch::dijkstra::{self, SsspConfig};
//! use multiqueue_epoch::Graph;
//!
//! let graph: Graph = "4 4 0\n0 1 1\n1 2 2\n0 2 5\n2 3 1\n".parse().unwrap();
//! let distances = dijkstra::shortest_paths(&graph, &SsspConfig::new(2, 4)).unwrap();
//! assert_eq!(distances, [0, 1, 3, 4]);
//! ```
//!
//! 一个松弛并发优先队列（MultiQueue），其条目通过静止状态纪元回收复用，
//! 以及基于它的并行 Dijkstra 算法。

mod arena;
mod domain;
mod error;
mod garbage;
mod multiqueue;
mod participant;
mod state;
mod sync;

pub mod dijkstra;
pub mod graph;
pub mod heap;

pub use arena::{Distance, Entry, EntryId, VertexId, INFINITY};
pub use domain::{Reclaimer, ReclaimerBuilder, ReclaimerStats};
pub use error::{Error, GraphError, Result};
pub use graph::Graph;
pub use multiqueue::{EntryHandle, MultiQueue, MultiQueueBuilder, QueueWorker, DEFAULT_QUEUE_CAPACITY};
pub use participant::{ActiveGuard, Participant};
pub use state::{DEFAULT_CHECK_INTERVAL, DEFAULT_EPOCH_BAGS, EPOCH_INCREMENT};

#[cfg(all(test, not(feature = "loom")))]
mod tests;
