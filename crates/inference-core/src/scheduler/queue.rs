//! Priority-ordered job queue.
//!
//! Orders by `(priority desc, submitted_at asc)`: higher-priority jobs run
//! first, ties broken FIFO. Grounded in the original scheduler's
//! `asyncio.PriorityQueue` over `(-priority, timestamp, job)` tuples — a
//! `BinaryHeap` behind a mutex is the thread-based equivalent.

use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Instant;

use crate::types::JobId;

#[derive(Debug, Eq, PartialEq)]
struct QueueEntry {
    job_id: JobId,
    priority: i32,
    submitted_at: Instant,
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.submitted_at.cmp(&self.submitted_at))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Bounded priority queue of job ids. Holds no job data itself — the
/// registry is the source of truth, this just orders the ids.
pub struct JobQueue {
    heap: Mutex<BinaryHeap<QueueEntry>>,
    capacity: usize,
}

impl JobQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pushes `job_id` onto the queue, failing if it's already at capacity.
    pub fn push(&self, job_id: JobId, priority: i32, submitted_at: Instant) -> bool {
        let mut heap = self.heap.lock();
        if heap.len() >= self.capacity {
            return false;
        }
        heap.push(QueueEntry {
            job_id,
            priority,
            submitted_at,
        });
        true
    }

    /// Pops the highest-priority, oldest-submitted job id, if any.
    pub fn pop(&self) -> Option<JobId> {
        self.heap.lock().pop().map(|entry| entry.job_id)
    }
}
