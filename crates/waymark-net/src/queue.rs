//! In-memory FIFO of requests deferred for connectivity reasons.
//!
//! Process-lifetime only: entries are lost on app quit, which is
//! acceptable because every queued call is also surfaced to its caller as
//! an error or deferred state. The queue is mutated from worker threads
//! (failure path) and the completion context (drain), so access is guarded
//! by one mutex. Bounded by policy rather than left to grow while the app
//! is offline: on overflow the oldest entry is dropped.

use crate::request::ApiRequest;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, warn};

/// A deferred request plus its enqueue timestamp.
pub struct QueuedEntry {
    pub request: ApiRequest,
    pub queued_at: Instant,
}

/// FIFO store of requests awaiting replay.
pub struct RequestQueue {
    entries: Mutex<VecDeque<QueuedEntry>>,
    max_queued: usize,
}

impl RequestQueue {
    pub fn new(max_queued: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            max_queued,
        }
    }

    /// Append a request at the tail.
    ///
    /// No deduplication: the same logical request deferred twice produces
    /// two entries, each replayed independently.
    pub fn enqueue(&self, request: ApiRequest) {
        let mut entries = self.entries.lock().expect("request queue poisoned");
        if entries.len() >= self.max_queued {
            warn!(
                max = self.max_queued,
                "deferred-request queue full; dropping oldest entry"
            );
            entries.pop_front();
        }
        entries.push_back(QueuedEntry {
            request,
            queued_at: Instant::now(),
        });
        debug!(queued = entries.len(), "request deferred for replay");
    }

    /// Snapshot and clear the queue, preserving enqueue order.
    pub fn drain(&self) -> Vec<QueuedEntry> {
        self.entries
            .lock()
            .expect("request queue poisoned")
            .drain(..)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("request queue poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
