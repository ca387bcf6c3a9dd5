//! Cancellable deadline timers.
//!
//! The host drives expiry by calling `expire(now)` (on every key press and on
//! every tick). Nothing here spawns threads or sleeps; a timer only "fires"
//! when polled, which keeps chord timeouts deterministic under a manual clock.

use std::collections::{BTreeMap, HashMap};
use tracing::trace;

/// Opaque handle returned by `Timers::schedule`. Never reused within one `Timers`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

#[derive(Debug)]
pub struct Timers<K> {
    next_id: u64,
    // (deadline_ms, id) keeps expiry in deadline order with scheduling order as tie-break.
    queue: BTreeMap<(u64, u64), K>,
    deadlines: HashMap<u64, u64>,
}

impl<K> Default for Timers<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Timers<K> {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            queue: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }

    pub fn schedule(&mut self, now_ms: u64, delay_ms: u64, kind: K) -> TimerHandle {
        let id = self.next_id;
        self.next_id += 1;
        let deadline = now_ms.saturating_add(delay_ms);
        self.queue.insert((deadline, id), kind);
        self.deadlines.insert(id, deadline);
        trace!(target: "timer", id, deadline, "schedule");
        TimerHandle(id)
    }

    /// Cancel a pending timer. Returns false when it already fired or was cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let Some(deadline) = self.deadlines.remove(&handle.0) else {
            return false;
        };
        self.queue.remove(&(deadline, handle.0));
        trace!(target: "timer", id = handle.0, "cancel");
        true
    }

    pub fn deadline(&self, handle: TimerHandle) -> Option<u64> {
        self.deadlines.get(&handle.0).copied()
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.deadlines.contains_key(&handle.0)
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.queue.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Remove and return every timer whose deadline is at or before `now_ms`, earliest first.
    pub fn expire(&mut self, now_ms: u64) -> Vec<(TimerHandle, K)> {
        let mut fired = Vec::new();
        while let Some(entry) = self.queue.first_entry() {
            let (deadline, id) = *entry.key();
            if deadline > now_ms {
                break;
            }
            let kind = entry.remove();
            self.deadlines.remove(&id);
            trace!(target: "timer", id, deadline, now_ms, "expire");
            fired.push((TimerHandle(id), kind));
        }
        fired
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.deadlines.clear();
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
