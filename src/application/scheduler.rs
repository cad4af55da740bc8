//! Virtual-time timer queue and retry policy
//!
//! Every suspension point of the session (retry attempts, debounce window,
//! navigation settle delay) is a task in this queue. Time only moves when the
//! owner advances it, so ordering is deterministic.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Handle for cancelling a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Pending tasks ordered by deadline, then by scheduling order.
#[derive(Debug)]
pub struct TimerQueue<T> {
    now_ms: u64,
    next_seq: u64,
    pending: BTreeMap<(u64, u64), T>,
    deadlines: HashMap<TimerId, u64>,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            now_ms: 0,
            next_seq: 0,
            pending: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn schedule(&mut self, delay_ms: u64, task: T) -> TimerId {
        let seq = self.next_seq;
        self.next_seq += 1;
        let due = self.now_ms.saturating_add(delay_ms);
        self.pending.insert((due, seq), task);
        let id = TimerId(seq);
        self.deadlines.insert(id, due);
        id
    }

    /// Returns false if the task already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.deadlines.remove(&id) {
            Some(due) => self.pending.remove(&(due, id.0)).is_some(),
            None => false,
        }
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.deadlines.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.pending.keys().next().map(|&(due, _)| due)
    }

    /// Pop the earliest task due at or before `until`, moving the clock to its deadline.
    pub fn pop_due(&mut self, until: u64) -> Option<(TimerId, T)> {
        let (&(due, seq), _) = self.pending.iter().next()?;
        if due > until {
            return None;
        }
        let task = self.pending.remove(&(due, seq))?;
        let id = TimerId(seq);
        self.deadlines.remove(&id);
        self.now_ms = self.now_ms.max(due);
        Some((id, task))
    }

    /// Move the clock forward without running anything.
    pub fn set_now(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
    }
}

/// Bounded list of apply attempts scheduled after each enable.
///
/// Delays are measured from the enable, not from the previous attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    delays_ms: Vec<u64>,
}

impl RetryPolicy {
    pub fn new(delays_ms: Vec<u64>) -> Self {
        Self { delays_ms }
    }

    pub fn delays(&self) -> &[u64] {
        &self.delays_ms
    }

    pub fn max_attempts(&self) -> usize {
        self.delays_ms.len()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(vec![100, 500, 1000])
    }
}
