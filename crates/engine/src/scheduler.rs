// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timer heap behind the driver
//!
//! Each key has at most one live deadline. Scheduling a key again keeps the
//! earlier of the two deadlines; superseded heap entries are skipped lazily.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::{Duration, Instant};

/// Identifies a registered tickable
pub type TickId = u64;

/// The kind of scheduled event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScheduledKind {
    /// Run one tick of a controller
    Tick(TickId),
    /// Evict idle breaker and limiter entries
    RegistrySweep,
}

/// A scheduled item
#[derive(Debug, Clone)]
pub struct ScheduledItem {
    pub kind: ScheduledKind,
    pub fire_at: Instant,
    pub repeat: Option<Duration>,
}

impl PartialEq for ScheduledItem {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at && self.kind == other.kind
    }
}

impl Eq for ScheduledItem {}

impl PartialOrd for ScheduledItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Min-heap: earliest first
        Reverse(self.fire_at).cmp(&Reverse(other.fire_at))
    }
}

/// Manages scheduled events
pub struct Scheduler {
    items: BinaryHeap<ScheduledItem>,
    pending: HashMap<ScheduledKind, Instant>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            items: BinaryHeap::new(),
            pending: HashMap::new(),
        }
    }

    /// Schedule a one-shot timer, keeping any earlier deadline for `kind`
    pub fn schedule(&mut self, kind: ScheduledKind, fire_at: Instant) {
        self.push(kind, fire_at, None);
    }

    /// Schedule a repeating timer
    pub fn schedule_repeating(&mut self, kind: ScheduledKind, fire_at: Instant, interval: Duration) {
        self.push(kind, fire_at, Some(interval));
    }

    fn push(&mut self, kind: ScheduledKind, fire_at: Instant, repeat: Option<Duration>) {
        if let Some(existing) = self.pending.get(&kind) {
            if *existing <= fire_at {
                return;
            }
        }
        self.pending.insert(kind, fire_at);
        self.items.push(ScheduledItem {
            kind,
            fire_at,
            repeat,
        });
    }

    /// Cancel a scheduled item
    pub fn cancel(&mut self, kind: ScheduledKind) {
        self.pending.remove(&kind);
    }

    /// Get all items that should fire at or before the given time
    pub fn poll(&mut self, now: Instant) -> Vec<ScheduledItem> {
        let mut ready = Vec::new();

        while let Some(item) = self.items.peek() {
            if item.fire_at > now {
                break;
            }

            let Some(item) = self.items.pop() else {
                break;
            };

            // Skip cancelled or superseded entries
            if self.pending.get(&item.kind) != Some(&item.fire_at) {
                continue;
            }
            self.pending.remove(&item.kind);

            // Re-schedule if repeating
            if let Some(interval) = item.repeat {
                self.push(item.kind, item.fire_at + interval, Some(interval));
            }

            ready.push(item);
        }

        ready
    }

    /// Check if scheduler has any pending items
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Get the next fire time, if any
    pub fn next_fire_time(&self) -> Option<Instant> {
        self.pending.values().min().copied()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
