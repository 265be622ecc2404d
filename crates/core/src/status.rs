// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution status: the mutable run history behind every scheduling decision
//!
//! All fields are atomics so completion callbacks can record outcomes without
//! taking the owning controller's lock. Timestamps are milliseconds since the
//! status was constructed.

use crate::clock::millis_since;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

const NO_TIME: u64 = u64::MAX;

/// Run history for one command, act, or act chain
#[derive(Debug)]
pub struct ExecutionStatus {
    origin: Instant,
    subscribed_at: AtomicU64,
    total_attempted: AtomicU64,
    num_successes: AtomicU64,
    num_failures: AtomicU64,
    total_false_starts: AtomicU64,
    last_execution_start: AtomicU64,
    last_failure: AtomicU64,
    last_attempt_failed: AtomicBool,
    executing: AtomicBool,
    cancelled: AtomicBool,
    starting: AtomicBool,
}

/// Point-in-time copy of an [`ExecutionStatus`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub total_attempted: u64,
    pub num_successes: u64,
    pub num_failures: u64,
    pub total_false_starts: u64,
    pub last_execution_start_ms: Option<u64>,
    pub last_failure_ms: Option<u64>,
    pub is_executing: bool,
    pub is_cancelled: bool,
    pub is_starting: bool,
}

impl ExecutionStatus {
    pub fn new(now: Instant) -> Self {
        Self {
            origin: now,
            subscribed_at: AtomicU64::new(0),
            total_attempted: AtomicU64::new(0),
            num_successes: AtomicU64::new(0),
            num_failures: AtomicU64::new(0),
            total_false_starts: AtomicU64::new(0),
            last_execution_start: AtomicU64::new(NO_TIME),
            last_failure: AtomicU64::new(NO_TIME),
            last_attempt_failed: AtomicBool::new(false),
            executing: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            starting: AtomicBool::new(false),
        }
    }

    fn offset(&self, now: Instant) -> u64 {
        millis_since(self.origin, now)
    }

    /// Clear history for a new subscription cycle
    pub fn reset(&self, now: Instant) {
        self.subscribed_at.store(self.offset(now), Ordering::SeqCst);
        self.total_attempted.store(0, Ordering::SeqCst);
        self.num_successes.store(0, Ordering::SeqCst);
        self.num_failures.store(0, Ordering::SeqCst);
        self.total_false_starts.store(0, Ordering::SeqCst);
        self.last_execution_start.store(NO_TIME, Ordering::SeqCst);
        self.last_failure.store(NO_TIME, Ordering::SeqCst);
        self.last_attempt_failed.store(false, Ordering::SeqCst);
        self.executing.store(false, Ordering::SeqCst);
        self.cancelled.store(false, Ordering::SeqCst);
        self.starting.store(false, Ordering::SeqCst);
    }

    /// Begin an attempt. Returns false if one is already in flight.
    pub fn start(&self, now: Instant) -> bool {
        if self
            .executing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        self.total_attempted.fetch_add(1, Ordering::SeqCst);
        self.total_false_starts.store(0, Ordering::SeqCst);
        self.last_execution_start
            .store(self.offset(now), Ordering::SeqCst);
        self.starting.store(false, Ordering::SeqCst);
        true
    }

    /// Record a successful attempt and leave the executing state
    pub fn success(&self) {
        self.num_successes.fetch_add(1, Ordering::SeqCst);
        self.last_attempt_failed.store(false, Ordering::SeqCst);
        self.executing.store(false, Ordering::SeqCst);
    }

    /// Record a failed attempt and leave the executing state
    pub fn failure(&self, now: Instant) {
        self.num_failures.fetch_add(1, Ordering::SeqCst);
        self.last_failure.store(self.offset(now), Ordering::SeqCst);
        self.last_attempt_failed.store(true, Ordering::SeqCst);
        self.executing.store(false, Ordering::SeqCst);
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.executing.store(false, Ordering::SeqCst);
    }

    /// Record a scheduling slot that did not lead to an execution
    pub fn false_start(&self) {
        self.total_false_starts.fetch_add(1, Ordering::SeqCst);
    }

    pub fn set_starting(&self, starting: bool) {
        self.starting.store(starting, Ordering::SeqCst);
    }

    pub fn total_attempted(&self) -> u64 {
        self.total_attempted.load(Ordering::SeqCst)
    }

    pub fn num_successes(&self) -> u64 {
        self.num_successes.load(Ordering::SeqCst)
    }

    pub fn num_failures(&self) -> u64 {
        self.num_failures.load(Ordering::SeqCst)
    }

    pub fn total_false_starts(&self) -> u64 {
        self.total_false_starts.load(Ordering::SeqCst)
    }

    pub fn is_executing(&self) -> bool {
        self.executing.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn is_starting(&self) -> bool {
        self.starting.load(Ordering::SeqCst)
    }

    /// Whether the most recent finished attempt failed
    pub fn last_attempt_failed(&self) -> bool {
        self.last_attempt_failed.load(Ordering::SeqCst)
    }

    /// Milliseconds since the current subscription cycle began
    pub fn elapsed_since_subscribed_ms(&self, now: Instant) -> u64 {
        self.offset(now)
            .saturating_sub(self.subscribed_at.load(Ordering::SeqCst))
    }

    /// Milliseconds since the last attempt started, if any
    pub fn elapsed_since_last_start_ms(&self, now: Instant) -> Option<u64> {
        self.elapsed_since(&self.last_execution_start, now)
    }

    /// Milliseconds since the last failure, if any
    pub fn elapsed_since_last_failure_ms(&self, now: Instant) -> Option<u64> {
        self.elapsed_since(&self.last_failure, now)
    }

    fn elapsed_since(&self, stamp: &AtomicU64, now: Instant) -> Option<u64> {
        match stamp.load(Ordering::SeqCst) {
            NO_TIME => None,
            at => Some(self.offset(now).saturating_sub(at)),
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let stamp = |value: &AtomicU64| match value.load(Ordering::SeqCst) {
            NO_TIME => None,
            at => Some(at),
        };
        StatusSnapshot {
            total_attempted: self.total_attempted(),
            num_successes: self.num_successes(),
            num_failures: self.num_failures(),
            total_false_starts: self.total_false_starts(),
            last_execution_start_ms: stamp(&self.last_execution_start),
            last_failure_ms: stamp(&self.last_failure),
            is_executing: self.is_executing(),
            is_cancelled: self.is_cancelled(),
            is_starting: self.is_starting(),
        }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
