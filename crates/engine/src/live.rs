// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live state of the current act group
//!
//! A [`LiveGroup`] exists only while its group is current. Launched work
//! reports back through a [`Completion`], which carries a ticket: once the
//! group is disconnected or the execution times out, the ticket is claimed
//! by someone else and the late completion is dropped.

use crate::act::{Act, ActGroup, ActResult};
use crate::computation::{ComputationMode, Schedulable};
use crate::driver::Trigger;
use parking_lot::Mutex;
use rampart_core::checker::{
    is_attempt_satisfied, is_in_attempt, is_ready_to_execute, time_until_next_execution_ms,
    time_until_next_retry_ms, time_until_timeout_ms, NEVER,
};
use rampart_core::{CircuitBreaker, ExecutionError, ExecutionStatus, Notification};
use rampart_storage::ValueStore;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::AbortHandle;

/// Ticket value meaning "nothing in flight"
const IDLE: u64 = 0;

/// Per-act state for one materialization of a group
pub(crate) struct LiveAct {
    def: Act,
    status: ExecutionStatus,
    ticket: AtomicU64,
    abort: Mutex<Option<AbortHandle>>,
    /// Breaker whose half-open probe the in-flight execution holds
    probe: Mutex<Option<Arc<CircuitBreaker>>>,
    last_error: Mutex<Option<ExecutionError>>,
}

impl LiveAct {
    pub(crate) fn new(def: Act, now: Instant) -> Self {
        Self {
            def,
            status: ExecutionStatus::new(now),
            ticket: AtomicU64::new(IDLE),
            abort: Mutex::new(None),
            probe: Mutex::new(None),
            last_error: Mutex::new(None),
        }
    }

    pub(crate) fn def(&self) -> &Act {
        &self.def
    }

    pub(crate) fn status(&self) -> &ExecutionStatus {
        &self.status
    }

    /// Issue a ticket for a new execution
    pub(crate) fn arm(&self, ticket: u64) {
        self.ticket.store(ticket, Ordering::SeqCst);
    }

    pub(crate) fn set_abort(&self, handle: Option<AbortHandle>) {
        *self.abort.lock() = handle;
    }

    /// Take ownership of the in-flight execution's outcome
    pub(crate) fn claim(&self, ticket: u64) -> bool {
        ticket != IDLE
            && self
                .ticket
                .compare_exchange(ticket, IDLE, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
    }

    /// Claim whatever is in flight, aborting its task
    pub(crate) fn claim_current(&self) -> bool {
        let ticket = self.ticket.load(Ordering::SeqCst);
        if !self.claim(ticket) {
            return false;
        }
        if let Some(handle) = self.abort.lock().take() {
            handle.abort();
        }
        true
    }

    pub(crate) fn hold_probe(&self, breaker: Arc<CircuitBreaker>) {
        *self.probe.lock() = Some(breaker);
    }

    /// Forget the probe once its breaker has been told the outcome
    pub(crate) fn take_probe(&self) -> Option<Arc<CircuitBreaker>> {
        self.probe.lock().take()
    }

    /// Hand back a probe whose execution will never report
    pub(crate) fn release_probe(&self, now: Instant) {
        if let Some(breaker) = self.take_probe() {
            breaker.release_probe(now);
        }
    }

    pub(crate) fn record_error(&self, error: ExecutionError) {
        *self.last_error.lock() = Some(error);
    }

    /// No execution in flight and no attempts left
    pub(crate) fn is_finished(&self) -> bool {
        !self.status.is_executing() && !is_in_attempt(&self.status, &self.def.policy().attempt)
    }

    pub(crate) fn is_satisfied(&self) -> bool {
        is_attempt_satisfied(&self.status, &self.def.policy().attempt)
    }

    /// Delay until this act wants attention; `launchable` is false when the
    /// group has no free slot for it
    fn wake_in_ms(&self, launchable: bool, now: Instant) -> i64 {
        let policy = self.def.policy();
        if self.status.is_executing() {
            return time_until_timeout_ms(&self.status, &policy.timeout, now);
        }
        if !launchable || !is_in_attempt(&self.status, &policy.attempt) {
            return NEVER;
        }
        time_until_next_execution_ms(&self.status, &policy.interval, now)
            .min(time_until_next_retry_ms(&self.status, &policy.retry_interval, now))
    }
}

impl Schedulable for LiveAct {
    fn is_executing(&self) -> bool {
        self.status.is_executing()
    }

    fn is_ready(&self, now: Instant) -> bool {
        is_ready_to_execute(&self.status, self.def.policy(), now)
    }
}

/// Where the current group stands
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum GroupProgress {
    Running,
    Done,
    Failed(ExecutionError),
}

pub(crate) struct LiveGroup {
    index: usize,
    def: ActGroup,
    acts: Vec<Arc<LiveAct>>,
    in_flight: AtomicUsize,
    connected: AtomicBool,
    fatal: Mutex<Option<ExecutionError>>,
    cancel_requested: AtomicBool,
}

impl LiveGroup {
    pub(crate) fn materialize(index: usize, def: &ActGroup, now: Instant) -> Self {
        let acts = def
            .acts()
            .iter()
            .map(|act| Arc::new(LiveAct::new(act.clone(), now)))
            .collect();
        Self {
            index,
            def: def.clone(),
            acts,
            in_flight: AtomicUsize::new(0),
            connected: AtomicBool::new(true),
            fatal: Mutex::new(None),
            cancel_requested: AtomicBool::new(false),
        }
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn def(&self) -> &ActGroup {
        &self.def
    }

    pub(crate) fn acts(&self) -> &[Arc<LiveAct>] {
        &self.acts
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn launched(&self) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
    }

    /// Returns the number still in flight
    pub(crate) fn landed(&self) -> usize {
        let previous = self
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_sub(1)))
            .unwrap_or(0);
        previous.saturating_sub(1)
    }

    pub(crate) fn fail(&self, error: ExecutionError) {
        self.fatal.lock().get_or_insert(error);
    }

    pub(crate) fn request_cancel(&self) {
        self.cancel_requested.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }

    pub(crate) fn progress(&self) -> GroupProgress {
        if let Some(error) = self.fatal.lock().clone() {
            return GroupProgress::Failed(error);
        }
        let mut done = true;
        for act in &self.acts {
            if !act.is_finished() {
                done = false;
                continue;
            }
            if !act.is_satisfied() {
                let error = act.last_error.lock().clone().unwrap_or_else(|| {
                    ExecutionError::policy_violation(format!(
                        "act {} exhausted its attempts",
                        act.def.key()
                    ))
                });
                return GroupProgress::Failed(error);
            }
        }
        if done {
            GroupProgress::Done
        } else {
            GroupProgress::Running
        }
    }

    /// Delay until the group wants another tick
    pub(crate) fn wake_in_ms(&self, max_concurrency: usize, now: Instant) -> i64 {
        if self.progress() != GroupProgress::Running {
            return 0;
        }
        let executing = self.acts.iter().filter(|act| act.is_executing()).count();
        let launchable = match self.def.mode() {
            ComputationMode::Sequential => executing == 0,
            ComputationMode::Parallel => executing < max_concurrency.max(1),
        };
        self.acts
            .iter()
            .map(|act| act.wake_in_ms(launchable, now))
            .min()
            .unwrap_or(NEVER)
    }

    /// Stop listening; in-flight work is claimed and aborted, and any
    /// half-open probe it held is released
    pub(crate) fn disconnect(&self, now: Instant) {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return;
        }
        for act in &self.acts {
            if act.claim_current() {
                act.release_probe(now);
                self.landed();
            }
        }
    }
}

/// Hands one execution's outcome back to its group
pub struct Completion {
    pub(crate) act: Arc<LiveAct>,
    pub(crate) group: Arc<LiveGroup>,
    pub(crate) ticket: u64,
    pub(crate) breaker: Arc<CircuitBreaker>,
    pub(crate) store: Arc<dyn ValueStore>,
    pub(crate) trigger: Arc<dyn Trigger>,
    pub(crate) now: Arc<dyn Fn() -> Instant + Send + Sync>,
}

impl Completion {
    pub fn key(&self) -> &str {
        self.act.def.key()
    }

    /// Record the outcome; stale completions are ignored
    pub fn complete(self, result: ActResult) {
        let act = &self.act;
        let key = act.def.key();
        if !act.claim(self.ticket) {
            tracing::debug!(act = key, "stale completion ignored");
            return;
        }
        act.set_abort(None);
        let probe = act.take_probe().is_some();
        let now = (self.now)();

        let outcome = match result {
            Ok(Some(value)) => match self.store.put(key, value.clone()) {
                Ok(()) => Ok(Some(value)),
                Err(e) => Err(ExecutionError::Action(format!("store write failed: {}", e))),
            },
            Ok(None) if act.def.policy().error_on_null => Err(ExecutionError::NullResult),
            Ok(None) => Ok(None),
            Err(e) => Err(ExecutionError::from(e)),
        };

        let mut halt = false;
        match outcome {
            Ok(value) => {
                act.status.success();
                self.breaker.success();
                if let Some(value) = value {
                    act.def.subject().emit(&Notification::Next(value));
                }
                act.def.subject().emit(&Notification::Complete);
                self.group
                    .def
                    .subject()
                    .emit(&Notification::Next(key.to_string()));
                tracing::debug!(act = key, "act completed");
            }
            Err(ExecutionError::Cancelled) => {
                if probe {
                    self.breaker.release_probe(now);
                }
                act.status.cancel();
                self.group.request_cancel();
                act.def
                    .subject()
                    .emit(&Notification::Error(ExecutionError::Cancelled));
                halt = true;
            }
            Err(error) => {
                act.status.failure(now);
                self.breaker.failure(now);
                if matches!(error, ExecutionError::Fatal(_)) {
                    self.group.fail(error.clone());
                    halt = true;
                }
                tracing::debug!(act = key, error = %error, "act failed");
                act.record_error(error.clone());
                act.def.subject().emit(&Notification::Error(error));
            }
        }

        let remaining = self.group.landed();
        if !self.group.is_connected() {
            return;
        }
        let wake = halt
            || match self.group.def.mode() {
                ComputationMode::Sequential => true,
                ComputationMode::Parallel => remaining == 0,
            };
        if wake {
            self.trigger.trigger_now();
        }
    }
}

#[cfg(test)]
#[path = "live_tests.rs"]
mod tests;
