// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Acts controller: drives an act group chain through its groups
//!
//! Groups run strictly in order; the acts inside a group are picked by the
//! group's computation mode. The controller is tick-driven. Every `run()`
//! takes the state lock with a bounded wait, advances as far as it can
//! without blocking, and `next()` reports when it wants the next tick.
//! Completions arrive from launched tasks and only touch atomics, then ask
//! the trigger for a tick.

use crate::act::ActGroupChain;
use crate::composition::admit;
use crate::driver::{Tickable, Trigger};
use crate::launcher::{ActJob, Launcher};
use crate::live::{Completion, GroupProgress, LiveAct, LiveGroup};
use parking_lot::{Mutex, MutexGuard};
use rampart_core::checker::{
    is_in_attempt, is_in_retry_interval, is_policy_violated, is_timed_out,
    time_until_next_retry_ms, time_until_timeout_ms, NEVER,
};
use rampart_core::{
    Admission, CircuitBreaker, Clock, Defaults, ExecutionError, ExecutionStatus, Notification,
    ResilienceRegistry, StatusSnapshot,
};
use rampart_storage::ValueStore;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Lifecycle of an act group chain
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainState {
    NotStarted,
    Starting,
    ExecutingGroup,
    WaitingForNextGroup,
    RetryingGroup,
    ExecutingNextGroup,
    Finished,
    Failed,
    Cancelled,
}

impl ChainState {
    /// Whether the chain still wants ticks
    pub fn is_active(&self) -> bool {
        !matches!(
            self,
            ChainState::NotStarted | ChainState::Finished | ChainState::Failed | ChainState::Cancelled
        )
    }
}

impl fmt::Display for ChainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChainState::NotStarted => "not_started",
            ChainState::Starting => "starting",
            ChainState::ExecutingGroup => "executing_group",
            ChainState::WaitingForNextGroup => "waiting_for_next_group",
            ChainState::RetryingGroup => "retrying_group",
            ChainState::ExecutingNextGroup => "executing_next_group",
            ChainState::Finished => "finished",
            ChainState::Failed => "failed",
            ChainState::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}

/// Point-in-time view of a controller
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChainSnapshot {
    pub state: ChainState,
    pub group_index: Option<usize>,
    pub in_flight: usize,
    pub status: StatusSnapshot,
}

/// Collaborators shared by controllers
#[derive(Clone)]
pub struct ActsDeps {
    pub registry: Arc<ResilienceRegistry>,
    pub store: Arc<dyn ValueStore>,
    pub launcher: Arc<dyn Launcher>,
    pub trigger: Arc<dyn Trigger>,
}

struct Cursor {
    state: ChainState,
    index: usize,
    group: Option<Arc<LiveGroup>>,
}

pub struct ActsController<C: Clock> {
    chain: ActGroupChain,
    deps: ActsDeps,
    defaults: Defaults,
    clock: C,
    status: ExecutionStatus,
    cursor: Mutex<Cursor>,
    tickets: AtomicU64,
    cancel_requested: AtomicBool,
    /// The running chain holds its breaker's half-open probe
    probe: AtomicBool,
}

impl<C: Clock> ActsController<C> {
    pub fn new(chain: ActGroupChain, deps: ActsDeps, defaults: Defaults, clock: C) -> Self {
        let status = ExecutionStatus::new(clock.now());
        Self {
            chain,
            deps,
            defaults,
            clock,
            status,
            cursor: Mutex::new(Cursor {
                state: ChainState::NotStarted,
                index: 0,
                group: None,
            }),
            tickets: AtomicU64::new(1),
            cancel_requested: AtomicBool::new(false),
            probe: AtomicBool::new(false),
        }
    }

    pub fn chain(&self) -> &ActGroupChain {
        &self.chain
    }

    pub fn status(&self) -> &ExecutionStatus {
        &self.status
    }

    pub fn state(&self) -> ChainState {
        self.cursor.lock().state
    }

    pub fn snapshot(&self) -> ChainSnapshot {
        let cursor = self.cursor.lock();
        ChainSnapshot {
            state: cursor.state,
            group_index: cursor.group.as_ref().map(|group| group.index()),
            in_flight: cursor.group.as_ref().map_or(0, |group| group.in_flight()),
            status: self.status.snapshot(),
        }
    }

    fn lock(&self) -> Option<MutexGuard<'_, Cursor>> {
        let guard = self.cursor.try_lock_for(self.defaults.lock_timeout);
        if guard.is_none() {
            tracing::warn!(chain = self.chain.name(), "controller lock contended");
        }
        guard
    }

    fn breaker(&self, now: Instant) -> Arc<CircuitBreaker> {
        let policy = self.chain.policy();
        self.deps
            .registry
            .circuit_breaker(self.chain.circuit_id(), &policy.circuit_breaker, now)
    }

    /// Start the chain from its first group
    pub fn subscribe(&self) -> Result<(), ExecutionError> {
        let Some(mut cursor) = self.lock() else {
            return Err(ExecutionError::AlreadySubscribed);
        };
        if cursor.state.is_active() {
            return Err(ExecutionError::AlreadySubscribed);
        }
        let now = self.clock.now();
        let policy = self.chain.policy();
        let limiter =
            self.deps
                .registry
                .rate_limiter(self.chain.rate_limiter_id(), &policy.rate_limiter, now);
        let breaker = self.breaker(now);

        self.cancel_requested.store(false, Ordering::SeqCst);
        self.status.reset(now);
        self.status.start(now);
        cursor.index = 0;
        cursor.group = None;

        match admit(&limiter, &breaker, now) {
            Ok(admission) => self.probe.store(admission == Admission::Probe, Ordering::SeqCst),
            Err(error) => {
                self.status.failure(now);
                cursor.state = ChainState::Failed;
                tracing::info!(chain = self.chain.name(), error = %error, "chain rejected");
                self.chain.subject().emit(&Notification::Error(error.clone()));
                return Err(error);
            }
        }

        self.status.set_starting(true);
        cursor.state = ChainState::Starting;
        tracing::info!(chain = self.chain.name(), groups = self.chain.groups().len(), "chain subscribed");
        self.chain.subject().emit(&Notification::Subscribe);
        drop(cursor);
        self.deps.trigger.trigger_now();
        Ok(())
    }

    /// Advance the chain by one tick
    pub fn run(&self) {
        let Some(mut cursor) = self.lock() else {
            return;
        };
        if !cursor.state.is_active() {
            return;
        }
        let now = self.clock.now();
        let span = tracing::info_span!("acts_tick", chain = self.chain.name(), state = %cursor.state);
        let _guard = span.enter();
        let policy = self.chain.policy();

        let group_cancelled = cursor
            .group
            .as_ref()
            .is_some_and(|group| group.is_cancel_requested());
        if self.cancel_requested.load(Ordering::SeqCst) || group_cancelled {
            self.cancel_locked(&mut cursor);
            return;
        }
        is_policy_violated(&self.status, policy, &self.defaults.tuning, now);

        if let Some(group) = cursor.group.clone() {
            self.expire_timed_out(&group, now);
        }
        if is_timed_out(&self.status, &policy.timeout, now) {
            let elapsed_ms = self.status.elapsed_since_last_start_ms(now).unwrap_or(0);
            self.execution_failure(&mut cursor, ExecutionError::Timeout { elapsed_ms }, now);
            return;
        }

        if cursor.state == ChainState::RetryingGroup {
            if !is_in_retry_interval(&self.status, &policy.retry_interval, now) {
                return;
            }
            self.status.start(now);
            cursor.state = ChainState::ExecutingGroup;
            tracing::info!(group = cursor.index, attempt = self.status.total_attempted(), "retrying group");
        }

        if cursor.group.is_none() {
            let from = cursor.index;
            if !self.connect_from(&mut cursor, from, now) {
                self.finish(&mut cursor);
                return;
            }
            if cursor.state == ChainState::Starting {
                cursor.state = ChainState::ExecutingGroup;
            }
        }

        while let Some(group) = cursor.group.clone() {
            match group.progress() {
                GroupProgress::Running => {
                    self.execute(&group, now);
                    break;
                }
                GroupProgress::Done => {
                    if !self.transition(&mut cursor, &group, now) {
                        break;
                    }
                }
                GroupProgress::Failed(error) => {
                    self.execution_failure(&mut cursor, error, now);
                    break;
                }
            }
        }
    }

    /// Delay until the chain wants its next tick
    pub fn next(&self) -> Option<Duration> {
        let cursor = self.lock()?;
        if !cursor.state.is_active() {
            return None;
        }
        if self.cancel_requested.load(Ordering::SeqCst) {
            return Some(Duration::ZERO);
        }
        let now = self.clock.now();
        let policy = self.chain.policy();
        let mut delay = time_until_timeout_ms(&self.status, &policy.timeout, now);
        delay = match (&cursor.state, &cursor.group) {
            (ChainState::RetryingGroup, _) => {
                delay.min(time_until_next_retry_ms(&self.status, &policy.retry_interval, now))
            }
            (_, None) => 0,
            (_, Some(group)) => {
                if group.is_cancel_requested() {
                    0
                } else {
                    delay.min(group.wake_in_ms(self.defaults.max_concurrency, now))
                }
            }
        };
        if delay == NEVER {
            return None;
        }
        Some(Duration::from_millis(u64::try_from(delay).unwrap_or(0)))
    }

    /// Stop the chain; in-flight acts are aborted and their results dropped
    pub fn cancel(&self) {
        self.cancel_requested.store(true, Ordering::SeqCst);
        match self.lock() {
            Some(mut cursor) => self.cancel_locked(&mut cursor),
            None => self.deps.trigger.trigger_now(),
        }
    }

    fn cancel_locked(&self, cursor: &mut Cursor) {
        if !cursor.state.is_active() {
            return;
        }
        let now = self.clock.now();
        if let Some(group) = cursor.group.take() {
            group.disconnect(now);
            for act in group.acts() {
                act.status().cancel();
            }
            group
                .def()
                .subject()
                .emit(&Notification::Error(ExecutionError::Cancelled));
        }
        if self.probe.swap(false, Ordering::SeqCst) {
            self.breaker(now).release_probe(now);
        }
        self.status.cancel();
        cursor.state = ChainState::Cancelled;
        tracing::info!(chain = self.chain.name(), group = cursor.index, "chain cancelled");
        self.chain
            .subject()
            .emit(&Notification::Error(ExecutionError::Cancelled));
    }

    /// Materialize the first non-empty group at or after `from`
    fn connect_from(&self, cursor: &mut Cursor, from: usize, now: Instant) -> bool {
        let groups = self.chain.groups();
        let Some(index) = (from..groups.len()).find(|&i| !groups[i].is_empty()) else {
            return false;
        };
        let group = Arc::new(LiveGroup::materialize(index, &groups[index], now));
        group.def().subject().emit(&Notification::Subscribe);
        tracing::debug!(group = index, name = group.def().name(), acts = group.acts().len(), "group connected");
        cursor.index = index;
        cursor.group = Some(group);
        self.status.set_starting(false);
        true
    }

    /// Move past a completed group. Returns false once the chain has finished.
    fn transition(&self, cursor: &mut Cursor, group: &LiveGroup, now: Instant) -> bool {
        group.disconnect(now);
        group.def().subject().emit(&Notification::Complete);
        self.chain.subject().emit(&Notification::Next(group.index()));
        tracing::info!(group = group.index(), name = group.def().name(), "group completed");

        cursor.group = None;
        cursor.state = ChainState::WaitingForNextGroup;
        if !self.connect_from(cursor, group.index() + 1, now) {
            self.finish(cursor);
            return false;
        }
        cursor.state = ChainState::ExecutingNextGroup;
        true
    }

    fn finish(&self, cursor: &mut Cursor) {
        self.status.success();
        self.probe.store(false, Ordering::SeqCst);
        self.breaker(self.clock.now()).success();
        cursor.group = None;
        cursor.state = ChainState::Finished;
        tracing::info!(chain = self.chain.name(), "chain finished");
        self.chain.subject().emit(&Notification::Complete);
    }

    /// Fail the current chain execution; the group is retried while the
    /// chain's attempt policy allows
    fn execution_failure(&self, cursor: &mut Cursor, error: ExecutionError, now: Instant) {
        if let Some(group) = cursor.group.take() {
            group.disconnect(now);
            group.def().subject().emit(&Notification::Error(error.clone()));
        }
        let policy = self.chain.policy();
        self.status.failure(now);
        self.probe.store(false, Ordering::SeqCst);
        self.breaker(now).failure(now);

        let fatal = matches!(error, ExecutionError::Fatal(_));
        if !fatal && is_in_attempt(&self.status, &policy.attempt) {
            cursor.state = ChainState::RetryingGroup;
            tracing::warn!(group = cursor.index, error = %error, "group failed, will retry");
            return;
        }
        cursor.state = ChainState::Failed;
        tracing::warn!(
            chain = self.chain.name(),
            group = cursor.index,
            error = %error,
            kind = error.kind(),
            "chain failed"
        );
        self.chain.subject().emit(&Notification::Error(error));
    }

    fn expire_timed_out(&self, group: &LiveGroup, now: Instant) {
        for act in group.acts() {
            let policy = act.def().policy();
            if !act.status().is_executing() || !is_timed_out(act.status(), &policy.timeout, now) {
                continue;
            }
            if !act.claim_current() {
                continue;
            }
            group.landed();
            let elapsed_ms = act.status().elapsed_since_last_start_ms(now).unwrap_or(0);
            let error = ExecutionError::Timeout { elapsed_ms };
            act.take_probe();
            act.status().failure(now);
            self.deps
                .registry
                .circuit_breaker(act.def().circuit_id(), &policy.circuit_breaker, now)
                .failure(now);
            tracing::warn!(act = act.def().key(), elapsed_ms, "act timed out");
            act.record_error(error.clone());
            act.def().subject().emit(&Notification::Error(error));
        }
    }

    fn execute(&self, group: &Arc<LiveGroup>, now: Instant) {
        let picked = group
            .def()
            .mode()
            .select(group.acts(), self.defaults.max_concurrency, now);
        for index in picked {
            self.launch(group, &group.acts()[index], now);
        }
    }

    fn launch(&self, group: &Arc<LiveGroup>, act: &Arc<LiveAct>, now: Instant) {
        let def = act.def();
        let policy = def.policy();
        let registry = &self.deps.registry;
        if !act.status().start(now) {
            return;
        }

        let limiter = registry.rate_limiter(def.rate_limiter_id(), &policy.rate_limiter, now);
        let breaker = registry.circuit_breaker(def.circuit_id(), &policy.circuit_breaker, now);
        let admission = match admit(&limiter, &breaker, now) {
            Ok(admission) => admission,
            Err(error) => {
                act.status().failure(now);
                tracing::debug!(act = def.key(), error = %error, "act rejected");
                act.record_error(error.clone());
                def.subject().emit(&Notification::Error(error));
                return;
            }
        };
        if admission == Admission::Probe {
            act.hold_probe(Arc::clone(&breaker));
        }

        let ticket = self.tickets.fetch_add(1, Ordering::SeqCst);
        act.arm(ticket);
        group.launched();
        def.subject().emit(&Notification::Subscribe);
        tracing::debug!(act = def.key(), attempt = act.status().total_attempted(), "launching act");

        let clock = self.clock.clone();
        let job = ActJob {
            work: def.work(),
            completion: Completion {
                act: Arc::clone(act),
                group: Arc::clone(group),
                ticket,
                breaker,
                store: Arc::clone(&self.deps.store),
                trigger: Arc::clone(&self.deps.trigger),
                now: Arc::new(move || clock.now()),
            },
        };
        let handle = self.deps.launcher.launch(job);
        act.set_abort(handle);
    }
}

impl<C: Clock> Tickable for ActsController<C> {
    fn run(&self) {
        ActsController::run(self);
    }

    fn next(&self) -> Option<Duration> {
        ActsController::next(self)
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
