// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Circuit breaker
//!
//! CLOSED admits everything. Failures inside the error window beyond
//! `max_failures` trip it OPEN, which rejects until `reset_timeout` has
//! elapsed. The first caller after that wins a single HALF_OPEN probe; the
//! probe's success closes the circuit and its failure reopens it. A probe
//! whose call ends with neither, because it was cancelled or abandoned, is
//! handed back with [`CircuitBreaker::release_probe`].
//!
//! State lives in atomics, so callers never block on each other.

use crate::clock::{duration_ms, millis_since};
use crate::id::CircuitId;
use crate::policy::CircuitBreakerPolicy;
use crate::subject::Subject;
use crate::window::{SlidingWindow, DEFAULT_BUCKETS};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::Instant;

const CLOSED: u8 = 0;
const OPEN: u8 = 1;
const HALF_OPEN: u8 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            OPEN => CircuitState::Open,
            HALF_OPEN => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// How a call got past the breaker
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    Closed,
    /// The caller holds the single half-open probe and must report an
    /// outcome or release it
    Probe,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    id: CircuitId,
    policy: CircuitBreakerPolicy,
    origin: Instant,
    state: AtomicU8,
    opened_at: AtomicU64,
    /// `None` for a stateless always-allow breaker
    failures: Option<SlidingWindow>,
    on_open: Subject<CircuitId>,
    on_close: Subject<CircuitId>,
    on_half_open: Subject<CircuitId>,
}

impl CircuitBreaker {
    pub fn new(id: CircuitId, policy: CircuitBreakerPolicy, now: Instant) -> Self {
        let failures = (!policy.is_unlimited() && !id.is_none())
            .then(|| SlidingWindow::new(policy.error_window(), DEFAULT_BUCKETS, now));
        Self {
            id,
            policy,
            origin: now,
            state: AtomicU8::new(CLOSED),
            opened_at: AtomicU64::new(0),
            failures,
            on_open: Subject::new("circuit.open"),
            on_close: Subject::new("circuit.close"),
            on_half_open: Subject::new("circuit.half_open"),
        }
    }

    /// A breaker that never rejects and keeps no state
    pub fn always_allow() -> Self {
        Self::new(CircuitId::none(), CircuitBreakerPolicy::unlimited(), Instant::now())
    }

    pub fn id(&self) -> &CircuitId {
        &self.id
    }

    pub fn policy(&self) -> &CircuitBreakerPolicy {
        &self.policy
    }

    pub fn is_always_allow(&self) -> bool {
        self.failures.is_none()
    }

    pub fn state(&self) -> CircuitState {
        CircuitState::from_raw(self.state.load(Ordering::SeqCst))
    }

    pub fn on_open(&self) -> &Subject<CircuitId> {
        &self.on_open
    }

    pub fn on_close(&self) -> &Subject<CircuitId> {
        &self.on_close
    }

    pub fn on_half_open(&self) -> &Subject<CircuitId> {
        &self.on_half_open
    }

    /// Failures currently counted in the error window
    pub fn failures_in_window(&self, now: Instant) -> u64 {
        self.failures.as_ref().map_or(0, |w| w.sum(now))
    }

    pub fn success(&self) {
        let Some(failures) = &self.failures else {
            return;
        };
        failures.clear();
        let previous = self.state.swap(CLOSED, Ordering::SeqCst);
        if previous != CLOSED {
            tracing::info!(circuit = %self.id, from = %CircuitState::from_raw(previous), "circuit closed");
            self.on_close.emit(&self.id);
        }
    }

    pub fn failure(&self, now: Instant) {
        let Some(failures) = &self.failures else {
            return;
        };
        failures.record(now);
        let current = self.state.load(Ordering::SeqCst);
        let trip = match current {
            HALF_OPEN => true,
            CLOSED => {
                let max = self.policy.max_failures().unwrap_or(u64::MAX);
                failures.sum(now) > max
            }
            _ => false,
        };
        if !trip {
            return;
        }
        self.opened_at
            .store(millis_since(self.origin, now), Ordering::SeqCst);
        if self
            .state
            .compare_exchange(current, OPEN, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            tracing::info!(
                circuit = %self.id,
                from = %CircuitState::from_raw(current),
                failures = failures.sum(now),
                "circuit opened"
            );
            self.on_open.emit(&self.id);
        }
    }

    /// Whether a call may proceed at `now`
    ///
    /// Once the reset timeout has elapsed exactly one concurrent caller is
    /// admitted as the half-open probe.
    pub fn allow_request(&self, now: Instant) -> bool {
        self.admit(now).is_some()
    }

    /// Admit a call, reporting whether it holds the half-open probe
    pub fn admit(&self, now: Instant) -> Option<Admission> {
        if self.failures.is_none() {
            return Some(Admission::Closed);
        }
        match self.state.load(Ordering::SeqCst) {
            CLOSED => Some(Admission::Closed),
            OPEN => {
                if !self.reset_elapsed(now) {
                    tracing::debug!(circuit = %self.id, "circuit open, rejecting");
                    return None;
                }
                let won = self
                    .state
                    .compare_exchange(OPEN, HALF_OPEN, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok();
                if !won {
                    return None;
                }
                tracing::info!(circuit = %self.id, "circuit half-open, admitting probe");
                self.on_half_open.emit(&self.id);
                Some(Admission::Probe)
            }
            _ => None,
        }
    }

    /// Whether a call at `now` would certainly be rejected. Claims nothing.
    pub fn is_rejecting(&self, now: Instant) -> bool {
        if self.failures.is_none() {
            return false;
        }
        match self.state.load(Ordering::SeqCst) {
            CLOSED => false,
            OPEN => !self.reset_elapsed(now),
            _ => true,
        }
    }

    /// Give back a half-open probe whose call produced no outcome
    ///
    /// The circuit returns to OPEN with a fresh reset timeout, after which
    /// another caller may probe.
    pub fn release_probe(&self, now: Instant) {
        if self.failures.is_none() || self.state.load(Ordering::SeqCst) != HALF_OPEN {
            return;
        }
        self.opened_at
            .store(millis_since(self.origin, now), Ordering::SeqCst);
        if self
            .state
            .compare_exchange(HALF_OPEN, OPEN, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            tracing::info!(circuit = %self.id, "circuit probe released without an outcome");
        }
    }

    fn reset_elapsed(&self, now: Instant) -> bool {
        let opened_at = self.opened_at.load(Ordering::SeqCst);
        let elapsed = millis_since(self.origin, now).saturating_sub(opened_at);
        elapsed >= duration_ms(self.policy.reset_timeout())
    }
}

#[cfg(test)]
#[path = "breaker_tests.rs"]
mod tests;
