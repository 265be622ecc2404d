// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rate limiter
//!
//! Two independent axes, both optional: a quota of calls per sliding window
//! and a minimum gap between admitted calls. A call is admitted only when
//! every configured axis passes; nothing is recorded for a rejected call.
//!
//! The frequency axis alone is a single compare-and-set. With a quota, the
//! check and the record happen under a short admission lock so concurrent
//! callers can never push the window past its total.

use crate::clock::{duration_ms, millis_since};
use crate::id::RateLimiterId;
use crate::policy::RateLimiterPolicy;
use crate::subject::Subject;
use crate::window::{SlidingWindow, DEFAULT_BUCKETS};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

const NO_TIME: u64 = u64::MAX;

/// The limiter axis that rejected a call
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitAxis {
    Quota,
    Frequency,
}

impl std::fmt::Display for LimitAxis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LimitAxis::Quota => write!(f, "quota"),
            LimitAxis::Frequency => write!(f, "frequency"),
        }
    }
}

#[derive(Debug)]
struct Quota {
    total: u64,
    window: SlidingWindow,
    admission: Mutex<()>,
    violating: AtomicBool,
}

#[derive(Debug)]
struct Frequency {
    min_period_ms: u64,
    last_admitted: AtomicU64,
    violating: AtomicBool,
}

#[derive(Debug)]
pub struct RateLimiter {
    id: RateLimiterId,
    policy: RateLimiterPolicy,
    origin: Instant,
    quota: Option<Quota>,
    frequency: Option<Frequency>,
    on_quota_violation: Subject<RateLimiterId>,
    on_frequency_violation: Subject<RateLimiterId>,
}

impl RateLimiter {
    pub fn new(id: RateLimiterId, policy: RateLimiterPolicy, now: Instant) -> Self {
        let enabled = !id.is_none();
        let quota = policy.quota().filter(|_| enabled).map(|rate| Quota {
            total: rate.total(),
            window: SlidingWindow::new(rate.duration(), DEFAULT_BUCKETS, now),
            admission: Mutex::new(()),
            violating: AtomicBool::new(false),
        });
        let frequency = policy.min_period().filter(|_| enabled).map(|period| Frequency {
            min_period_ms: duration_ms(period),
            last_admitted: AtomicU64::new(NO_TIME),
            violating: AtomicBool::new(false),
        });
        Self {
            id,
            policy,
            origin: now,
            quota,
            frequency,
            on_quota_violation: Subject::new("limiter.quota"),
            on_frequency_violation: Subject::new("limiter.frequency"),
        }
    }

    /// A limiter that never rejects and keeps no state
    pub fn always_allow() -> Self {
        Self::new(RateLimiterId::none(), RateLimiterPolicy::unlimited(), Instant::now())
    }

    pub fn id(&self) -> &RateLimiterId {
        &self.id
    }

    pub fn policy(&self) -> &RateLimiterPolicy {
        &self.policy
    }

    pub fn is_always_allow(&self) -> bool {
        self.quota.is_none() && self.frequency.is_none()
    }

    /// Fired on the first quota rejection of each violation episode
    pub fn on_quota_violation(&self) -> &Subject<RateLimiterId> {
        &self.on_quota_violation
    }

    /// Fired on the first frequency rejection of each violation episode
    pub fn on_frequency_violation(&self) -> &Subject<RateLimiterId> {
        &self.on_frequency_violation
    }

    pub fn allow_request(&self, now: Instant) -> bool {
        self.try_acquire(now).is_ok()
    }

    /// Admit and record a call, or name the axis that rejected it
    pub fn try_acquire(&self, now: Instant) -> Result<(), LimitAxis> {
        self.admit(now).inspect_err(|axis| self.violated(*axis))
    }

    fn admit(&self, now: Instant) -> Result<(), LimitAxis> {
        let _admission = self.quota.as_ref().map(|quota| quota.admission.lock());

        if let Some(quota) = &self.quota {
            if quota.window.sum(now) >= quota.total {
                return Err(LimitAxis::Quota);
            }
        }

        if let Some(frequency) = &self.frequency {
            let now_ms = millis_since(self.origin, now);
            let mut last = frequency.last_admitted.load(Ordering::SeqCst);
            loop {
                if last != NO_TIME && now_ms.saturating_sub(last) < frequency.min_period_ms {
                    return Err(LimitAxis::Frequency);
                }
                match frequency.last_admitted.compare_exchange(
                    last,
                    now_ms,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                ) {
                    Ok(_) => break,
                    Err(actual) => last = actual,
                }
            }
            frequency.violating.store(false, Ordering::SeqCst);
        }

        if let Some(quota) = &self.quota {
            quota.window.record(now);
            quota.violating.store(false, Ordering::SeqCst);
        }
        Ok(())
    }

    /// Observers run after the admission lock is released
    fn violated(&self, axis: LimitAxis) {
        tracing::debug!(limiter = %self.id, %axis, "rate limit rejected call");
        let (violating, subject) = match axis {
            LimitAxis::Quota => (
                self.quota.as_ref().map(|quota| &quota.violating),
                &self.on_quota_violation,
            ),
            LimitAxis::Frequency => (
                self.frequency.as_ref().map(|frequency| &frequency.violating),
                &self.on_frequency_violation,
            ),
        };
        if violating.is_some_and(|flag| flag.swap(true, Ordering::SeqCst)) {
            return;
        }
        tracing::warn!(limiter = %self.id, %axis, "rate limit violated");
        subject.emit(&self.id);
    }
}

#[cfg(test)]
#[path = "limiter_tests.rs"]
mod tests;
