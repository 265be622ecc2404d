// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Immutable policy value objects
//!
//! Execution policy (attempt, interval, timeout, criterion) decides *when*
//! work runs and whether an execution counts as a success. Protective policy
//! (circuit breaker, rate limiter) decides whether it may run at all.

use crate::clock::duration_ms;
use crate::error::PolicyError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How attempts are counted toward completion
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptKind {
    /// Run until one execution succeeds
    UntilSuccess,
    /// Run until `min_successes` executions succeed
    NumSuccessfulTimes,
    /// Run until cancelled
    Forever,
}

/// Bounds on execution tries and required successes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    kind: AttemptKind,
    min_successes: u64,
    max_attempts: u64,
}

impl Attempt {
    pub fn new(kind: AttemptKind, min_successes: u64, max_attempts: u64) -> Result<Self, PolicyError> {
        let attempt = Self {
            kind,
            min_successes,
            max_attempts,
        };
        attempt.validate()?;
        Ok(attempt)
    }

    /// A single attempt
    pub fn once() -> Self {
        Self {
            kind: AttemptKind::UntilSuccess,
            min_successes: 1,
            max_attempts: 1,
        }
    }

    /// One attempt plus `retries` retries, stopping at the first success
    pub fn retry(retries: u64) -> Self {
        Self {
            kind: AttemptKind::UntilSuccess,
            min_successes: 1,
            max_attempts: retries.saturating_add(1),
        }
    }

    pub fn until_success(max_attempts: u64) -> Result<Self, PolicyError> {
        Self::new(AttemptKind::UntilSuccess, 1, max_attempts)
    }

    pub fn num_successful_times(min_successes: u64, max_attempts: u64) -> Result<Self, PolicyError> {
        Self::new(AttemptKind::NumSuccessfulTimes, min_successes, max_attempts)
    }

    pub fn forever() -> Self {
        Self {
            kind: AttemptKind::Forever,
            min_successes: 1,
            max_attempts: u64::MAX,
        }
    }

    pub fn kind(&self) -> AttemptKind {
        self.kind
    }

    pub fn min_successes(&self) -> u64 {
        self.min_successes
    }

    pub fn max_attempts(&self) -> u64 {
        self.max_attempts
    }

    pub fn is_forever(&self) -> bool {
        self.kind == AttemptKind::Forever
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.min_successes < 1 {
            return Err(PolicyError::new("attempt", "min_successes must be at least 1"));
        }
        if self.max_attempts < self.min_successes {
            return Err(PolicyError::new(
                "attempt",
                format!(
                    "max_attempts ({}) must be >= min_successes ({})",
                    self.max_attempts, self.min_successes
                ),
            ));
        }
        Ok(())
    }
}

impl Default for Attempt {
    fn default() -> Self {
        Self::once()
    }
}

/// Spacing between executions
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    #[serde(with = "humantime_serde", default)]
    initial_delay: Duration,
    #[serde(with = "humantime_serde", default)]
    period: Duration,
}

impl Interval {
    pub fn of(initial_delay: Duration, period: Duration) -> Self {
        Self {
            initial_delay,
            period,
        }
    }

    pub fn of_millis(initial_delay_ms: u64, period_ms: u64) -> Self {
        Self::of(
            Duration::from_millis(initial_delay_ms),
            Duration::from_millis(period_ms),
        )
    }

    /// Start immediately, then space executions by `period_ms`
    pub fn now_then_of_millis(period_ms: u64) -> Self {
        Self::of_millis(0, period_ms)
    }

    pub fn immediately() -> Self {
        Self::default()
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn initial_delay_ms(&self) -> u64 {
        duration_ms(self.initial_delay)
    }

    pub fn period_ms(&self) -> u64 {
        duration_ms(self.period)
    }
}

/// Upper bound on a single in-flight attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeout {
    #[serde(with = "humantime_serde", default)]
    duration: Duration,
    #[serde(default)]
    forever: bool,
}

impl Timeout {
    pub fn forever() -> Self {
        Self {
            duration: Duration::ZERO,
            forever: true,
        }
    }

    pub fn of(duration: Duration) -> Self {
        Self {
            duration,
            forever: false,
        }
    }

    pub fn of_millis(ms: u64) -> Self {
        Self::of(Duration::from_millis(ms))
    }

    pub fn is_forever(&self) -> bool {
        self.forever
    }

    /// Timeout in milliseconds, `None` when forever
    pub fn duration_ms(&self) -> Option<u64> {
        (!self.forever).then(|| duration_ms(self.duration))
    }
}

impl Default for Timeout {
    fn default() -> Self {
        Self::forever()
    }
}

/// How a criterion judges the action failures of one execution
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionKind {
    All,
    Minimum,
    Unconditional,
}

/// Tolerance for action failures within one execution
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criterion {
    kind: CriterionKind,
    #[serde(default)]
    min_limit: u64,
}

impl Criterion {
    /// No action may fail
    pub fn all() -> Self {
        Self {
            kind: CriterionKind::All,
            min_limit: 0,
        }
    }

    /// At most `min_limit` actions may fail
    pub fn minimum(min_limit: u64) -> Self {
        Self {
            kind: CriterionKind::Minimum,
            min_limit,
        }
    }

    /// Always met
    pub fn unconditional() -> Self {
        Self {
            kind: CriterionKind::Unconditional,
            min_limit: 0,
        }
    }

    pub fn kind(&self) -> CriterionKind {
        self.kind
    }

    pub fn min_limit(&self) -> u64 {
        self.min_limit
    }
}

impl Default for Criterion {
    fn default() -> Self {
        Self::all()
    }
}

/// Circuit breaker thresholds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerPolicy {
    /// Failures tolerated inside the window; `None` disables the breaker
    #[serde(default)]
    max_failures: Option<u64>,
    #[serde(with = "humantime_serde")]
    error_window: Duration,
    #[serde(with = "humantime_serde")]
    reset_timeout: Duration,
}

impl CircuitBreakerPolicy {
    pub fn new(max_failures: u64, error_window: Duration, reset_timeout: Duration) -> Self {
        Self {
            max_failures: Some(max_failures),
            error_window,
            reset_timeout,
        }
    }

    /// A policy that never opens
    pub fn unlimited() -> Self {
        Self {
            max_failures: None,
            error_window: Duration::from_secs(60),
            reset_timeout: Duration::from_secs(60),
        }
    }

    pub fn max_failures(&self) -> Option<u64> {
        self.max_failures
    }

    pub fn error_window(&self) -> Duration {
        self.error_window
    }

    pub fn reset_timeout(&self) -> Duration {
        self.reset_timeout
    }

    pub fn is_unlimited(&self) -> bool {
        self.max_failures.is_none()
    }
}

impl Default for CircuitBreakerPolicy {
    fn default() -> Self {
        Self::unlimited()
    }
}

/// A quota of `total` calls per `duration`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRate {
    total: u64,
    #[serde(with = "humantime_serde")]
    duration: Duration,
}

impl TimeRate {
    pub fn new(total: u64, duration: Duration) -> Self {
        Self { total, duration }
    }

    pub fn per_second(total: u64) -> Self {
        Self::new(total, Duration::from_secs(1))
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

/// Rate limiter axes; an absent axis is unlimited
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimiterPolicy {
    #[serde(default)]
    quota: Option<TimeRate>,
    #[serde(with = "humantime_serde", default)]
    min_period: Option<Duration>,
}

impl RateLimiterPolicy {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn with_quota(mut self, rate: TimeRate) -> Self {
        self.quota = Some(rate);
        self
    }

    /// Minimum gap between admitted calls
    pub fn with_min_period(mut self, period: Duration) -> Self {
        self.min_period = Some(period);
        self
    }

    pub fn quota(&self) -> Option<TimeRate> {
        self.quota
    }

    pub fn min_period(&self) -> Option<Duration> {
        self.min_period
    }

    pub fn is_unlimited(&self) -> bool {
        self.quota.is_none() && self.min_period.is_none()
    }
}

/// Complete policy for one command, act, or act chain
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    pub attempt: Attempt,
    pub interval: Interval,
    /// Spacing applied instead of `interval` after a failed attempt
    pub retry_interval: Interval,
    pub timeout: Timeout,
    pub criterion: Criterion,
    /// Treat an absent value from a non-void action as a failure
    pub error_on_null: bool,
    pub circuit_breaker: CircuitBreakerPolicy,
    pub rate_limiter: RateLimiterPolicy,
}

impl Policy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attempt(mut self, attempt: Attempt) -> Self {
        self.attempt = attempt;
        self
    }

    pub fn with_interval(mut self, interval: Interval) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_retry_interval(mut self, interval: Interval) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Timeout) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_error_on_null(mut self, error_on_null: bool) -> Self {
        self.error_on_null = error_on_null;
        self
    }

    pub fn with_circuit_breaker(mut self, policy: CircuitBreakerPolicy) -> Self {
        self.circuit_breaker = policy;
        self
    }

    pub fn with_rate_limiter(mut self, policy: RateLimiterPolicy) -> Self {
        self.rate_limiter = policy;
        self
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        self.attempt.validate()
    }
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
