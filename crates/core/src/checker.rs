// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution policy checker
//!
//! Pure decision functions over an [`ExecutionStatus`] and policy. Delays are
//! signed milliseconds: zero or negative means "now", [`NEVER`] means the
//! branch does not apply. None of these functions mutate the status.

use crate::config::Tuning;
use crate::policy::{Attempt, AttemptKind, Criterion, CriterionKind, Interval, Policy, Timeout};
use crate::status::ExecutionStatus;
use std::time::Instant;

/// Delay meaning "not scheduled by this branch"
pub const NEVER: i64 = i64::MAX;

fn signed(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX)
}

/// Whether the attempt policy still permits executions
pub fn is_in_attempt(status: &ExecutionStatus, attempt: &Attempt) -> bool {
    if status.is_cancelled() {
        return false;
    }
    let attempted = status.total_attempted();
    let successes = status.num_successes();
    match attempt.kind() {
        AttemptKind::UntilSuccess => successes == 0 && attempted < attempt.max_attempts(),
        AttemptKind::NumSuccessfulTimes => {
            successes < attempt.min_successes() && attempted < attempt.max_attempts()
        }
        AttemptKind::Forever => true,
    }
}

/// Whether the attempt in progress (or just finished) is the final permitted one
pub fn is_last_attempt(status: &ExecutionStatus, attempt: &Attempt) -> bool {
    !attempt.is_forever() && status.total_attempted() >= attempt.max_attempts()
}

/// Whether the attempt policy finished with its success requirement met
pub fn is_attempt_satisfied(status: &ExecutionStatus, attempt: &Attempt) -> bool {
    match attempt.kind() {
        AttemptKind::UntilSuccess => status.num_successes() > 0,
        AttemptKind::NumSuccessfulTimes => status.num_successes() >= attempt.min_successes(),
        AttemptKind::Forever => false,
    }
}

/// Remaining delay before the regular interval allows the next execution
///
/// Applies before the first attempt (initial delay), and from the start of
/// every attempt that has not failed (period since the last start).
pub fn time_until_next_execution_ms(status: &ExecutionStatus, interval: &Interval, now: Instant) -> i64 {
    if status.is_executing() {
        let elapsed = status.elapsed_since_last_start_ms(now).unwrap_or(0);
        return signed(interval.period_ms()) - signed(elapsed);
    }
    if status.total_attempted() == 0 {
        let elapsed = status.elapsed_since_subscribed_ms(now);
        return signed(interval.initial_delay_ms()) - signed(elapsed);
    }
    if status.last_attempt_failed() {
        return NEVER;
    }
    match status.elapsed_since_last_start_ms(now) {
        Some(elapsed) => signed(interval.period_ms()) - signed(elapsed),
        None => 0,
    }
}

/// Remaining delay before a failed attempt may be retried
pub fn time_until_next_retry_ms(status: &ExecutionStatus, retry: &Interval, now: Instant) -> i64 {
    if status.is_executing() || status.total_attempted() == 0 || !status.last_attempt_failed() {
        return NEVER;
    }
    match status.elapsed_since_last_failure_ms(now) {
        Some(elapsed) => signed(retry.period_ms()) - signed(elapsed),
        None => 0,
    }
}

pub fn is_in_interval(status: &ExecutionStatus, interval: &Interval, now: Instant) -> bool {
    time_until_next_execution_ms(status, interval, now) <= 0
}

pub fn is_in_retry_interval(status: &ExecutionStatus, retry: &Interval, now: Instant) -> bool {
    time_until_next_retry_ms(status, retry, now) <= 0
}

/// Remaining time before the in-flight attempt times out
pub fn time_until_timeout_ms(status: &ExecutionStatus, timeout: &Timeout, now: Instant) -> i64 {
    if !status.is_executing() {
        return NEVER;
    }
    let Some(limit) = timeout.duration_ms() else {
        return NEVER;
    };
    let elapsed = status.elapsed_since_last_start_ms(now).unwrap_or(0);
    signed(limit) - signed(elapsed)
}

pub fn is_timed_out(status: &ExecutionStatus, timeout: &Timeout, now: Instant) -> bool {
    time_until_timeout_ms(status, timeout, now) <= 0
}

/// Backoff applied after repeated false starts
pub fn false_start_backoff_ms(false_starts: u64, tuning: &Tuning) -> i64 {
    let base = signed(tuning.false_start_base_ms());
    let cap = signed(tuning.false_start_cap_ms());
    base.saturating_mul(signed(false_starts)).min(cap)
}

/// Earliest time at which this status needs attention again
pub fn earliest_ready_in_ms(
    status: &ExecutionStatus,
    policy: &Policy,
    tuning: &Tuning,
    now: Instant,
) -> i64 {
    // Nothing new starts until the attempt in flight settles
    if status.is_executing() {
        return time_until_timeout_ms(status, &policy.timeout, now);
    }
    if !is_in_attempt(status, &policy.attempt) {
        return NEVER;
    }
    let delay = time_until_next_execution_ms(status, &policy.interval, now)
        .min(time_until_next_retry_ms(status, &policy.retry_interval, now))
        .min(time_until_timeout_ms(status, &policy.timeout, now));

    let false_starts = status.total_false_starts();
    if false_starts > 0 && delay <= 0 {
        return false_start_backoff_ms(false_starts, tuning);
    }
    delay
}

pub fn is_ready_to_execute(status: &ExecutionStatus, policy: &Policy, now: Instant) -> bool {
    !status.is_executing()
        && is_in_attempt(status, &policy.attempt)
        && (is_in_interval(status, &policy.interval, now)
            || is_in_retry_interval(status, &policy.retry_interval, now))
}

/// A broken scheduling invariant, reported for diagnostics only
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Violation {
    ExceededMaxAttempts { attempted: u64, max: u64 },
    OverranInterval { late_by_ms: i64 },
    OverranTimeout { overrun_ms: i64 },
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Violation::ExceededMaxAttempts { attempted, max } => {
                write!(f, "attempted {} times, max {}", attempted, max)
            }
            Violation::OverranInterval { late_by_ms } => {
                write!(f, "scheduled {}ms late", late_by_ms)
            }
            Violation::OverranTimeout { overrun_ms } => {
                write!(f, "ran {}ms past its timeout", overrun_ms)
            }
        }
    }
}

/// Check the scheduling invariants the policy implies
pub fn policy_violation(
    status: &ExecutionStatus,
    policy: &Policy,
    tuning: &Tuning,
    now: Instant,
) -> Option<Violation> {
    let attempt = &policy.attempt;
    let attempted = status.total_attempted();
    if !attempt.is_forever() && attempted > attempt.max_attempts() {
        return Some(Violation::ExceededMaxAttempts {
            attempted,
            max: attempt.max_attempts(),
        });
    }

    let margin = signed(tuning.deviation_margin_ms());
    if status.is_executing() {
        let remaining = time_until_timeout_ms(status, &policy.timeout, now);
        if remaining != NEVER && remaining < -margin {
            return Some(Violation::OverranTimeout {
                overrun_ms: -remaining,
            });
        }
    } else if is_in_attempt(status, attempt) {
        let delay = time_until_next_execution_ms(status, &policy.interval, now)
            .min(time_until_next_retry_ms(status, &policy.retry_interval, now));
        if delay < -margin {
            return Some(Violation::OverranInterval { late_by_ms: -delay });
        }
    }
    None
}

/// Log-only wrapper over [`policy_violation`]
pub fn is_policy_violated(
    status: &ExecutionStatus,
    policy: &Policy,
    tuning: &Tuning,
    now: Instant,
) -> bool {
    match policy_violation(status, policy, tuning, now) {
        Some(violation) => {
            tracing::warn!(%violation, "execution policy violated");
            true
        }
        None => false,
    }
}

/// Whether one execution's action failures are within tolerance
pub fn is_criterion_met(criterion: &Criterion, failures: u64) -> bool {
    match criterion.kind() {
        CriterionKind::All => failures == 0,
        CriterionKind::Minimum => failures <= criterion.min_limit(),
        CriterionKind::Unconditional => true,
    }
}

#[cfg(test)]
#[path = "checker_tests.rs"]
mod tests;
