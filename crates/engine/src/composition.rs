// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Composition strategy: one execution of a command
//!
//! An execution is gated by the command's rate limiter and circuit breaker,
//! runs the ordinary actions in order, falls back when appropriate, and
//! reports a single disposition to the status, the breaker and observers.

use crate::action::Action;
use crate::command::Command;
use rampart_core::checker::{is_criterion_met, is_last_attempt};
use rampart_core::{
    ActionError, Admission, CircuitBreaker, Clock, ExecutionError, Notification, RateLimiter,
    ResilienceRegistry,
};
use std::time::Instant;

/// Per-action outcomes within one execution
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tally {
    pub successes: u64,
    pub failures: u64,
}

/// How one execution ended
#[derive(Clone, Debug, PartialEq)]
pub enum Disposition {
    /// The criterion was met
    Completed,
    /// The execution failed; observers have been told
    Failed(ExecutionError),
    /// Another execution of this command is already in flight
    Busy,
}

/// Result of running the fallback actions
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FallbackReport {
    /// At least one fallback ran without raising Cancel or Fatal
    pub ran: bool,
    /// Cancel or Fatal raised by a fallback, which stops the rest
    pub terminal: Option<ActionError>,
}

/// Execute `command` once
pub fn compose<T, C: Clock>(
    command: &Command<T>,
    registry: &ResilienceRegistry,
    clock: &C,
) -> Disposition {
    let policy = command.policy();
    let status = command.status();
    let now = clock.now();
    let breaker = registry.circuit_breaker(command.circuit_id(), &policy.circuit_breaker, now);
    let limiter = registry.rate_limiter(command.rate_limiter_id(), &policy.rate_limiter, now);

    if !status.start(now) {
        return Disposition::Busy;
    }
    let span = tracing::info_span!(
        "compose",
        command = command.name(),
        attempt = status.total_attempted()
    );
    let _guard = span.enter();

    let (rejection, probe) = match admit(&limiter, &breaker, now) {
        Ok(admission) => (None, admission == Admission::Probe),
        Err(error) => (Some(error), false),
    };

    let mut tally = Tally::default();
    if rejection.is_none() {
        command.subject().emit(&Notification::Subscribe);
        if let Err(terminal) = call_actions(command, &mut tally) {
            return terminal_failure(command, &breaker, probe, terminal, clock);
        }
        if status.is_cancelled() {
            if probe {
                breaker.release_probe(clock.now());
            }
            tracing::info!("command cancelled mid-execution");
            command
                .subject()
                .emit(&Notification::Error(ExecutionError::Cancelled));
            return Disposition::Failed(ExecutionError::Cancelled);
        }
    }

    let met = rejection.is_none() && is_criterion_met(&policy.criterion, tally.failures);
    let exhausted = !met && is_last_attempt(status, &policy.attempt) && !status.is_cancelled();
    if rejection.is_some() || exhausted {
        let report = fallback(command);
        if let Some(terminal) = report.terminal {
            return terminal_failure(command, &breaker, probe, terminal, clock);
        }
    }

    let now = clock.now();
    if met {
        breaker.success();
        status.success();
        command.subject().emit(&Notification::Complete);
        tracing::debug!(successes = tally.successes, "command completed");
        return Disposition::Completed;
    }

    let error = match rejection {
        Some(error) => error,
        None => {
            breaker.failure(now);
            ExecutionError::policy_violation(format!(
                "{} of {} actions failed",
                tally.failures,
                tally.failures + tally.successes
            ))
        }
    };
    status.failure(now);
    tracing::debug!(error = %error, kind = error.kind(), "command execution failed");
    command.subject().emit(&Notification::Error(error.clone()));
    Disposition::Failed(error)
}

/// Run ordinary actions until one is cancelled or the criterion can no
/// longer be met. Cancel and Fatal are returned after observers are told.
pub fn call_actions<T>(command: &Command<T>, tally: &mut Tally) -> Result<(), ActionError> {
    for action in command.actions() {
        if command.status().is_cancelled()
            || !is_criterion_met(&command.policy().criterion, tally.failures)
        {
            break;
        }
        run_action(command, action, tally)?;
    }
    Ok(())
}

/// Run every fallback action; fallbacks do not consult the criterion
pub fn fallback<T>(command: &Command<T>) -> FallbackReport {
    let mut report = FallbackReport::default();
    if !command.has_fallbacks() {
        return report;
    }
    command.subject().emit(&Notification::Fallback);

    let mut tally = Tally::default();
    for action in command.fallbacks() {
        match run_action(command, action, &mut tally) {
            Ok(()) => report.ran = true,
            Err(terminal) => {
                report.terminal = Some(terminal);
                break;
            }
        }
    }
    report
}

fn run_action<T>(command: &Command<T>, action: &Action<T>, tally: &mut Tally) -> Result<(), ActionError> {
    match action.invoke() {
        Ok(Some(value)) => {
            tally.successes += 1;
            command.subject().emit(&Notification::Next(value));
            Ok(())
        }
        Ok(None) if command.policy().error_on_null && !action.is_void() => {
            tally.failures += 1;
            tracing::debug!(error = %ExecutionError::NullResult, "action failed");
            Ok(())
        }
        Ok(None) => {
            tally.successes += 1;
            Ok(())
        }
        Err(e) if e.is_terminal() => {
            if e == ActionError::Cancel {
                command.status().cancel();
            }
            command
                .subject()
                .emit(&Notification::Error(ExecutionError::from(e.clone())));
            Err(e)
        }
        Err(e) => {
            tally.failures += 1;
            tracing::debug!(error = %e, "action failed");
            Ok(())
        }
    }
}

/// Gate one call through a limiter and a breaker
///
/// A breaker that is plainly open rejects before the limiter is charged. The
/// limiter runs before the half-open probe is claimed, so a rate-limited call
/// never holds it.
pub(crate) fn admit(
    limiter: &RateLimiter,
    breaker: &CircuitBreaker,
    now: Instant,
) -> Result<Admission, ExecutionError> {
    let open = || ExecutionError::CircuitBreakerOpen {
        id: breaker.id().to_string(),
    };
    if breaker.is_rejecting(now) {
        return Err(open());
    }
    limiter
        .try_acquire(now)
        .map_err(|axis| ExecutionError::RateLimitViolated {
            id: limiter.id().to_string(),
            axis,
        })?;
    breaker.admit(now).ok_or_else(open)
}

fn terminal_failure<T, C: Clock>(
    command: &Command<T>,
    breaker: &CircuitBreaker,
    probe: bool,
    terminal: ActionError,
    clock: &C,
) -> Disposition {
    let error = ExecutionError::from(terminal);
    let now = clock.now();
    if error == ExecutionError::Cancelled {
        if probe {
            breaker.release_probe(now);
        }
    } else {
        breaker.failure(now);
        command.status().failure(now);
    }
    tracing::warn!(error = %error, "command halted");
    Disposition::Failed(error)
}

#[cfg(test)]
#[path = "composition_tests.rs"]
mod tests;
