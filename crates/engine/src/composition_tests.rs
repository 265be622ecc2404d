// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use rampart_core::{
    Attempt, CircuitBreakerPolicy, CircuitId, CircuitState, Criterion, FakeClock, LimitAxis,
    Policy, RateLimiterId, RateLimiterPolicy, TimeRate,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Duration;
use yare::parameterized;

type Log = Arc<Mutex<Vec<String>>>;

fn observe(command: &Command<u32>) -> Log {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    command.subject().subscribe(move |n: &Notification<u32>| {
        let entry = match n {
            Notification::Next(v) => format!("next:{}", v),
            Notification::Error(e) => format!("error:{}", e.kind()),
            other => other.name().to_string(),
        };
        sink.lock().unwrap().push(entry);
    });
    log
}

fn command(policy: Policy, clock: &FakeClock) -> Command<u32> {
    Command::new("test", policy, clock.now())
}

fn value(v: u32) -> Action<u32> {
    Action::supplier(move || Ok(Some(v)))
}

fn failing() -> Action<u32> {
    Action::supplier(|| Err(ActionError::failed("boom")))
}

fn counted(counter: &Arc<AtomicUsize>, action: Action<u32>) -> Action<u32> {
    let counter = Arc::clone(counter);
    action.with_before(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    })
}

#[test]
fn all_actions_succeed() {
    let clock = FakeClock::new();
    let registry = ResilienceRegistry::new(clock.now());
    let command = command(Policy::new(), &clock).with_action(value(1)).with_action(value(2));
    let log = observe(&command);

    assert_eq!(compose(&command, &registry, &clock), Disposition::Completed);

    assert_eq!(
        *log.lock().unwrap(),
        vec!["subscribe", "next:1", "next:2", "complete"]
    );
    assert_eq!(command.status().num_successes(), 1);
    assert!(!command.status().is_executing());
}

#[test]
fn failure_under_all_criterion_is_policy_violation_and_trips_breaker() {
    let clock = FakeClock::new();
    let registry = ResilienceRegistry::new(clock.now());
    let policy = Policy::new().with_circuit_breaker(CircuitBreakerPolicy::new(
        0,
        Duration::from_secs(10),
        Duration::from_secs(10),
    ));
    let command = command(policy, &clock)
        .with_action(failing())
        .with_circuit_breaker(CircuitId::shared_by_type("db"));
    let log = observe(&command);

    let disposition = compose(&command, &registry, &clock);

    assert!(matches!(
        disposition,
        Disposition::Failed(ExecutionError::PolicyViolation { .. })
    ));
    assert_eq!(*log.lock().unwrap(), vec!["subscribe", "error:policy_violation"]);
    assert_eq!(command.status().num_failures(), 1);
    let breaker = registry
        .find_circuit_breaker(&CircuitId::shared_by_type("db"), clock.now())
        .unwrap();
    assert_eq!(breaker.state(), CircuitState::Open);
}

#[test]
fn unmet_criterion_stops_remaining_actions() {
    let clock = FakeClock::new();
    let registry = ResilienceRegistry::new(clock.now());
    let calls = Arc::new(AtomicUsize::new(0));
    let command = command(Policy::new(), &clock)
        .with_action(failing())
        .with_action(counted(&calls, value(2)));

    compose(&command, &registry, &clock);

    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn minimum_criterion_tolerates_failures() {
    let clock = FakeClock::new();
    let registry = ResilienceRegistry::new(clock.now());
    let command = command(Policy::new().with_criterion(Criterion::minimum(1)), &clock)
        .with_action(failing())
        .with_action(value(5));
    let log = observe(&command);

    assert_eq!(compose(&command, &registry, &clock), Disposition::Completed);
    assert_eq!(*log.lock().unwrap(), vec!["subscribe", "next:5", "complete"]);
}

#[parameterized(
    supplier_fails = { false, true },
    runnable_exempt = { true, false },
)]
fn error_on_null_applies_to_value_actions_only(void: bool, expect_failure: bool) {
    let clock = FakeClock::new();
    let registry = ResilienceRegistry::new(clock.now());
    let action = if void {
        Action::runnable(|| Ok(()))
    } else {
        Action::supplier(|| Ok(None))
    };
    let command = command(Policy::new().with_error_on_null(true), &clock).with_action(action);

    let disposition = compose(&command, &registry, &clock);

    assert_eq!(disposition != Disposition::Completed, expect_failure);
}

#[test]
fn cancel_halts_and_marks_status() {
    let clock = FakeClock::new();
    let registry = ResilienceRegistry::new(clock.now());
    let calls = Arc::new(AtomicUsize::new(0));
    let command = command(Policy::new().with_attempt(Attempt::retry(5)), &clock)
        .with_action(Action::supplier(|| Err(ActionError::Cancel)))
        .with_action(counted(&calls, value(1)))
        .with_fallback(counted(&calls, value(2)));
    let log = observe(&command);

    assert_eq!(
        compose(&command, &registry, &clock),
        Disposition::Failed(ExecutionError::Cancelled)
    );
    assert!(command.status().is_cancelled());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(*log.lock().unwrap(), vec!["subscribe", "error:cancelled"]);
}

#[test]
fn fatal_is_reported_once() {
    let clock = FakeClock::new();
    let registry = ResilienceRegistry::new(clock.now());
    let command = command(Policy::new(), &clock)
        .with_action(Action::supplier(|| Err(ActionError::fatal("corrupt"))));
    let log = observe(&command);

    assert_eq!(
        compose(&command, &registry, &clock),
        Disposition::Failed(ExecutionError::Fatal("corrupt".into()))
    );
    assert_eq!(*log.lock().unwrap(), vec!["subscribe", "error:fatal"]);
    assert_eq!(command.status().num_failures(), 1);
}

#[test]
fn fallback_runs_only_on_last_attempt() {
    let clock = FakeClock::new();
    let registry = ResilienceRegistry::new(clock.now());
    let command = command(Policy::new().with_attempt(Attempt::retry(1)), &clock)
        .with_action(failing())
        .with_fallback(value(99));
    let log = observe(&command);

    compose(&command, &registry, &clock);
    assert!(!log.lock().unwrap().contains(&"fallback".to_string()));

    compose(&command, &registry, &clock);
    let log = log.lock().unwrap();
    let tail: Vec<&str> = log.iter().skip(2).map(String::as_str).collect();
    assert_eq!(
        tail,
        vec!["subscribe", "fallback", "next:99", "error:policy_violation"]
    );
}

#[test]
fn open_circuit_rejects_and_runs_fallback() {
    let clock = FakeClock::new();
    let registry = ResilienceRegistry::new(clock.now());
    let id = CircuitId::shared_by_type("svc");
    let policy = Policy::new().with_circuit_breaker(CircuitBreakerPolicy::new(
        0,
        Duration::from_secs(10),
        Duration::from_secs(10),
    ));
    registry
        .circuit_breaker(&id, &policy.circuit_breaker, clock.now())
        .failure(clock.now());

    let calls = Arc::new(AtomicUsize::new(0));
    let command = command(policy, &clock)
        .with_circuit_breaker(id)
        .with_action(counted(&calls, value(1)))
        .with_fallback(value(7));
    let log = observe(&command);

    let disposition = compose(&command, &registry, &clock);

    assert!(matches!(
        disposition,
        Disposition::Failed(ExecutionError::CircuitBreakerOpen { .. })
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        *log.lock().unwrap(),
        vec!["fallback", "next:7", "error:circuit_breaker_open"]
    );
    assert_eq!(command.status().total_attempted(), 1);
}

fn guarded() -> Policy {
    Policy::new()
        .with_attempt(Attempt::forever())
        .with_circuit_breaker(CircuitBreakerPolicy::new(
            0,
            Duration::from_secs(10),
            Duration::from_millis(100),
        ))
}

/// Trip the shared breaker and wait out its reset timeout
fn ready_to_probe(registry: &ResilienceRegistry, id: &CircuitId, clock: &FakeClock) -> Arc<CircuitBreaker> {
    let breaker = registry.circuit_breaker(id, &guarded().circuit_breaker, clock.now());
    breaker.failure(clock.now());
    clock.advance_ms(150);
    breaker
}

#[test]
fn cancelled_probe_lets_the_circuit_recover() {
    let clock = FakeClock::new();
    let registry = ResilienceRegistry::new(clock.now());
    let id = CircuitId::shared_by_id("svc", "db");
    let breaker = ready_to_probe(&registry, &id, &clock);
    let cancelling = command(guarded(), &clock)
        .with_circuit_breaker(id.clone())
        .with_action(Action::supplier(|| Err(ActionError::Cancel)));

    assert_eq!(
        compose(&cancelling, &registry, &clock),
        Disposition::Failed(ExecutionError::Cancelled)
    );
    assert_eq!(breaker.state(), CircuitState::Open);

    clock.advance_ms(100);
    let healthy = command(guarded(), &clock)
        .with_circuit_breaker(id)
        .with_action(value(1));
    assert_eq!(compose(&healthy, &registry, &clock), Disposition::Completed);
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[test]
fn cancel_during_execution_is_reported_and_releases_the_probe() {
    let clock = FakeClock::new();
    let registry = ResilienceRegistry::new(clock.now());
    let id = CircuitId::shared_by_id("svc", "db");
    let breaker = ready_to_probe(&registry, &id, &clock);

    let slot: Arc<OnceLock<Weak<Command<u32>>>> = Arc::new(OnceLock::new());
    let handle = Arc::clone(&slot);
    let owner = Arc::new(
        command(guarded(), &clock)
            .with_circuit_breaker(id)
            .with_action(Action::supplier(move || {
                if let Some(command) = handle.get().and_then(Weak::upgrade) {
                    command.status().cancel();
                }
                Ok(Some(1))
            })),
    );
    slot.set(Arc::downgrade(&owner)).unwrap();
    let command: &Command<u32> = &owner;
    let log = observe(command);

    assert_eq!(
        compose(command, &registry, &clock),
        Disposition::Failed(ExecutionError::Cancelled)
    );
    assert_eq!(
        *log.lock().unwrap(),
        vec!["subscribe", "next:1", "error:cancelled"]
    );
    assert_eq!(breaker.state(), CircuitState::Open);
}

#[test]
fn open_circuit_does_not_charge_the_rate_limiter() {
    let clock = FakeClock::new();
    let registry = ResilienceRegistry::new(clock.now());
    let id = CircuitId::shared_by_type("svc");
    let policy = guarded().with_rate_limiter(
        RateLimiterPolicy::unlimited().with_quota(TimeRate::new(1, Duration::from_secs(60))),
    );
    let breaker = registry.circuit_breaker(&id, &policy.circuit_breaker, clock.now());
    breaker.failure(clock.now());
    let command = command(policy, &clock)
        .with_circuit_breaker(id)
        .with_rate_limiter(RateLimiterId::singleton())
        .with_action(value(1));

    assert!(matches!(
        compose(&command, &registry, &clock),
        Disposition::Failed(ExecutionError::CircuitBreakerOpen { .. })
    ));

    clock.advance_ms(100);
    assert_eq!(compose(&command, &registry, &clock), Disposition::Completed);
}

#[test]
fn rate_limited_execution_is_rejected() {
    let clock = FakeClock::new();
    let registry = ResilienceRegistry::new(clock.now());
    let policy = Policy::new()
        .with_attempt(Attempt::forever())
        .with_rate_limiter(RateLimiterPolicy::unlimited().with_quota(TimeRate::per_second(1)));
    let command = command(policy, &clock)
        .with_rate_limiter(RateLimiterId::singleton())
        .with_action(value(1));

    assert_eq!(compose(&command, &registry, &clock), Disposition::Completed);
    assert_eq!(
        compose(&command, &registry, &clock),
        Disposition::Failed(ExecutionError::RateLimitViolated {
            id: RateLimiterId::singleton().to_string(),
            axis: LimitAxis::Quota,
        })
    );
}

#[test]
fn busy_when_already_executing() {
    let clock = FakeClock::new();
    let registry = ResilienceRegistry::new(clock.now());
    let command = command(Policy::new(), &clock).with_action(value(1));
    command.status().start(clock.now());

    assert_eq!(compose(&command, &registry, &clock), Disposition::Busy);
}

#[parameterized(
    ordinary_failure_still_ran = { vec![Err(ActionError::failed("x"))], true, false },
    fatal_first = { vec![Err(ActionError::fatal("x")), Ok(Some(1))], false, true },
    ok_then_fatal = { vec![Ok(Some(1)), Err(ActionError::fatal("x"))], true, true },
    cancel_only = { vec![Err(ActionError::Cancel)], false, true },
)]
fn fallback_reports_whether_any_fallback_ran(
    outcomes: Vec<Result<Option<u32>, ActionError>>,
    ran: bool,
    terminal: bool,
) {
    let clock = FakeClock::new();
    let mut command = command(Policy::new(), &clock).with_action(failing());
    for outcome in outcomes {
        command = command.with_fallback(Action::supplier(move || outcome.clone()));
    }

    let report = fallback(&command);

    assert_eq!(report.ran, ran);
    assert_eq!(report.terminal.is_some(), terminal);
}

#[test]
fn no_fallbacks_reports_nothing_ran() {
    let clock = FakeClock::new();
    let command = command(Policy::new(), &clock).with_action(failing());
    assert_eq!(fallback(&command), FallbackReport::default());
}
