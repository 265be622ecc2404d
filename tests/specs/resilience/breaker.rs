//! Circuit breaker behavior through the shared registry

use crate::prelude::*;

fn policy() -> CircuitBreakerPolicy {
    CircuitBreakerPolicy::new(2, Duration::from_secs(10), Duration::from_millis(100))
}

#[test]
fn breaker_round_trip_closes_on_probe_success() {
    let clock = FakeClock::new();
    let registry = ResilienceRegistry::new(clock.now());
    let id = CircuitId::shared_by_id("orders", "db");
    let breaker = registry.circuit_breaker(&id, &policy(), clock.now());

    for _ in 0..3 {
        breaker.failure(clock.now());
    }
    assert_eq!(breaker.state(), CircuitState::Open);

    clock.advance_ms(99);
    assert!(!breaker.allow_request(clock.now()));

    clock.advance_ms(1);
    let shared = registry.circuit_breaker(&id, &policy(), clock.now());
    assert!(Arc::ptr_eq(&breaker, &shared));
    assert!(shared.allow_request(clock.now()));
    assert!(!breaker.allow_request(clock.now()));
    assert_eq!(breaker.state(), CircuitState::HalfOpen);

    shared.success();
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert!(breaker.allow_request(clock.now()));
}

#[test]
fn breaker_round_trip_reopens_on_probe_failure() {
    let clock = FakeClock::new();
    let registry = ResilienceRegistry::new(clock.now());
    let breaker = registry.circuit_breaker(&CircuitId::singleton(), &policy(), clock.now());

    for _ in 0..3 {
        breaker.failure(clock.now());
    }
    clock.advance_ms(100);
    assert!(breaker.allow_request(clock.now()));

    breaker.failure(clock.now());
    assert_eq!(breaker.state(), CircuitState::Open);
    assert!(!breaker.allow_request(clock.now()));
}

#[test]
fn commands_sharing_a_circuit_fail_fast_together() {
    let clock = FakeClock::new();
    let registry = ResilienceRegistry::new(clock.now());
    let id = CircuitId::shared_by_type("inventory");
    let guarded = Policy::new().with_circuit_breaker(policy());

    let failing = Command::<u32>::new("reserve", guarded, clock.now())
        .with_circuit_breaker(id.clone())
        .with_action(Action::supplier(|| Err(ActionError::failed("timeout"))));
    for _ in 0..3 {
        assert!(matches!(
            rampart_engine::compose(&failing, &registry, &clock),
            Disposition::Failed(_)
        ));
    }

    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    let healthy = Command::<u32>::new("release", guarded, clock.now())
        .with_circuit_breaker(id)
        .with_action(Action::supplier(move || {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok(Some(1))
        }));
    let log = Log::default();
    let sink = log.clone();
    healthy.subject().subscribe(move |n| sink.push(describe(n)));

    let disposition = rampart_engine::compose(&healthy, &registry, &clock);

    assert!(matches!(
        disposition,
        Disposition::Failed(ExecutionError::CircuitBreakerOpen { .. })
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(log.entries(), vec!["error:circuit_breaker_open"]);
}

#[test]
fn cancelled_probe_does_not_wedge_a_shared_circuit() {
    let clock = FakeClock::new();
    let registry = ResilienceRegistry::new(clock.now());
    let id = CircuitId::shared_by_id("svc", "db");
    let guarded = Policy::new().with_circuit_breaker(policy());
    let breaker = registry.circuit_breaker(&id, &policy(), clock.now());
    for _ in 0..3 {
        breaker.failure(clock.now());
    }
    clock.advance_ms(150);

    let cancelling = Command::<u32>::new("abandon", guarded, clock.now())
        .with_circuit_breaker(id.clone())
        .with_action(Action::supplier(|| Err(ActionError::Cancel)));
    assert_eq!(
        rampart_engine::compose(&cancelling, &registry, &clock),
        Disposition::Failed(ExecutionError::Cancelled)
    );
    assert_eq!(breaker.state(), CircuitState::Open);

    clock.advance(Duration::from_secs(3_600));
    let healthy = Command::<u32>::new("probe", guarded, clock.now())
        .with_circuit_breaker(id)
        .with_action(Action::supplier(|| Ok(Some(1))));
    assert_eq!(
        rampart_engine::compose(&healthy, &registry, &clock),
        Disposition::Completed
    );
    assert_eq!(breaker.state(), CircuitState::Closed);
}
