//! Rate limiter behavior through the shared registry

use crate::prelude::*;

#[test]
fn quota_admits_exactly_total_per_window() {
    let clock = FakeClock::new();
    let registry = ResilienceRegistry::new(clock.now());
    let policy =
        RateLimiterPolicy::unlimited().with_quota(TimeRate::new(5, Duration::from_secs(1)));
    let limiter = registry.rate_limiter(&RateLimiterId::singleton(), &policy, clock.now());
    let violations = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&violations);
    limiter.on_quota_violation().subscribe(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    for _ in 0..5 {
        assert_eq!(limiter.try_acquire(clock.now()), Ok(()));
        clock.advance_ms(10);
    }
    assert_eq!(limiter.try_acquire(clock.now()), Err(LimitAxis::Quota));
    assert_eq!(limiter.try_acquire(clock.now()), Err(LimitAxis::Quota));
    assert_eq!(violations.load(Ordering::SeqCst), 1);

    clock.advance_ms(1_100);
    assert_eq!(limiter.try_acquire(clock.now()), Ok(()));
}

#[test]
fn rate_limited_command_skips_actions_and_runs_fallback() {
    let clock = FakeClock::new();
    let registry = ResilienceRegistry::new(clock.now());
    let policy = Policy::new().with_rate_limiter(
        RateLimiterPolicy::unlimited().with_min_period(Duration::from_secs(1)),
    );
    let command = Command::<&'static str>::new("quote", policy, clock.now())
        .with_rate_limiter(RateLimiterId::shared_by_id("pricing", "quote"))
        .with_action(Action::supplier(|| Ok(Some("fresh"))))
        .with_fallback(Action::fallback(|| Ok(Some("cached"))));
    let log = Log::default();
    let sink = log.clone();
    command.subject().subscribe(move |n| sink.push(describe(n)));

    assert_eq!(
        rampart_engine::compose(&command, &registry, &clock),
        Disposition::Completed
    );
    clock.advance_ms(200);
    let rejected = rampart_engine::compose(&command, &registry, &clock);

    assert!(matches!(
        rejected,
        Disposition::Failed(ExecutionError::RateLimitViolated {
            axis: LimitAxis::Frequency,
            ..
        })
    ));
    assert_eq!(
        log.entries(),
        vec![
            "subscribe",
            "next:\"fresh\"",
            "complete",
            "fallback",
            "next:\"cached\"",
            "error:rate_limit_violated",
        ]
    );
}
