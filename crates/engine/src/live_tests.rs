// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::driver::ManualTrigger;
use rampart_core::{
    ActionError, Admission, CircuitBreakerPolicy, CircuitId, CircuitState, Clock, FakeClock,
    Policy,
};
use rampart_storage::MemoryStore;
use serde_json::json;
use std::time::Duration;

struct Fixture {
    clock: FakeClock,
    group: Arc<LiveGroup>,
    store: Arc<MemoryStore>,
    trigger: ManualTrigger,
}

fn fixture(group: ActGroup) -> Fixture {
    let clock = FakeClock::new();
    Fixture {
        group: Arc::new(LiveGroup::materialize(0, &group, clock.now())),
        clock,
        store: Arc::new(MemoryStore::new()),
        trigger: ManualTrigger::new(),
    }
}

/// A breaker already past its reset timeout, so the next caller probes it
fn half_open_ready(clock: &FakeClock) -> Arc<CircuitBreaker> {
    let breaker = Arc::new(CircuitBreaker::new(
        CircuitId::shared_by_type("svc"),
        CircuitBreakerPolicy::new(0, Duration::from_secs(10), Duration::from_millis(100)),
        clock.now(),
    ));
    breaker.failure(clock.now());
    clock.advance_ms(100);
    breaker
}

impl Fixture {
    /// Start act `index` the way the controller does and return its completion
    fn launch(&self, index: usize, ticket: u64) -> Completion {
        self.launch_through(index, ticket, Arc::new(CircuitBreaker::always_allow()))
    }

    fn launch_through(&self, index: usize, ticket: u64, breaker: Arc<CircuitBreaker>) -> Completion {
        let act = Arc::clone(&self.group.acts()[index]);
        if breaker.admit(self.clock.now()) == Some(Admission::Probe) {
            act.hold_probe(Arc::clone(&breaker));
        }
        assert!(act.status().start(self.clock.now()));
        act.arm(ticket);
        self.group.launched();
        let clock = self.clock.clone();
        Completion {
            act,
            group: Arc::clone(&self.group),
            ticket,
            breaker,
            store: Arc::clone(&self.store) as Arc<dyn ValueStore>,
            trigger: Arc::new(self.trigger.clone()),
            now: Arc::new(move || clock.now()),
        }
    }
}

fn act(key: &str) -> Act {
    Act::from_fn(key, || Ok(None))
}

#[test]
fn value_is_stored_and_group_notified() {
    let group = ActGroup::sequential("g").with_act(act("a"));
    let keys = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&keys);
    group.subject().subscribe(move |n: &Notification<String>| {
        if let Notification::Next(key) = n {
            sink.lock().push(key.clone());
        }
    });
    let f = fixture(group);

    f.launch(0, 1).complete(Ok(Some(json!({"rows": 3}))));

    assert_eq!(f.store.get("a").unwrap(), Some(json!({"rows": 3})));
    assert_eq!(*keys.lock(), vec!["a".to_string()]);
    assert_eq!(f.group.in_flight(), 0);
    assert_eq!(f.trigger.count(), 1);
    assert_eq!(f.group.progress(), GroupProgress::Done);
}

#[test]
fn stale_ticket_is_ignored() {
    let f = fixture(ActGroup::sequential("g").with_act(act("a")));
    let completion = f.launch(0, 7);
    assert!(f.group.acts()[0].claim_current());

    completion.complete(Ok(Some(json!(1))));

    assert!(f.store.is_empty());
    assert_eq!(f.trigger.count(), 0);
}

#[test]
fn absent_value_fails_when_error_on_null() {
    let strict = act("a").with_policy(Policy::new().with_error_on_null(true));
    let f = fixture(ActGroup::sequential("g").with_act(strict));

    f.launch(0, 1).complete(Ok(None));

    assert_eq!(f.group.acts()[0].status().num_failures(), 1);
    assert_eq!(
        f.group.progress(),
        GroupProgress::Failed(ExecutionError::NullResult)
    );
}

#[test]
fn fatal_fails_the_group_immediately() {
    let f = fixture(
        ActGroup::parallel("g")
            .with_act(act("a"))
            .with_act(act("b")),
    );
    let a = f.launch(0, 1);
    let _b = f.launch(1, 2);

    a.complete(Err(ActionError::fatal("bad config")));

    // Parallel groups normally wait for every act; fatal wakes the controller
    assert_eq!(f.group.in_flight(), 1);
    assert_eq!(f.trigger.count(), 1);
    assert_eq!(
        f.group.progress(),
        GroupProgress::Failed(ExecutionError::Fatal("bad config".to_string()))
    );
}

#[test]
fn cancel_marks_the_group() {
    let f = fixture(ActGroup::sequential("g").with_act(act("a")));
    f.launch(0, 1).complete(Err(ActionError::Cancel));

    assert!(f.group.is_cancel_requested());
    assert!(f.group.acts()[0].status().is_cancelled());
}

#[test]
fn disconnect_claims_in_flight_work() {
    let f = fixture(
        ActGroup::parallel("g")
            .with_act(act("a"))
            .with_act(act("b")),
    );
    let a = f.launch(0, 1);
    let _b = f.launch(1, 2);

    f.group.disconnect(f.clock.now());
    assert_eq!(f.group.in_flight(), 0);
    assert!(!f.group.is_connected());

    a.complete(Ok(Some(json!(1))));
    assert!(f.store.is_empty());
}

#[test]
fn cancelled_probe_is_handed_back() {
    let f = fixture(ActGroup::sequential("g").with_act(act("a")));
    let breaker = half_open_ready(&f.clock);
    let a = f.launch_through(0, 1, Arc::clone(&breaker));
    assert_eq!(breaker.state(), CircuitState::HalfOpen);

    a.complete(Err(ActionError::Cancel));

    assert_eq!(breaker.state(), CircuitState::Open);
    f.clock.advance_ms(100);
    assert_eq!(breaker.admit(f.clock.now()), Some(Admission::Probe));
}

#[test]
fn disconnect_releases_an_in_flight_probe() {
    let f = fixture(ActGroup::sequential("g").with_act(act("a")));
    let breaker = half_open_ready(&f.clock);
    let a = f.launch_through(0, 1, Arc::clone(&breaker));

    f.group.disconnect(f.clock.now());
    assert_eq!(breaker.state(), CircuitState::Open);

    a.complete(Ok(Some(json!(1))));
    assert_eq!(breaker.state(), CircuitState::Open);
}

#[test]
fn probe_outcome_reaches_the_breaker() {
    let f = fixture(ActGroup::sequential("g").with_act(act("a")));
    let breaker = half_open_ready(&f.clock);
    f.launch_through(0, 1, Arc::clone(&breaker))
        .complete(Ok(Some(json!(1))));

    assert_eq!(breaker.state(), CircuitState::Closed);
    assert!(f.group.acts()[0].take_probe().is_none());
}

#[test]
fn wake_is_bounded_by_in_flight_timeout() {
    let policy = Policy::new().with_timeout(rampart_core::Timeout::of_millis(250));
    let f = fixture(ActGroup::sequential("g").with_act(act("a").with_policy(policy)));
    let _a = f.launch(0, 1);

    assert_eq!(f.group.wake_in_ms(8, f.clock.now()), 250);
    f.clock.advance_ms(100);
    assert_eq!(f.group.wake_in_ms(8, f.clock.now()), 150);
}
