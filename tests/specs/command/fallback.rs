//! Fallback behavior once ordinary actions are exhausted

use crate::prelude::*;
use rampart_engine::composition::fallback;

fn failing_command(fallbacks: Vec<Action<u32>>) -> Command<u32> {
    let clock = FakeClock::new();
    let mut command = Command::new("lookup", Policy::new(), clock.now())
        .with_action(Action::supplier(|| Err(ActionError::failed("primary down"))));
    for action in fallbacks {
        command = command.with_fallback(action);
    }
    command
}

#[test]
fn fallback_reports_ran_when_any_fallback_completes() {
    let command = failing_command(vec![
        Action::fallback(|| Err(ActionError::failed("secondary down"))),
        Action::fallback(|| Ok(Some(7))),
    ]);

    let first = fallback(&command);
    let second = fallback(&command);

    assert!(first.ran);
    assert_eq!(first.terminal, None);
    assert_eq!(first, second);
}

#[test]
fn fallback_runs_even_if_every_fallback_fails_ordinarily() {
    let command = failing_command(vec![Action::fallback(|| {
        Err(ActionError::failed("still down"))
    })]);

    assert!(fallback(&command).ran);
}

#[test]
fn fatal_fallback_does_not_count_as_ran() {
    let command = failing_command(vec![
        Action::fallback(|| Err(ActionError::fatal("poisoned cache"))),
        Action::fallback(|| Ok(Some(1))),
    ]);

    let report = fallback(&command);

    assert!(!report.ran);
    assert_eq!(report.terminal, Some(ActionError::fatal("poisoned cache")));
}

#[test]
fn fallback_value_does_not_satisfy_the_criterion() {
    let clock = FakeClock::new();
    let registry = ResilienceRegistry::new(clock.now());
    let command = failing_command(vec![Action::fallback(|| Ok(Some(99)))]);
    let log = Log::default();
    let sink = log.clone();
    command.subject().subscribe(move |n| sink.push(describe(n)));

    let disposition = rampart_engine::compose(&command, &registry, &clock);

    assert!(matches!(
        disposition,
        Disposition::Failed(ExecutionError::PolicyViolation { .. })
    ));
    similar_asserts::assert_eq!(
        log.entries(),
        vec!["subscribe", "fallback", "next:99", "error:policy_violation"]
    );
}
