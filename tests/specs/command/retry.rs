//! A command retried by its controller on the real driver

use crate::prelude::*;

#[tokio::test(flavor = "multi_thread")]
async fn command_succeeds_on_third_attempt() {
    let defaults = Defaults::default();
    let registry = Arc::new(ResilienceRegistry::new(Instant::now()));
    let driver = Driver::spawn(&defaults, Some(Arc::clone(&registry)));
    let trigger = driver.trigger();

    let policy = Policy::new()
        .with_attempt(Attempt::retry(2))
        .with_interval(Interval::now_then_of_millis(0))
        .with_criterion(Criterion::all());
    let calls = AtomicUsize::new(0);
    let command = Command::new("settle", policy, Instant::now()).with_action(Action::supplier(
        move || match calls.fetch_add(1, Ordering::SeqCst) {
            0 | 1 => Err(ActionError::failed("ledger busy")),
            _ => Ok(Some("settled")),
        },
    ));
    let log = Log::default();
    let sink = log.clone();
    command.subject().subscribe(move |n| sink.push(describe(n)));

    let controller = Arc::new(CommandController::new(
        command,
        registry,
        Arc::new(trigger.clone()),
        defaults,
        SystemClock,
    ));
    driver.register(&trigger, Arc::clone(&controller) as Arc<dyn Tickable>);
    controller.subscribe().unwrap();

    assert!(eventually(|| controller.state() == CommandState::Finished).await);
    let status = controller.command().status();
    assert_eq!(status.total_attempted(), 3);
    assert_eq!(status.num_successes(), 1);
    assert_eq!(status.num_failures(), 2);
    assert_eq!(
        log.entries().iter().filter(|e| *e == "complete").count(),
        1
    );
    driver.shutdown().await;
}
