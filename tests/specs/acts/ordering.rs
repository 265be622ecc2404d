//! Group chains start a group only after the previous one is done

use crate::prelude::*;

type Stamps = Arc<Mutex<Vec<(String, &'static str, Instant)>>>;

fn stamped(key: &str, clock: &FakeClock, stamps: &Stamps) -> Act {
    let act = Act::from_fn(key, || Ok(Some(json!(true))));
    let clock = clock.clone();
    let stamps = Arc::clone(stamps);
    let name = key.to_string();
    act.subject().subscribe(move |n| {
        let event = match n {
            Notification::Subscribe => "start",
            Notification::Complete => "done",
            _ => return,
        };
        stamps.lock().unwrap().push((name.clone(), event, clock.now()));
    });
    act
}

#[test]
fn second_group_starts_after_first_group_completes() {
    let clock = FakeClock::new();
    let stamps: Stamps = Arc::default();
    let chain = ActGroupChain::new("report")
        .with_group(
            ActGroup::sequential("extract")
                .with_act(stamped("a1", &clock, &stamps))
                .with_act(stamped("a2", &clock, &stamps)),
        )
        .with_group(
            ActGroup::sequential("load")
                .with_act(stamped("b1", &clock, &stamps))
                .with_act(stamped("b2", &clock, &stamps)),
        );
    let launcher = ManualLauncher::new();
    let store = Arc::new(MemoryStore::new());
    let deps = ActsDeps {
        registry: Arc::new(ResilienceRegistry::new(clock.now())),
        store: Arc::clone(&store) as Arc<dyn ValueStore>,
        launcher: Arc::new(launcher.clone()),
        trigger: Arc::new(ManualTrigger::new()),
    };
    let controller = ActsController::new(chain, deps, Defaults::default(), clock.clone());

    controller.subscribe().unwrap();
    for key in ["a1", "a2", "b1", "b2"] {
        controller.run();
        assert_eq!(launcher.pending(), vec![key]);
        clock.advance_ms(25);
        assert!(launcher.complete(key, Ok(Some(json!(key)))));
        clock.advance_ms(5);
    }
    controller.run();

    assert_eq!(controller.state(), ChainState::Finished);
    assert_eq!(launcher.launched(), vec!["a1", "a2", "b1", "b2"]);

    let stamps = stamps.lock().unwrap().clone();
    let at = |key: &str, event: &str| {
        stamps
            .iter()
            .find(|(k, e, _)| k == key && *e == event)
            .map(|(_, _, t)| *t)
            .unwrap()
    };
    let first_group_done = at("a1", "done").max(at("a2", "done"));
    assert!(at("b1", "start") >= first_group_done);
    assert!(at("b2", "start") >= first_group_done);
    assert_eq!(store.get("b2").unwrap(), Some(json!("b2")));
}
