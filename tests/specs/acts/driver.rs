//! An act chain driven end to end by the tokio driver

use crate::prelude::*;
use async_trait::async_trait;
use rampart_engine::{ActResult, ActWork};

type Spans = Arc<Mutex<Vec<(String, Instant, Instant)>>>;

struct Slow {
    key: &'static str,
    spans: Spans,
}

#[async_trait]
impl ActWork for Slow {
    async fn run(&self) -> ActResult {
        let started = Instant::now();
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.spans
            .lock()
            .unwrap()
            .push((self.key.to_string(), started, Instant::now()));
        Ok(Some(json!({ "key": self.key })))
    }
}

fn slow(key: &'static str, spans: &Spans) -> Act {
    Act::new(
        key,
        Slow {
            key,
            spans: Arc::clone(spans),
        },
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn chain_runs_to_completion_and_journals_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("values.jsonl");
    let spans: Spans = Arc::default();
    let chain = ActGroupChain::new("nightly")
        .with_group(
            ActGroup::parallel("fetch")
                .with_act(slow("users", &spans))
                .with_act(slow("orders", &spans)),
        )
        .with_group(ActGroup::sequential("aggregate").with_act(slow("totals", &spans)));

    let defaults = Defaults::default();
    let registry = Arc::new(ResilienceRegistry::new(Instant::now()));
    let driver = Driver::spawn(&defaults, Some(Arc::clone(&registry)));
    let trigger = driver.trigger();
    let deps = ActsDeps {
        registry,
        store: Arc::new(JournalStore::open(&path).unwrap()),
        launcher: Arc::new(TokioLauncher::current()),
        trigger: Arc::new(trigger.clone()),
    };
    let controller = Arc::new(ActsController::new(chain, deps, defaults, SystemClock));
    driver.register(&trigger, Arc::clone(&controller) as Arc<dyn Tickable>);

    controller.subscribe().unwrap();
    assert!(eventually(|| controller.state() == ChainState::Finished).await);
    driver.shutdown().await;

    let spans = spans.lock().unwrap().clone();
    let span = |key: &str| spans.iter().find(|(k, _, _)| k == key).cloned().unwrap();
    let fetch_done = span("users").2.max(span("orders").2);
    assert!(span("totals").1 >= fetch_done);

    let entries = JournalStore::replay(&path).unwrap();
    assert_eq!(entries.len(), 3);
    assert!(entries.contains(&JournalEntry::Put {
        key: "totals".to_string(),
        value: json!({ "key": "totals" }),
    }));
}
