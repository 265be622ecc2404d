//! Shared helpers for the behavioral specs

#![allow(dead_code)]

pub use rampart_core::{
    ActionError, Attempt, CircuitBreakerPolicy, CircuitId, CircuitState, Clock, Criterion,
    Defaults, ExecutionError, FakeClock, Interval, LimitAxis, Notification, Policy,
    RateLimiterId, RateLimiterPolicy, ResilienceRegistry, SystemClock, TimeRate,
};
pub use rampart_engine::{
    Act, ActGroup, ActGroupChain, Action, ActsController, ActsDeps, ChainState, Command,
    CommandController, CommandState, Disposition, Driver, ManualLauncher, ManualTrigger,
    Tickable, TokioLauncher,
};
pub use rampart_storage::{JournalEntry, JournalStore, MemoryStore, ValueStore};
pub use serde_json::json;
pub use std::sync::atomic::{AtomicUsize, Ordering};
pub use std::sync::{Arc, Mutex};
pub use std::time::{Duration, Instant};

/// Ordered record of observed events
#[derive(Clone, Default)]
pub struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Render a notification the way the specs assert on it
pub fn describe<T: std::fmt::Debug>(notification: &Notification<T>) -> String {
    match notification {
        Notification::Next(value) => format!("next:{:?}", value),
        Notification::Error(e) => format!("error:{}", e.kind()),
        other => other.name().to_string(),
    }
}

/// Poll `check` until it holds or five seconds pass
pub async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..500 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
