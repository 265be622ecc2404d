// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tick driver
//!
//! Controllers never own threads. They ask a [`Trigger`] to call them back,
//! and the [`Driver`] event loop runs their `run()` tick on the blocking
//! pool when the time comes, then reschedules from `next()`.

use crate::scheduler::{ScheduledKind, Scheduler, TickId};
use parking_lot::Mutex;
use rampart_core::{Defaults, ResilienceRegistry};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;

/// A unit the driver ticks
pub trait Tickable: Send + Sync {
    /// Advance by one step; must not block beyond the controller lock timeout
    fn run(&self);

    /// Delay until the next tick is wanted, `None` if none is
    fn next(&self) -> Option<Duration>;
}

/// Asks for a future call to the owner's `run()`
pub trait Trigger: Send + Sync {
    fn trigger_in(&self, delay: Duration);

    fn trigger_now(&self) {
        self.trigger_in(Duration::ZERO);
    }
}

/// Records trigger requests instead of acting on them
#[derive(Clone, Default)]
pub struct ManualTrigger {
    requests: Arc<Mutex<Vec<Duration>>>,
}

impl ManualTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain recorded requests
    pub fn take(&self) -> Vec<Duration> {
        std::mem::take(&mut *self.requests.lock())
    }

    pub fn count(&self) -> usize {
        self.requests.lock().len()
    }
}

impl Trigger for ManualTrigger {
    fn trigger_in(&self, delay: Duration) {
        self.requests.lock().push(delay);
    }
}

enum Message {
    Register(TickId, Arc<dyn Tickable>),
    Deregister(TickId),
    Trigger(TickId, Duration),
    Shutdown,
}

/// Trigger bound to one driver slot
#[derive(Clone)]
pub struct DriverTrigger {
    id: TickId,
    tx: mpsc::UnboundedSender<Message>,
}

impl DriverTrigger {
    pub fn id(&self) -> TickId {
        self.id
    }
}

impl Trigger for DriverTrigger {
    fn trigger_in(&self, delay: Duration) {
        // Ignore send errors (driver may have shut down)
        let _ = self.tx.send(Message::Trigger(self.id, delay));
    }
}

pub struct Driver {
    tx: mpsc::UnboundedSender<Message>,
    next_id: AtomicU64,
    task: JoinHandle<()>,
}

impl Driver {
    /// Spawn the event loop on the current tokio runtime
    pub fn spawn(defaults: &Defaults, registry: Option<Arc<ResilienceRegistry>>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let permits = Arc::new(Semaphore::new(defaults.max_concurrent_ticks.max(1)));
        let sweep_every = registry
            .as_ref()
            .and(defaults.registry_ttl)
            .map(|ttl| (ttl / 2).max(Duration::from_millis(1)));
        let event_loop = EventLoop {
            rx,
            tx: tx.clone(),
            permits,
            registry,
            scheduler: Scheduler::new(),
            tickables: HashMap::new(),
        };
        let task = tokio::spawn(event_loop.run(sweep_every));
        Self {
            tx,
            next_id: AtomicU64::new(1),
            task,
        }
    }

    /// Allocate a slot; register the tickable under it once constructed
    pub fn trigger(&self) -> DriverTrigger {
        DriverTrigger {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            tx: self.tx.clone(),
        }
    }

    pub fn register(&self, trigger: &DriverTrigger, tickable: Arc<dyn Tickable>) {
        let _ = self.tx.send(Message::Register(trigger.id, tickable));
    }

    pub fn deregister(&self, trigger: &DriverTrigger) {
        let _ = self.tx.send(Message::Deregister(trigger.id));
    }

    /// Stop the event loop; ticks already running finish on their own
    pub async fn shutdown(self) {
        let _ = self.tx.send(Message::Shutdown);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "driver loop ended abnormally");
        }
    }
}

struct EventLoop {
    rx: mpsc::UnboundedReceiver<Message>,
    tx: mpsc::UnboundedSender<Message>,
    permits: Arc<Semaphore>,
    registry: Option<Arc<ResilienceRegistry>>,
    scheduler: Scheduler,
    tickables: HashMap<TickId, Arc<dyn Tickable>>,
}

impl EventLoop {
    async fn run(mut self, sweep_every: Option<Duration>) {
        if let Some(period) = sweep_every {
            self.scheduler.schedule_repeating(
                ScheduledKind::RegistrySweep,
                Instant::now() + period,
                period,
            );
        }
        tracing::debug!("driver started");

        loop {
            let deadline = self.scheduler.next_fire_time();
            tokio::select! {
                message = self.rx.recv() => match message {
                    None | Some(Message::Shutdown) => break,
                    Some(message) => self.handle(message),
                },
                () = sleep_until(deadline) => self.fire(Instant::now()),
            }
        }

        tracing::debug!("driver stopped");
    }

    fn handle(&mut self, message: Message) {
        match message {
            Message::Register(id, tickable) => {
                self.tickables.insert(id, tickable);
            }
            Message::Deregister(id) => {
                self.tickables.remove(&id);
                self.scheduler.cancel(ScheduledKind::Tick(id));
            }
            Message::Trigger(id, delay) => {
                self.scheduler
                    .schedule(ScheduledKind::Tick(id), Instant::now() + delay);
            }
            Message::Shutdown => {}
        }
    }

    fn fire(&mut self, now: Instant) {
        for item in self.scheduler.poll(now) {
            match item.kind {
                ScheduledKind::Tick(id) => match self.tickables.get(&id) {
                    Some(tickable) => self.spawn_tick(id, Arc::clone(tickable)),
                    None => tracing::debug!(id, "tick for unregistered slot dropped"),
                },
                ScheduledKind::RegistrySweep => {
                    if let Some(registry) = &self.registry {
                        registry.sweep(now);
                    }
                }
            }
        }
    }

    fn spawn_tick(&self, id: TickId, tickable: Arc<dyn Tickable>) {
        let permits = Arc::clone(&self.permits);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            let next = tokio::task::spawn_blocking(move || {
                tickable.run();
                tickable.next()
            })
            .await;
            match next {
                Ok(Some(delay)) => {
                    let _ = tx.send(Message::Trigger(id, delay));
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(id, error = %e, "tick failed"),
            }
        });
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
