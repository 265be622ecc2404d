// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Observer fan-out
//!
//! Delivery is best-effort: an observer that returns an error or panics is
//! logged and skipped, and the remaining observers still run.

use crate::error::ExecutionError;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Error an observer may return; it is logged and otherwise ignored
pub type ObserverError = Box<dyn std::error::Error + Send + Sync>;

type Observer<N> = Arc<dyn Fn(&N) -> Result<(), ObserverError> + Send + Sync>;

/// Returned by [`Subject::subscribe`]; pass back to unsubscribe
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObserverHandle(u64);

/// Lifecycle events for a command, act or act group
#[derive(Clone, Debug, PartialEq)]
pub enum Notification<T> {
    Subscribe,
    Next(T),
    Fallback,
    Complete,
    Error(ExecutionError),
}

impl<T> Notification<T> {
    pub fn name(&self) -> &'static str {
        match self {
            Notification::Subscribe => "subscribe",
            Notification::Next(_) => "next",
            Notification::Fallback => "fallback",
            Notification::Complete => "complete",
            Notification::Error(_) => "error",
        }
    }
}

/// A set of observers notified in subscription order
pub struct Subject<N> {
    name: &'static str,
    observers: Arc<RwLock<BTreeMap<ObserverHandle, Observer<N>>>>,
    next_handle: Arc<AtomicU64>,
}

impl<N> Clone for Subject<N> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            observers: Arc::clone(&self.observers),
            next_handle: Arc::clone(&self.next_handle),
        }
    }
}

impl<N> std::fmt::Debug for Subject<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subject")
            .field("name", &self.name)
            .field("observers", &self.len())
            .finish()
    }
}

impl<N> Subject<N> {
    /// `name` appears in logs when an observer fails
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            observers: Arc::new(RwLock::new(BTreeMap::new())),
            next_handle: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Subscribe an observer that cannot fail
    pub fn subscribe(&self, observer: impl Fn(&N) + Send + Sync + 'static) -> ObserverHandle {
        self.subscribe_fallible(move |n| {
            observer(n);
            Ok(())
        })
    }

    pub fn subscribe_fallible(
        &self,
        observer: impl Fn(&N) -> Result<(), ObserverError> + Send + Sync + 'static,
    ) -> ObserverHandle {
        let handle = ObserverHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        let mut observers = self.observers.write().unwrap_or_else(|e| e.into_inner());
        observers.insert(handle, Arc::new(observer));
        handle
    }

    /// Returns false if the handle was not subscribed
    pub fn unsubscribe(&self, handle: ObserverHandle) -> bool {
        let mut observers = self.observers.write().unwrap_or_else(|e| e.into_inner());
        observers.remove(&handle).is_some()
    }

    pub fn len(&self) -> usize {
        self.observers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `notification` to every observer
    pub fn emit(&self, notification: &N) {
        // Snapshot so observers may subscribe or unsubscribe re-entrantly
        let observers: Vec<(ObserverHandle, Observer<N>)> = {
            let guard = self.observers.read().unwrap_or_else(|e| e.into_inner());
            guard.iter().map(|(h, o)| (*h, Arc::clone(o))).collect()
        };

        for (handle, observer) in observers {
            match catch_unwind(AssertUnwindSafe(|| observer(notification))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(subject = self.name, ?handle, error = %e, "observer failed");
                }
                Err(_) => {
                    tracing::warn!(subject = self.name, ?handle, "observer panicked");
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "subject_tests.rs"]
mod tests;
