// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Computation strategies: which waiting items run next
//!
//! Both strategies rescan in insertion order on every call. PARALLEL has no
//! fairness guarantee, so an early item that is always ready can keep later
//! ones waiting when concurrency is saturated.

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Something a strategy can pick
pub trait Schedulable {
    fn is_executing(&self) -> bool;
    fn is_ready(&self, now: Instant) -> bool;
}

impl<S: Schedulable + ?Sized> Schedulable for std::sync::Arc<S> {
    fn is_executing(&self) -> bool {
        (**self).is_executing()
    }

    fn is_ready(&self, now: Instant) -> bool {
        (**self).is_ready(now)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputationMode {
    /// One item at a time, in order
    #[default]
    Sequential,
    /// All ready items, up to the concurrency limit
    Parallel,
}

impl ComputationMode {
    /// Indices of the items to start now
    pub fn select<S: Schedulable>(&self, items: &[S], max_concurrency: usize, now: Instant) -> Vec<usize> {
        match self {
            ComputationMode::Sequential => next_sequential(items, now).into_iter().collect(),
            ComputationMode::Parallel => ready_parallel(items, max_concurrency, now),
        }
    }
}

/// First ready item, unless something is already executing
pub fn next_sequential<S: Schedulable>(items: &[S], now: Instant) -> Option<usize> {
    if items.iter().any(Schedulable::is_executing) {
        return None;
    }
    items.iter().position(|item| item.is_ready(now))
}

/// Up to `max_concurrency` minus the executing count of ready items
pub fn ready_parallel<S: Schedulable>(items: &[S], max_concurrency: usize, now: Instant) -> Vec<usize> {
    let executing = items.iter().filter(|item| item.is_executing()).count();
    let slots = max_concurrency.saturating_sub(executing);
    items
        .iter()
        .enumerate()
        .filter(|(_, item)| !item.is_executing() && item.is_ready(now))
        .map(|(index, _)| index)
        .take(slots)
        .collect()
}

#[cfg(test)]
#[path = "computation_tests.rs"]
mod tests;
