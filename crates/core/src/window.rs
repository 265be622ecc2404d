// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock-free sliding window counter
//!
//! The window is split into fixed-width buckets arranged in a ring. Each
//! bucket packs the time slot it belongs to (high bits) and its count (low
//! bits) into a single `AtomicU64`, so a bucket is recycled for a newer slot
//! with one compare-and-set.
//!
//! A bucket counts toward [`SlidingWindow::sum`] while any part of it lies
//! inside the window, so an event can be retained up to one bucket width
//! longer than the window. The window never under-counts.

use crate::clock::{duration_ms, millis_since};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Buckets used when the caller has no preference
pub const DEFAULT_BUCKETS: usize = 20;

const COUNT_BITS: u32 = 24;
const COUNT_MASK: u64 = (1 << COUNT_BITS) - 1;

fn pack(slot: u64, count: u64) -> u64 {
    (slot << COUNT_BITS) | count.min(COUNT_MASK)
}

fn unpack(packed: u64) -> (u64, u64) {
    (packed >> COUNT_BITS, packed & COUNT_MASK)
}

#[derive(Debug)]
pub struct SlidingWindow {
    origin: Instant,
    window_ms: u64,
    width_ms: u64,
    buckets: Box<[AtomicU64]>,
}

impl SlidingWindow {
    pub fn new(window: Duration, buckets: usize, origin: Instant) -> Self {
        let window_ms = duration_ms(window);
        let n = buckets.max(1) as u64;
        let width_ms = window_ms.div_ceil(n).max(1);
        // One spare bucket so a window straddling slot boundaries fits the ring
        let ring = (window_ms / width_ms + 2) as usize;
        Self {
            origin,
            window_ms,
            width_ms,
            buckets: (0..ring).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    fn slot(&self, now: Instant) -> u64 {
        millis_since(self.origin, now) / self.width_ms
    }

    fn bucket(&self, slot: u64) -> &AtomicU64 {
        &self.buckets[(slot % self.buckets.len() as u64) as usize]
    }

    /// Record one event at `now`
    pub fn record(&self, now: Instant) {
        self.add(now, 1);
    }

    /// Record `n` events at `now`
    pub fn add(&self, now: Instant, n: u64) {
        let slot = self.slot(now);
        let bucket = self.bucket(slot);
        let mut current = bucket.load(Ordering::Acquire);
        loop {
            let (bucket_slot, count) = unpack(current);
            let next = match bucket_slot.cmp(&slot) {
                std::cmp::Ordering::Equal => pack(slot, count.saturating_add(n)),
                std::cmp::Ordering::Less => pack(slot, n),
                // Bucket already recycled by a newer slot: the event has aged out
                std::cmp::Ordering::Greater => return,
            };
            match bucket.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    /// Events recorded within the window ending at `now`
    pub fn sum(&self, now: Instant) -> u64 {
        let now_ms = millis_since(self.origin, now);
        let slot = now_ms / self.width_ms;
        let horizon = now_ms.saturating_sub(self.window_ms);
        self.buckets
            .iter()
            .map(|bucket| unpack(bucket.load(Ordering::Acquire)))
            .filter(|(bucket_slot, _)| {
                *bucket_slot <= slot && (bucket_slot + 1) * self.width_ms > horizon
            })
            .map(|(_, count)| count)
            .sum()
    }

    pub fn clear(&self) {
        for bucket in self.buckets.iter() {
            bucket.store(0, Ordering::Release);
        }
    }
}

#[cfg(test)]
#[path = "window_tests.rs"]
mod tests;
