// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Keyed singletons for circuit breakers and rate limiters
//!
//! Equal ids resolve to the same instance. The policy supplied by the first
//! caller for an id wins; later callers share that instance as-is.

use crate::breaker::{CircuitBreaker, CircuitState};
use crate::clock::{duration_ms, millis_since};
use crate::id::{CircuitId, RateLimiterId};
use crate::limiter::RateLimiter;
use crate::policy::{CircuitBreakerPolicy, RateLimiterPolicy};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

struct Entry<V> {
    value: Arc<V>,
    last_used: AtomicU64,
}

/// Concurrent map with create-on-miss and idle eviction
pub struct Registry<K, V> {
    origin: Instant,
    entries: RwLock<HashMap<K, Entry<V>>>,
}

impl<K: Eq + Hash + Clone, V> Registry<K, V> {
    pub fn new(origin: Instant) -> Self {
        Self {
            origin,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn find(&self, key: &K, now: Instant) -> Option<Arc<V>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(key).map(|entry| {
            entry
                .last_used
                .store(millis_since(self.origin, now), Ordering::Relaxed);
            Arc::clone(&entry.value)
        })
    }

    /// Return the entry for `key`, creating it with `factory` on a miss
    pub fn compute_if_absent(&self, key: K, now: Instant, factory: impl FnOnce() -> V) -> Arc<V> {
        if let Some(value) = self.find(&key, now) {
            return value;
        }
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let entry = entries.entry(key).or_insert_with(|| Entry {
            value: Arc::new(factory()),
            last_used: AtomicU64::new(0),
        });
        entry
            .last_used
            .store(millis_since(self.origin, now), Ordering::Relaxed);
        Arc::clone(&entry.value)
    }

    pub fn remove(&self, key: &K) -> Option<Arc<V>> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(key).map(|entry| entry.value)
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop entries unused for `ttl` that no caller still holds
    pub fn sweep(&self, ttl: Duration, now: Instant) -> usize {
        self.sweep_unless(ttl, now, |_| false)
    }

    /// As [`Registry::sweep`], but entries matching `pinned` are always kept
    pub fn sweep_unless(&self, ttl: Duration, now: Instant, pinned: impl Fn(&V) -> bool) -> usize {
        let now_ms = millis_since(self.origin, now);
        let ttl_ms = duration_ms(ttl);
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| {
            let idle = now_ms.saturating_sub(entry.last_used.load(Ordering::Relaxed));
            Arc::strong_count(&entry.value) > 1 || idle < ttl_ms || pinned(&entry.value)
        });
        before - entries.len()
    }
}

/// Resolves breaker and limiter instances by id
pub struct ResilienceRegistry {
    breakers: Registry<CircuitId, CircuitBreaker>,
    limiters: Registry<RateLimiterId, RateLimiter>,
    open_breaker: Arc<CircuitBreaker>,
    open_limiter: Arc<RateLimiter>,
    ttl: Option<Duration>,
}

impl ResilienceRegistry {
    pub fn new(now: Instant) -> Self {
        Self {
            breakers: Registry::new(now),
            limiters: Registry::new(now),
            open_breaker: Arc::new(CircuitBreaker::always_allow()),
            open_limiter: Arc::new(RateLimiter::always_allow()),
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Breaker for `id`; unprotected ids share one stateless instance
    pub fn circuit_breaker(
        &self,
        id: &CircuitId,
        policy: &CircuitBreakerPolicy,
        now: Instant,
    ) -> Arc<CircuitBreaker> {
        if id.is_none() || policy.is_unlimited() {
            return Arc::clone(&self.open_breaker);
        }
        self.breakers.compute_if_absent(id.clone(), now, || {
            tracing::debug!(circuit = %id, "created circuit breaker");
            CircuitBreaker::new(id.clone(), *policy, now)
        })
    }

    /// Limiter for `id`; unprotected ids share one stateless instance
    pub fn rate_limiter(
        &self,
        id: &RateLimiterId,
        policy: &RateLimiterPolicy,
        now: Instant,
    ) -> Arc<RateLimiter> {
        if id.is_none() || policy.is_unlimited() {
            return Arc::clone(&self.open_limiter);
        }
        self.limiters.compute_if_absent(id.clone(), now, || {
            tracing::debug!(limiter = %id, "created rate limiter");
            RateLimiter::new(id.clone(), *policy, now)
        })
    }

    pub fn find_circuit_breaker(&self, id: &CircuitId, now: Instant) -> Option<Arc<CircuitBreaker>> {
        self.breakers.find(id, now)
    }

    pub fn find_rate_limiter(&self, id: &RateLimiterId, now: Instant) -> Option<Arc<RateLimiter>> {
        self.limiters.find(id, now)
    }

    /// Evict idle entries if a TTL is configured
    ///
    /// A breaker that is not CLOSED is kept however long it sits idle, so
    /// eviction never cuts its reset timeout short.
    pub fn sweep(&self, now: Instant) -> usize {
        let Some(ttl) = self.ttl else {
            return 0;
        };
        let breakers = self
            .breakers
            .sweep_unless(ttl, now, |breaker| breaker.state() != CircuitState::Closed);
        let evicted = breakers + self.limiters.sweep(ttl, now);
        if evicted > 0 {
            tracing::debug!(evicted, "swept idle resilience entries");
        }
        evicted
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
