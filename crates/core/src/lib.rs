// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rampart-core: policies and protective state for the rampart engine
//!
//! This crate provides:
//! - Immutable execution and protective policies
//! - Atomic execution status and the pure policy checker over it
//! - Circuit breakers and rate limiters with a keyed registry
//! - Best-effort observer subjects and the shared error taxonomy

pub mod breaker;
pub mod checker;
pub mod clock;
pub mod config;
pub mod error;
pub mod id;
pub mod limiter;
pub mod policy;
pub mod registry;
pub mod status;
pub mod subject;
pub mod window;

pub use breaker::{Admission, CircuitBreaker, CircuitState};
pub use checker::{Violation, NEVER};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{Defaults, Tuning};
pub use error::{ActionError, ConfigError, ExecutionError, PolicyError};
pub use id::{CircuitId, IdGen, RateLimiterId, Scope, SequentialIdGen, UuidIdGen};
pub use limiter::{LimitAxis, RateLimiter};
pub use policy::{
    Attempt, AttemptKind, CircuitBreakerPolicy, Criterion, CriterionKind, Interval, Policy,
    RateLimiterPolicy, TimeRate, Timeout,
};
pub use registry::{Registry, ResilienceRegistry};
pub use status::{ExecutionStatus, StatusSnapshot};
pub use subject::{Notification, ObserverError, ObserverHandle, Subject};
