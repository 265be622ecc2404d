// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifiers and sharing scopes
//!
//! `CircuitId` and `RateLimiterId` decide which callers share one breaker or
//! limiter instance. Two ids that compare equal resolve to the same instance
//! in a [`crate::registry::ResilienceRegistry`].

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Generates unique identifiers
pub trait IdGen: Clone + Send + Sync {
    fn next(&self) -> String;
}

/// UUID-based ID generator for production use
#[derive(Clone, Default)]
pub struct UuidIdGen;

impl IdGen for UuidIdGen {
    fn next(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Sequential ID generator for testing
#[derive(Clone)]
pub struct SequentialIdGen {
    prefix: String,
    counter: Arc<AtomicU64>,
}

impl SequentialIdGen {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Default for SequentialIdGen {
    fn default() -> Self {
        Self::new("id")
    }
}

impl IdGen for SequentialIdGen {
    fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}", self.prefix, n)
    }
}

/// How widely a breaker or limiter instance is shared
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// No protection: always admits, keeps no state
    None,
    /// One instance for the whole registry
    Singleton,
    /// One instance per named type
    SharedByType(String),
    /// One instance per id within a named scope
    SharedById { scope: String, id: String },
    /// A private instance nobody else can resolve
    Isolated(String),
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::None => write!(f, "none"),
            Scope::Singleton => write!(f, "singleton"),
            Scope::SharedByType(ty) => write!(f, "type:{}", ty),
            Scope::SharedById { scope, id } => write!(f, "{}:{}", scope, id),
            Scope::Isolated(id) => write!(f, "isolated:{}", id),
        }
    }
}

macro_rules! scoped_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(Scope);

        impl $name {
            pub fn none() -> Self {
                Self(Scope::None)
            }

            pub fn singleton() -> Self {
                Self(Scope::Singleton)
            }

            pub fn shared_by_type(type_name: impl Into<String>) -> Self {
                Self(Scope::SharedByType(type_name.into()))
            }

            /// Share by the Rust type name of `T`
            pub fn shared_by_type_of<T: ?Sized>() -> Self {
                Self::shared_by_type(std::any::type_name::<T>())
            }

            pub fn shared_by_id(scope: impl Into<String>, id: impl Into<String>) -> Self {
                Self(Scope::SharedById {
                    scope: scope.into(),
                    id: id.into(),
                })
            }

            /// A fresh id that never equals any other
            pub fn isolated() -> Self {
                Self::isolated_with(&UuidIdGen)
            }

            pub fn isolated_with(id_gen: &impl IdGen) -> Self {
                Self(Scope::Isolated(id_gen.next()))
            }

            pub fn scope(&self) -> &Scope {
                &self.0
            }

            pub fn is_none(&self) -> bool {
                matches!(self.0, Scope::None)
            }

            pub fn is_isolated(&self) -> bool {
                matches!(self.0, Scope::Isolated(_))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::none()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

scoped_id!(
    /// Identity of a circuit breaker instance
    CircuitId
);

scoped_id!(
    /// Identity of a rate limiter instance
    RateLimiterId
);

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
