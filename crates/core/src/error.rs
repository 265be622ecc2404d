// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared by commands, acts and controllers

use crate::limiter::LimitAxis;
use thiserror::Error;

/// Outcome of a single action invocation that did not produce a value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// Ordinary failure, subject to the attempt/retry policy
    #[error("action failed: {0}")]
    Failed(String),
    /// Cooperative cancellation of the whole command
    #[error("command cancelled")]
    Cancel,
    /// Unrecoverable failure, skips remaining attempts
    #[error("fatal: {0}")]
    Fatal(String),
}

impl ActionError {
    pub fn failed(reason: impl std::fmt::Display) -> Self {
        ActionError::Failed(reason.to_string())
    }

    pub fn fatal(reason: impl std::fmt::Display) -> Self {
        ActionError::Fatal(reason.to_string())
    }

    /// Cancel and Fatal escape the per-action loop; everything else is recorded
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActionError::Cancel | ActionError::Fatal(_))
    }
}

/// Errors reported to observers of commands, acts and act chains
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("circuit breaker {id} is open")]
    CircuitBreakerOpen { id: String },
    #[error("rate limiter {id} rejected the call ({axis})")]
    RateLimitViolated { id: String, axis: LimitAxis },
    #[error("policy violation: {reason}")]
    PolicyViolation { reason: String },
    #[error("cancelled")]
    Cancelled,
    #[error("fatal: {0}")]
    Fatal(String),
    #[error("action failed: {0}")]
    Action(String),
    #[error("action produced no value")]
    NullResult,
    #[error("timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },
    #[error("already subscribed")]
    AlreadySubscribed,
}

impl ExecutionError {
    pub fn policy_violation(reason: impl Into<String>) -> Self {
        ExecutionError::PolicyViolation {
            reason: reason.into(),
        }
    }

    /// Short stable name for log fields
    pub fn kind(&self) -> &'static str {
        match self {
            ExecutionError::CircuitBreakerOpen { .. } => "circuit_breaker_open",
            ExecutionError::RateLimitViolated { .. } => "rate_limit_violated",
            ExecutionError::PolicyViolation { .. } => "policy_violation",
            ExecutionError::Cancelled => "cancelled",
            ExecutionError::Fatal(_) => "fatal",
            ExecutionError::Action(_) => "action",
            ExecutionError::NullResult => "null_result",
            ExecutionError::Timeout { .. } => "timeout",
            ExecutionError::AlreadySubscribed => "already_subscribed",
        }
    }
}

impl From<ActionError> for ExecutionError {
    fn from(err: ActionError) -> Self {
        match err {
            ActionError::Failed(reason) => ExecutionError::Action(reason),
            ActionError::Cancel => ExecutionError::Cancelled,
            ActionError::Fatal(reason) => ExecutionError::Fatal(reason),
        }
    }
}

/// Rejected policy construction
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {policy} policy: {reason}")]
pub struct PolicyError {
    pub policy: &'static str,
    pub reason: String,
}

impl PolicyError {
    pub fn new(policy: &'static str, reason: impl Into<String>) -> Self {
        Self {
            policy,
            reason: reason.into(),
        }
    }
}

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Policy(#[from] PolicyError),
}
