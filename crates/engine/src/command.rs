// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Commands: ordered actions under one policy

use crate::action::Action;
use rampart_core::{CircuitId, ExecutionStatus, Notification, Policy, RateLimiterId, Subject};
use std::time::Instant;

pub struct Command<T> {
    name: String,
    policy: Policy,
    actions: Vec<Action<T>>,
    circuit_id: CircuitId,
    rate_limiter_id: RateLimiterId,
    status: ExecutionStatus,
    subject: Subject<Notification<T>>,
}

impl<T> Command<T> {
    pub fn new(name: impl Into<String>, policy: Policy, now: Instant) -> Self {
        Self {
            name: name.into(),
            policy,
            actions: Vec::new(),
            circuit_id: CircuitId::none(),
            rate_limiter_id: RateLimiterId::none(),
            status: ExecutionStatus::new(now),
            subject: Subject::new("command"),
        }
    }

    pub fn with_action(mut self, action: Action<T>) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_fallback(mut self, action: Action<T>) -> Self {
        self.actions.push(action.into_fallback());
        self
    }

    pub fn with_circuit_breaker(mut self, id: CircuitId) -> Self {
        self.circuit_id = id;
        self
    }

    pub fn with_rate_limiter(mut self, id: RateLimiterId) -> Self {
        self.rate_limiter_id = id;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn circuit_id(&self) -> &CircuitId {
        &self.circuit_id
    }

    pub fn rate_limiter_id(&self) -> &RateLimiterId {
        &self.rate_limiter_id
    }

    pub fn status(&self) -> &ExecutionStatus {
        &self.status
    }

    pub fn subject(&self) -> &Subject<Notification<T>> {
        &self.subject
    }

    /// Ordinary actions in insertion order
    pub fn actions(&self) -> impl Iterator<Item = &Action<T>> {
        self.actions.iter().filter(|a| !a.is_fallback())
    }

    pub fn fallbacks(&self) -> impl Iterator<Item = &Action<T>> {
        self.actions.iter().filter(|a| a.is_fallback())
    }

    pub fn has_fallbacks(&self) -> bool {
        self.actions.iter().any(Action::is_fallback)
    }
}

impl<T> std::fmt::Debug for Command<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("actions", &self.actions)
            .field("circuit_id", &self.circuit_id)
            .field("rate_limiter_id", &self.rate_limiter_id)
            .finish()
    }
}
