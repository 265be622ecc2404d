// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Acts, act groups and act group chains
//!
//! These are definitions. A controller materializes a group into live state
//! only when the group becomes current, so every run of a group starts from
//! fresh execution statuses.

use crate::computation::ComputationMode;
use async_trait::async_trait;
use rampart_core::{ActionError, CircuitId, Notification, Policy, RateLimiterId, Subject};
use serde_json::Value;
use std::sync::Arc;

/// Outcome of one act execution; a value is written to the store under the act's key
pub type ActResult = Result<Option<Value>, ActionError>;

/// Asynchronous work performed by an act
#[async_trait]
pub trait ActWork: Send + Sync {
    async fn run(&self) -> ActResult;
}

struct FnWork<F>(F);

#[async_trait]
impl<F> ActWork for FnWork<F>
where
    F: Fn() -> ActResult + Send + Sync,
{
    async fn run(&self) -> ActResult {
        (self.0)()
    }
}

/// A unit of cacheable work
#[derive(Clone)]
pub struct Act {
    key: String,
    policy: Policy,
    work: Arc<dyn ActWork>,
    circuit_id: CircuitId,
    rate_limiter_id: RateLimiterId,
    subject: Subject<Notification<Value>>,
}

impl Act {
    pub fn new(key: impl Into<String>, work: impl ActWork + 'static) -> Self {
        Self {
            key: key.into(),
            policy: Policy::default(),
            work: Arc::new(work),
            circuit_id: CircuitId::none(),
            rate_limiter_id: RateLimiterId::none(),
            subject: Subject::new("act"),
        }
    }

    /// An act backed by a synchronous closure
    pub fn from_fn(
        key: impl Into<String>,
        f: impl Fn() -> ActResult + Send + Sync + 'static,
    ) -> Self {
        Self::new(key, FnWork(f))
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
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

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn work(&self) -> Arc<dyn ActWork> {
        Arc::clone(&self.work)
    }

    pub fn circuit_id(&self) -> &CircuitId {
        &self.circuit_id
    }

    pub fn rate_limiter_id(&self) -> &RateLimiterId {
        &self.rate_limiter_id
    }

    /// Per-execution notifications; survives rematerialization
    pub fn subject(&self) -> &Subject<Notification<Value>> {
        &self.subject
    }
}

impl std::fmt::Debug for Act {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Act")
            .field("key", &self.key)
            .field("policy", &self.policy)
            .finish()
    }
}

/// Acts sharing a computation mode
#[derive(Clone, Debug)]
pub struct ActGroup {
    name: String,
    mode: ComputationMode,
    acts: Vec<Act>,
    subject: Subject<Notification<String>>,
}

impl ActGroup {
    pub fn new(name: impl Into<String>, mode: ComputationMode) -> Self {
        Self {
            name: name.into(),
            mode,
            acts: Vec::new(),
            subject: Subject::new("act_group"),
        }
    }

    pub fn sequential(name: impl Into<String>) -> Self {
        Self::new(name, ComputationMode::Sequential)
    }

    pub fn parallel(name: impl Into<String>) -> Self {
        Self::new(name, ComputationMode::Parallel)
    }

    pub fn with_act(mut self, act: Act) -> Self {
        self.acts.push(act);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> ComputationMode {
        self.mode
    }

    pub fn acts(&self) -> &[Act] {
        &self.acts
    }

    pub fn is_empty(&self) -> bool {
        self.acts.is_empty()
    }

    /// Group-level notifications: Subscribe on connect, Next(key) per
    /// successful act execution, Complete or Error when the group ends
    pub fn subject(&self) -> &Subject<Notification<String>> {
        &self.subject
    }
}

/// Groups executed strictly in order
#[derive(Clone, Debug)]
pub struct ActGroupChain {
    name: String,
    policy: Policy,
    groups: Vec<ActGroup>,
    circuit_id: CircuitId,
    rate_limiter_id: RateLimiterId,
    subject: Subject<Notification<usize>>,
}

impl ActGroupChain {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            policy: Policy::default(),
            groups: Vec::new(),
            circuit_id: CircuitId::none(),
            rate_limiter_id: RateLimiterId::none(),
            subject: Subject::new("act_chain"),
        }
    }

    /// Chain policy: attempt and retry interval govern group retries,
    /// timeout bounds each chain execution
    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_group(mut self, group: ActGroup) -> Self {
        self.groups.push(group);
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

    pub fn groups(&self) -> &[ActGroup] {
        &self.groups
    }

    pub fn circuit_id(&self) -> &CircuitId {
        &self.circuit_id
    }

    pub fn rate_limiter_id(&self) -> &RateLimiterId {
        &self.rate_limiter_id
    }

    /// Chain notifications: Next(index) as each group completes
    pub fn subject(&self) -> &Subject<Notification<usize>> {
        &self.subject
    }
}
