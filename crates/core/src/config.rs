// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine defaults
//!
//! A `Defaults` value is passed explicitly into controllers and registries.
//! Every field is optional in TOML; missing fields keep their defaults.

use crate::clock::duration_ms;
use crate::error::ConfigError;
use crate::policy::Policy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Timing knobs for the policy checker
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Backoff unit multiplied by the number of consecutive false starts
    #[serde(with = "humantime_serde")]
    pub false_start_base: Duration,
    /// Upper bound on false-start backoff
    #[serde(with = "humantime_serde")]
    pub false_start_cap: Duration,
    /// Lateness tolerated before an interval or timeout counts as overrun
    #[serde(with = "humantime_serde")]
    pub deviation_margin: Duration,
}

impl Tuning {
    pub fn false_start_base_ms(&self) -> u64 {
        duration_ms(self.false_start_base)
    }

    pub fn false_start_cap_ms(&self) -> u64 {
        duration_ms(self.false_start_cap)
    }

    pub fn deviation_margin_ms(&self) -> u64 {
        duration_ms(self.deviation_margin)
    }
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            false_start_base: Duration::from_secs(1),
            false_start_cap: Duration::from_secs(30),
            deviation_margin: Duration::from_secs(1),
        }
    }
}

/// Defaults shared by commands, act chains and the driver
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Baseline policy for commands, acts and chains built from these defaults
    pub policy: Policy,
    pub tuning: Tuning,
    /// Bounded wait for a controller lock before skipping the tick
    #[serde(with = "humantime_serde")]
    pub lock_timeout: Duration,
    /// Acts a PARALLEL group may run at once
    pub max_concurrency: usize,
    /// Idle breaker/limiter entries older than this are swept
    #[serde(with = "humantime_serde")]
    pub registry_ttl: Option<Duration>,
    /// Ticks the driver runs concurrently
    pub max_concurrent_ticks: usize,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            policy: Policy::default(),
            tuning: Tuning::default(),
            lock_timeout: Duration::from_secs(5),
            max_concurrency: 8,
            registry_ttl: None,
            max_concurrent_ticks: 16,
        }
    }
}

impl Defaults {
    /// Parse defaults from TOML content
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let defaults: Defaults = toml::from_str(content)?;
        defaults.policy.validate()?;
        Ok(defaults)
    }

    /// Load defaults from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let defaults = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded defaults");
        Ok(defaults)
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
