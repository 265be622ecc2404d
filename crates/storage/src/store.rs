// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Key-value store acts write their results into

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::io;
use thiserror::Error;

/// Errors that can occur in store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Shared key-value store
///
/// Implementations must be safe to call from concurrent act completions.
pub trait ValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Insert or replace the value under `key`
    fn put(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Remove and return the value under `key`
    fn take(&self, key: &str) -> Result<Option<Value>, StoreError>;

    fn contains(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key)?.is_some())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    /// Sorted keys, for status queries and tests
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl ValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.values.read().get(key).cloned())
    }

    fn put(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.values.write().insert(key.to_string(), value);
        Ok(())
    }

    fn take(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.values.write().remove(key))
    }

    fn contains(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.values.read().contains_key(key))
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
