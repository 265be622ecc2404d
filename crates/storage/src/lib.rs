// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rampart-storage: value stores that receive act results

mod journal;
mod store;

pub use journal::{JournalEntry, JournalStore};
pub use store::{MemoryStore, StoreError, ValueStore};
pub use serde_json::Value;
