// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Journal-backed value store
//!
//! Every mutation is appended to a JSON-lines journal and synced before it
//! is applied in memory. Opening an existing journal replays it.

use crate::store::{MemoryStore, StoreError, ValueStore};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

/// A single journaled mutation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum JournalEntry {
    Put { key: String, value: Value },
    Take { key: String },
}

#[derive(Debug, Serialize, Deserialize)]
struct Record {
    seq: u64,
    entry: JournalEntry,
}

struct Journal {
    file: File,
    sequence: u64,
}

pub struct JournalStore {
    journal: Mutex<Journal>,
    values: MemoryStore,
}

impl JournalStore {
    /// Open or create a journal at the given path
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let entries = Self::replay(path)?;
        let values = MemoryStore::new();
        for entry in &entries {
            match entry {
                JournalEntry::Put { key, value } => values.put(key, value.clone())?,
                JournalEntry::Take { key } => {
                    values.take(key)?;
                }
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        tracing::debug!(path = %path.display(), entries = entries.len(), "opened journal");
        Ok(Self {
            journal: Mutex::new(Journal {
                file,
                sequence: entries.len() as u64,
            }),
            values,
        })
    }

    /// Read all entries from a journal; a missing file is empty
    pub fn replay(path: &Path) -> Result<Vec<JournalEntry>, StoreError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let record: Record = serde_json::from_str(&line)?;
            entries.push(record.entry);
        }
        Ok(entries)
    }

    pub fn sequence(&self) -> u64 {
        self.journal.lock().sequence
    }

    fn append(&self, entry: JournalEntry) -> Result<(), StoreError> {
        let mut journal = self.journal.lock();
        let record = Record {
            seq: journal.sequence + 1,
            entry,
        };
        let line = serde_json::to_string(&record)?;
        writeln!(journal.file, "{}", line)?;
        journal.file.sync_all()?;
        journal.sequence = record.seq;
        Ok(())
    }
}

impl ValueStore for JournalStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.values.get(key)
    }

    fn put(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.append(JournalEntry::Put {
            key: key.to_string(),
            value: value.clone(),
        })?;
        self.values.put(key, value)
    }

    fn take(&self, key: &str) -> Result<Option<Value>, StoreError> {
        if !self.values.contains(key)? {
            return Ok(None);
        }
        self.append(JournalEntry::Take {
            key: key.to_string(),
        })?;
        self.values.take(key)
    }

    fn contains(&self, key: &str) -> Result<bool, StoreError> {
        self.values.contains(key)
    }
}

#[cfg(test)]
#[path = "journal_tests.rs"]
mod tests;
