// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: RAM-backed record store with injectable faults for host testing.
// Author: Lukas Bower

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{validate_key, StateStore, StoreError};

/// Fault switches applied to every [`MemoryStore`] clone sharing the same backing map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreFaults {
    /// Fail `exists` queries.
    pub fail_exists: bool,
    /// Fail reads.
    pub fail_reads: bool,
    /// Fail writes.
    pub fail_writes: bool,
}

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<String, Vec<u8>>,
    faults: StoreFaults,
    writes: u64,
}

/// In-memory store whose clones share one backing map.
///
/// Cloning a `MemoryStore` hands out another view of the same records, which
/// lets a test drop a monitor and start a fresh one against the contents that
/// "survived" the reset.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_owned()))
    }

    /// Replace the active fault switches.
    pub fn set_faults(&self, faults: StoreFaults) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.faults = faults;
        }
    }

    /// Write `data` directly, bypassing fault injection.
    pub fn seed(&self, key: &str, data: &[u8]) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.records.insert(key.to_owned(), data.to_vec());
        }
    }

    /// Return a copy of the record at `key`, bypassing fault injection.
    #[must_use]
    pub fn snapshot(&self, key: &str) -> Option<Vec<u8>> {
        self.inner
            .lock()
            .ok()
            .and_then(|inner| inner.records.get(key).cloned())
    }

    /// Number of successful writes since creation.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.inner.lock().map(|inner| inner.writes).unwrap_or(0)
    }
}

impl StateStore for MemoryStore {
    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        validate_key(key)?;
        let inner = self.lock()?;
        if inner.faults.fail_exists {
            return Err(StoreError::Unavailable("injected exists fault".to_owned()));
        }
        Ok(inner.records.contains_key(key))
    }

    fn read(&self, key: &str, buf: &mut [u8]) -> Result<(), StoreError> {
        validate_key(key)?;
        let inner = self.lock()?;
        if inner.faults.fail_reads {
            return Err(StoreError::Unavailable("injected read fault".to_owned()));
        }
        let record = inner
            .records
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_owned()))?;
        if record.len() != buf.len() {
            return Err(StoreError::SizeMismatch {
                key: key.to_owned(),
                expected: buf.len(),
                actual: record.len(),
            });
        }
        buf.copy_from_slice(record);
        Ok(())
    }

    fn write(&mut self, key: &str, data: &[u8]) -> Result<(), StoreError> {
        validate_key(key)?;
        let mut inner = self.lock()?;
        if inner.faults.fail_writes {
            return Err(StoreError::Unavailable("injected write fault".to_owned()));
        }
        inner.records.insert(key.to_owned(), data.to_vec());
        inner.writes += 1;
        Ok(())
    }
}
