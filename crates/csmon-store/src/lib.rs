// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Fixed-size record store surviving processor resets.
// Author: Lukas Bower
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Non-volatile record store primitives.
//!
//! A store holds small fixed-size records addressed by a string key. Every
//! read and write is all-or-nothing: a failed write leaves the previously
//! stored bytes untouched. Callers only rely on three operations: check
//! whether a key exists, read exactly `N` bytes, and write exactly `N`
//! bytes.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::{MemoryStore, StoreFaults};

use thiserror::Error;

/// Errors surfaced by [`StateStore`] implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key has never been written.
    #[error("record {0:?} does not exist")]
    NotFound(String),
    /// The stored record length differs from the caller's buffer.
    #[error("record {key:?} holds {actual} bytes, expected {expected}")]
    SizeMismatch {
        /// Record key.
        key: String,
        /// Length requested by the caller.
        expected: usize,
        /// Length found in the store.
        actual: usize,
    },
    /// Keys are restricted to `[A-Za-z0-9._-]` and must be non-empty.
    #[error("invalid record key {0:?}")]
    InvalidKey(String),
    /// Backing medium rejected the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// Filesystem failure.
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Key/value record store with all-or-nothing semantics.
pub trait StateStore: Send {
    /// Report whether `key` has been written before.
    fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Fill `buf` with the record stored at `key`.
    ///
    /// Fails with [`StoreError::SizeMismatch`] when the stored record is not
    /// exactly `buf.len()` bytes; `buf` is left untouched on failure.
    fn read(&self, key: &str, buf: &mut [u8]) -> Result<(), StoreError>;

    /// Replace the record at `key` with `data`.
    fn write(&mut self, key: &str, data: &[u8]) -> Result<(), StoreError>;
}

impl<S: StateStore + ?Sized> StateStore for Box<S> {
    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        (**self).exists(key)
    }

    fn read(&self, key: &str, buf: &mut [u8]) -> Result<(), StoreError> {
        (**self).read(key, buf)
    }

    fn write(&mut self, key: &str, data: &[u8]) -> Result<(), StoreError> {
        (**self).write(key, data)
    }
}

pub(crate) fn validate_key(key: &str) -> Result<(), StoreError> {
    let valid = !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'));
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_owned()))
    }
}
