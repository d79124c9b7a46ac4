// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Persist the six class enable flags across processor resets.
// Author: Lukas Bower

//! Persistence bridge for class enable flags.
//!
//! The record is six bytes, one per class, in the fixed order of
//! [`RECORD_ORDER`]; each byte is `1` (enabled) or `2` (disabled). Only the
//! class flags survive a reset; checksum values and entry flags do not.
//! Persistence failures never stop the monitor: a failed restore falls back
//! to the defaults, and any failure invalidates the handle so later saves
//! are skipped.

use csmon_store::{StateStore, StoreError};
use log::{debug, info, warn};
use thiserror::Error;

use crate::types::{ChecksumState, ClassStates, ResourceClass, CLASS_COUNT};

/// Key of the class-state record.
pub const CLASS_STATES_KEY: &str = "csmon.class_states";

/// Class order of the persisted record.
pub const RECORD_ORDER: [ResourceClass; CLASS_COUNT] = [
    ResourceClass::Eeprom,
    ResourceClass::Memory,
    ResourceClass::Apps,
    ResourceClass::Tables,
    ResourceClass::OsCore,
    ResourceClass::CfeCore,
];

const ENABLED_BYTE: u8 = 1;
const DISABLED_BYTE: u8 = 2;

/// Failure restoring or saving the class-state record.
#[derive(Debug, Error)]
pub enum PersistError {
    /// The store rejected the operation.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A stored byte is neither enabled nor disabled.
    #[error("record byte {index} holds invalid state {value}")]
    InvalidState {
        /// Position in the record.
        index: usize,
        /// Byte found.
        value: u8,
    },
}

/// Encode class flags in record order.
#[must_use]
pub fn encode(states: &ClassStates) -> [u8; CLASS_COUNT] {
    let mut record = [0u8; CLASS_COUNT];
    for (slot, class) in record.iter_mut().zip(RECORD_ORDER) {
        *slot = match states.get(class) {
            ChecksumState::Enabled => ENABLED_BYTE,
            ChecksumState::Disabled => DISABLED_BYTE,
        };
    }
    record
}

/// Decode a record produced by [`encode`].
pub fn decode(record: &[u8; CLASS_COUNT]) -> Result<ClassStates, PersistError> {
    let mut states = ClassStates::default();
    for (index, (value, class)) in record.iter().zip(RECORD_ORDER).enumerate() {
        let state = match *value {
            ENABLED_BYTE => ChecksumState::Enabled,
            DISABLED_BYTE => ChecksumState::Disabled,
            value => return Err(PersistError::InvalidState { index, value }),
        };
        states.set(class, state);
    }
    Ok(states)
}

/// Where class flags are kept across resets.
pub trait StatePersistence {
    /// Class flags to start with, given the configured `defaults`.
    fn restore(&mut self, defaults: ClassStates) -> ClassStates;

    /// Record the current class flags.
    fn save(&mut self, states: &ClassStates);

    /// True while saves still reach the store.
    fn is_active(&self) -> bool;
}

/// Persistence disabled: defaults are used and saves are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPersist;

impl StatePersistence for NoPersist {
    fn restore(&mut self, defaults: ClassStates) -> ClassStates {
        defaults
    }

    fn save(&mut self, _states: &ClassStates) {}

    fn is_active(&self) -> bool {
        false
    }
}

/// Bridge between the monitor and a [`StateStore`].
#[derive(Debug)]
pub struct CdsBridge<S: StateStore> {
    store: S,
    handle_valid: bool,
}

impl<S: StateStore> CdsBridge<S> {
    /// Bridge over `store` with a valid handle.
    pub fn new(store: S) -> Self {
        Self {
            store,
            handle_valid: true,
        }
    }

    /// Backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// False once any store operation has failed.
    #[must_use]
    pub fn handle_valid(&self) -> bool {
        self.handle_valid
    }

    fn try_restore(&mut self, defaults: ClassStates) -> Result<ClassStates, PersistError> {
        if self.store.exists(CLASS_STATES_KEY)? {
            let mut record = [0u8; CLASS_COUNT];
            self.store.read(CLASS_STATES_KEY, &mut record)?;
            let states = decode(&record)?;
            info!("restored class states {}", hex::encode(record));
            Ok(states)
        } else {
            let record = encode(&defaults);
            self.store.write(CLASS_STATES_KEY, &record)?;
            info!("created class state record {}", hex::encode(record));
            Ok(defaults)
        }
    }
}

impl<S: StateStore> StatePersistence for CdsBridge<S> {
    fn restore(&mut self, defaults: ClassStates) -> ClassStates {
        match self.try_restore(defaults) {
            Ok(states) => states,
            Err(err) => {
                warn!("class state restore failed, using defaults: {err}");
                self.handle_valid = false;
                defaults
            }
        }
    }

    fn save(&mut self, states: &ClassStates) {
        if !self.handle_valid {
            debug!("class state save skipped, store handle invalid");
            return;
        }
        let record = encode(states);
        match self.store.write(CLASS_STATES_KEY, &record) {
            Ok(()) => debug!("saved class states {}", hex::encode(record)),
            Err(err) => {
                warn!("class state save failed, persistence disabled: {err}");
                self.handle_valid = false;
            }
        }
    }

    fn is_active(&self) -> bool {
        self.handle_valid
    }
}
