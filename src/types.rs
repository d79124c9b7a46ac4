// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Resource classes and enable/disable states shared by every monitor component.
// Author: Lukas Bower

//! Shared vocabulary: resource classes and checksum states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of resource classes tracked by the monitor.
pub const CLASS_COUNT: usize = 6;

/// Category of checksummed objects, each with its own entry table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceClass {
    /// Non-volatile EEPROM ranges.
    Eeprom,
    /// RAM regions, possibly made of several disjoint segments.
    Memory,
    /// Loaded table images, keyed by table name.
    Tables,
    /// Loaded application images, keyed by application name.
    Apps,
    /// Operating-system core image.
    OsCore,
    /// Flight executive core image.
    CfeCore,
}

impl ResourceClass {
    /// Classes in routine sweep order.
    pub const SWEEP_ORDER: [ResourceClass; CLASS_COUNT] = [
        ResourceClass::Eeprom,
        ResourceClass::Memory,
        ResourceClass::Tables,
        ResourceClass::Apps,
        ResourceClass::OsCore,
        ResourceClass::CfeCore,
    ];

    /// Position of the class in [`ResourceClass::SWEEP_ORDER`].
    #[must_use]
    pub fn sweep_index(self) -> usize {
        match self {
            ResourceClass::Eeprom => 0,
            ResourceClass::Memory => 1,
            ResourceClass::Tables => 2,
            ResourceClass::Apps => 3,
            ResourceClass::OsCore => 4,
            ResourceClass::CfeCore => 5,
        }
    }

    /// Entries of this class are addressed by name rather than numeric ID.
    #[must_use]
    pub fn keyed_by_name(self) -> bool {
        matches!(self, ResourceClass::Tables | ResourceClass::Apps)
    }

    /// Entries of this class may span several disjoint segments.
    #[must_use]
    pub fn allows_segments(self) -> bool {
        matches!(self, ResourceClass::Memory)
    }

    /// Core-image classes hold at most one entry.
    #[must_use]
    pub fn is_core_image(self) -> bool {
        matches!(self, ResourceClass::OsCore | ResourceClass::CfeCore)
    }

    /// Short lowercase label used in logs and telemetry.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            ResourceClass::Eeprom => "eeprom",
            ResourceClass::Memory => "memory",
            ResourceClass::Tables => "tables",
            ResourceClass::Apps => "apps",
            ResourceClass::OsCore => "os_core",
            ResourceClass::CfeCore => "cfe_core",
        }
    }
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Enable/disable flag used for the master gate, classes and entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumState {
    /// Included in the routine sweep.
    #[default]
    Enabled,
    /// Skipped by the routine sweep.
    Disabled,
}

impl ChecksumState {
    /// True when the state is [`ChecksumState::Enabled`].
    #[must_use]
    pub fn is_enabled(self) -> bool {
        matches!(self, ChecksumState::Enabled)
    }
}

impl fmt::Display for ChecksumState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChecksumState::Enabled => f.write_str("enabled"),
            ChecksumState::Disabled => f.write_str("disabled"),
        }
    }
}

/// One state per resource class, indexed by sweep position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClassStates {
    states: [ChecksumState; CLASS_COUNT],
}

impl ClassStates {
    /// Every class set to `state`.
    #[must_use]
    pub fn uniform(state: ChecksumState) -> Self {
        Self {
            states: [state; CLASS_COUNT],
        }
    }

    /// State of `class`.
    #[must_use]
    pub fn get(&self, class: ResourceClass) -> ChecksumState {
        self.states[class.sweep_index()]
    }

    /// Overwrite the state of `class`.
    pub fn set(&mut self, class: ResourceClass, state: ChecksumState) {
        self.states[class.sweep_index()] = state;
    }

    /// Iterate `(class, state)` pairs in sweep order.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceClass, ChecksumState)> + '_ {
        ResourceClass::SWEEP_ORDER
            .iter()
            .map(move |class| (*class, self.get(*class)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_index_matches_order() {
        for (idx, class) in ResourceClass::SWEEP_ORDER.iter().enumerate() {
            assert_eq!(class.sweep_index(), idx);
        }
    }

    #[test]
    fn class_states_set_is_local() {
        let mut states = ClassStates::uniform(ChecksumState::Enabled);
        states.set(ResourceClass::Apps, ChecksumState::Disabled);
        assert_eq!(states.get(ResourceClass::Apps), ChecksumState::Disabled);
        assert_eq!(states.get(ResourceClass::Tables), ChecksumState::Enabled);
        assert_eq!(
            states.iter().filter(|(_, s)| !s.is_enabled()).count(),
            1
        );
    }
}
