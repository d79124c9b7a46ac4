// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Per-class ordered tables of checkable entries.
// Author: Lukas Bower

//! Target registry.
//!
//! Each [`ResourceClass`] owns one [`ClassTable`]: a class enable flag and
//! an ordered list of entries. Id-keyed classes (EEPROM, memory and the
//! core images) identify entries by their configured position; tables and
//! applications identify them by name. The registry owns every entry
//! record; the scheduler only keeps indices into it.

mod entry;

pub use entry::{Entry, EntryKey, PassCursor, Region, Segment};

use crate::error::CommandError;
use crate::types::{ChecksumState, ClassStates, ResourceClass, CLASS_COUNT};

/// Entries and enable flag of one resource class.
#[derive(Debug, Clone, Default)]
pub struct ClassTable {
    state: ChecksumState,
    entries: Vec<Entry>,
}

impl ClassTable {
    /// Class enable flag.
    #[must_use]
    pub fn state(&self) -> ChecksumState {
        self.state
    }

    /// Entries in sweep order.
    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Number of entries, loaded or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the class has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn reset_cursors(&mut self) {
        for entry in &mut self.entries {
            entry.cursor.reset();
        }
    }
}

/// Owner of every entry record, grouped by class.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    classes: [ClassTable; CLASS_COUNT],
}

impl Registry {
    /// Empty registry with the given class flags.
    #[must_use]
    pub fn new(states: ClassStates) -> Self {
        let mut registry = Self::default();
        registry.apply_states(states);
        registry
    }

    /// Table of `class`.
    #[must_use]
    pub fn class(&self, class: ResourceClass) -> &ClassTable {
        &self.classes[class.sweep_index()]
    }

    /// Snapshot of every class flag.
    #[must_use]
    pub fn class_states(&self) -> ClassStates {
        let mut states = ClassStates::default();
        for class in ResourceClass::SWEEP_ORDER {
            states.set(class, self.class(class).state);
        }
        states
    }

    /// Overwrite every class flag without touching entry progress.
    pub fn apply_states(&mut self, states: ClassStates) {
        for (class, state) in states.iter() {
            self.classes[class.sweep_index()].state = state;
        }
    }

    /// Change one class flag. Disabling discards the class's in-flight passes.
    pub fn set_class_state(&mut self, class: ResourceClass, state: ChecksumState) {
        let table = &mut self.classes[class.sweep_index()];
        table.state = state;
        if !state.is_enabled() {
            table.reset_cursors();
        }
    }

    /// Append `entry` to `class`.
    ///
    /// Core-image classes hold one entry; the key kind must match the class.
    /// A loaded entry must cover a non-empty range that does not wrap.
    pub fn push(&mut self, class: ResourceClass, entry: Entry) -> Result<usize, CommandError> {
        check_key_kind(class, &entry.key)?;
        if let Some(region) = &entry.region {
            if region.check_shape().is_err() {
                return Err(CommandError::InvalidRange {
                    address: region.segments().first().map_or(0, |seg| seg.address),
                    size: region.len(),
                });
            }
        }
        let table = &mut self.classes[class.sweep_index()];
        if class.is_core_image() && !table.entries.is_empty() {
            return Err(CommandError::TooManyCoreEntries(class));
        }
        table.entries.push(entry);
        Ok(table.entries.len() - 1)
    }

    /// Swap the whole entry list of `class`, keeping its flag.
    pub fn replace_entries(&mut self, class: ResourceClass, entries: Vec<Entry>) {
        self.classes[class.sweep_index()].entries = entries;
    }

    /// Index of the entry keyed `key` in `class`.
    pub fn find(&self, class: ResourceClass, key: &EntryKey) -> Result<usize, CommandError> {
        check_key_kind(class, key)?;
        self.class(class)
            .entries
            .iter()
            .position(|entry| &entry.key == key)
            .ok_or_else(|| CommandError::UnknownEntry {
                class,
                key: key.clone(),
            })
    }

    /// Entry at `index` of `class`.
    #[must_use]
    pub fn entry(&self, class: ResourceClass, index: usize) -> Option<&Entry> {
        self.class(class).entries.get(index)
    }

    pub(crate) fn entry_mut(&mut self, class: ResourceClass, index: usize) -> Option<&mut Entry> {
        self.classes[class.sweep_index()].entries.get_mut(index)
    }

    /// Lowest-keyed entry of `class` whose range covers `address`.
    pub fn entry_covering(
        &self,
        class: ResourceClass,
        address: u64,
    ) -> Result<&Entry, CommandError> {
        self.class(class)
            .entries
            .iter()
            .find(|entry| entry.covers(address))
            .ok_or(CommandError::AddressNotCovered { class, address })
    }

    /// Total number of entries across all classes.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.classes.iter().map(ClassTable::len).sum()
    }
}

fn check_key_kind(class: ResourceClass, key: &EntryKey) -> Result<(), CommandError> {
    match (class.keyed_by_name(), key) {
        (true, EntryKey::Name(_)) | (false, EntryKey::Id(_)) => Ok(()),
        (true, EntryKey::Id(_)) => Err(CommandError::SelectorMismatch {
            class,
            expected: "name",
        }),
        (false, EntryKey::Name(_)) => Err(CommandError::SelectorMismatch {
            class,
            expected: "id",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eeprom(id: u16, address: u64, size: u64) -> Entry {
        Entry::new(
            EntryKey::Id(id),
            Region::single(address, size),
            ChecksumState::Enabled,
        )
    }

    #[test]
    fn find_respects_key_kind() {
        let mut registry = Registry::new(ClassStates::default());
        registry.push(ResourceClass::Eeprom, eeprom(0, 0, 16)).unwrap();
        registry.push(ResourceClass::Eeprom, eeprom(2, 16, 16)).unwrap();

        assert_eq!(
            registry.find(ResourceClass::Eeprom, &EntryKey::Id(2)),
            Ok(1)
        );
        assert!(matches!(
            registry.find(ResourceClass::Eeprom, &EntryKey::Id(1)),
            Err(CommandError::UnknownEntry { .. })
        ));
        assert!(matches!(
            registry.find(ResourceClass::Eeprom, &EntryKey::Name("x".into())),
            Err(CommandError::SelectorMismatch { expected: "id", .. })
        ));
        assert!(matches!(
            registry.find(ResourceClass::Apps, &EntryKey::Id(0)),
            Err(CommandError::SelectorMismatch {
                expected: "name",
                ..
            })
        ));
    }

    #[test]
    fn push_rejects_empty_and_wrapping_ranges() {
        let mut registry = Registry::new(ClassStates::default());
        assert_eq!(
            registry.push(ResourceClass::Eeprom, eeprom(0, 0x1000, 0)),
            Err(CommandError::InvalidRange {
                address: 0x1000,
                size: 0
            })
        );
        assert_eq!(
            registry.push(ResourceClass::Eeprom, eeprom(0, u64::MAX - 4, 16)),
            Err(CommandError::InvalidRange {
                address: u64::MAX - 4,
                size: 16
            })
        );
        let empty = Entry::new(
            EntryKey::Id(0),
            Region::from_segments(Vec::new()),
            ChecksumState::Enabled,
        );
        assert!(matches!(
            registry.push(ResourceClass::Memory, empty),
            Err(CommandError::InvalidRange { .. })
        ));
        assert_eq!(registry.entry_count(), 0);
        assert_eq!(
            registry.push(
                ResourceClass::Tables,
                Entry::unloaded("limits".into(), ChecksumState::Enabled)
            ),
            Ok(0)
        );
    }

    #[test]
    fn core_image_holds_one_entry() {
        let mut registry = Registry::new(ClassStates::default());
        registry.push(ResourceClass::OsCore, eeprom(0, 0, 8)).unwrap();
        assert_eq!(
            registry.push(ResourceClass::OsCore, eeprom(1, 8, 8)),
            Err(CommandError::TooManyCoreEntries(ResourceClass::OsCore))
        );
    }

    #[test]
    fn covering_lookup_prefers_lowest_id() {
        let mut registry = Registry::new(ClassStates::default());
        registry.push(ResourceClass::Eeprom, eeprom(0, 0x100, 0x10)).unwrap();
        registry.push(ResourceClass::Eeprom, eeprom(1, 0x108, 0x10)).unwrap();
        let hit = registry
            .entry_covering(ResourceClass::Eeprom, 0x10a)
            .unwrap();
        assert_eq!(hit.key(), &EntryKey::Id(0));
        let hit = registry
            .entry_covering(ResourceClass::Eeprom, 0x110)
            .unwrap();
        assert_eq!(hit.key(), &EntryKey::Id(1));
        assert!(registry
            .entry_covering(ResourceClass::Eeprom, 0x118)
            .is_err());
    }

    #[test]
    fn class_disable_resets_only_that_class() {
        let mut registry = Registry::new(ClassStates::default());
        registry.push(ResourceClass::Eeprom, eeprom(0, 0, 16)).unwrap();
        registry.push(ResourceClass::Memory, eeprom(0, 16, 16)).unwrap();
        for class in [ResourceClass::Eeprom, ResourceClass::Memory] {
            let entry = registry.entry_mut(class, 0).unwrap();
            entry.cursor.byte_offset = 8;
        }
        registry.set_class_state(ResourceClass::Eeprom, ChecksumState::Disabled);
        let eeprom_entry = registry.entry(ResourceClass::Eeprom, 0).unwrap();
        let memory_entry = registry.entry(ResourceClass::Memory, 0).unwrap();
        assert!(eeprom_entry.cursor().at_start());
        assert_eq!(memory_entry.cursor().byte_offset, 8);
        assert_eq!(
            registry.class_states().get(ResourceClass::Eeprom),
            ChecksumState::Disabled
        );
    }
}
