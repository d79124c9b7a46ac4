// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: TOML configuration for the monitor and validation of its entry tables.
// Author: Lukas Bower

//! Monitor configuration.
//!
//! ```toml
//! max_bytes_per_cycle = 16384
//!
//! [persistence]
//! dir = "/var/lib/csmon"
//!
//! [eeprom]
//! entries = [{ address = 0x1000, size = 0x400 }]
//!
//! [memory]
//! entries = [{ segments = [{ address = 0x0, size = 0x100 }, { address = 0x800, size = 0x80 }] }]
//!
//! [tables]
//! state = "disabled"
//! entries = [{ name = "sched", address = 0x2000, size = 0x40 }, { name = "limits" }]
//! ```
//!
//! Invalid entries are rejected individually and reported; the rest of the
//! configuration still loads.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;

use crate::error::{ConfigError, EntryRejection, RejectReason};
use crate::events::DEFAULT_EVENT_CAPACITY;
use crate::memory::MemorySource;
use crate::registry::{Entry, EntryKey, Region, Registry, Segment};
use crate::types::{ChecksumState, ClassStates, ResourceClass};

/// Default routine budget in bytes per tick.
pub const DEFAULT_MAX_BYTES_PER_CYCLE: u32 = 16384;

fn default_max_bytes() -> u32 {
    DEFAULT_MAX_BYTES_PER_CYCLE
}

fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

fn default_true() -> bool {
    true
}

/// One configured segment of a memory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SegmentConfig {
    /// First address of the segment.
    pub address: u64,
    /// Segment length in bytes.
    pub size: u64,
}

/// One configured entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntryConfig {
    /// Image name; required for tables and applications, refused elsewhere.
    #[serde(default)]
    pub name: Option<String>,
    /// First address of a single-range entry.
    #[serde(default)]
    pub address: Option<u64>,
    /// Length of a single-range entry.
    #[serde(default)]
    pub size: Option<u64>,
    /// Disjoint segments of a memory entry, walked in order.
    #[serde(default)]
    pub segments: Vec<SegmentConfig>,
    /// Initial entry flag.
    #[serde(default)]
    pub state: ChecksumState,
}

impl EntryConfig {
    /// Single-range entry keyed by position.
    #[must_use]
    pub fn range(address: u64, size: u64) -> Self {
        Self {
            address: Some(address),
            size: Some(size),
            ..Self::default()
        }
    }

    /// Named single-range entry for tables and applications.
    #[must_use]
    pub fn named(name: &str, address: u64, size: u64) -> Self {
        Self {
            name: Some(name.to_owned()),
            ..Self::range(address, size)
        }
    }
}

/// Default flag and entry list of one class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassConfig {
    /// Class flag used when no persisted record exists.
    #[serde(default)]
    pub state: ChecksumState,
    /// Entries in ID order.
    #[serde(default)]
    pub entries: Vec<EntryConfig>,
}

/// Persistence settings, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PersistenceConfig {
    /// Restore and save class flags through the record store.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Directory of the record store. Persistence is off when absent.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
        }
    }
}

impl PersistenceConfig {
    /// Store directory when persistence is enabled and configured.
    #[must_use]
    pub fn active_dir(&self) -> Option<&Path> {
        if self.enabled {
            self.dir.as_deref()
        } else {
            None
        }
    }
}

/// Full monitor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorConfig {
    /// Upper bound on bytes folded by one tick.
    #[serde(default = "default_max_bytes")]
    pub max_bytes_per_cycle: u32,
    /// Events retained before the oldest is dropped.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    /// Class flag persistence.
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// EEPROM ranges.
    #[serde(default)]
    pub eeprom: ClassConfig,
    /// RAM regions, optionally segmented.
    #[serde(default)]
    pub memory: ClassConfig,
    /// Named table images.
    #[serde(default)]
    pub tables: ClassConfig,
    /// Named application images.
    #[serde(default)]
    pub apps: ClassConfig,
    /// OS core image.
    #[serde(default)]
    pub os_core: ClassConfig,
    /// Executive core image.
    #[serde(default)]
    pub cfe_core: ClassConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_bytes_per_cycle: DEFAULT_MAX_BYTES_PER_CYCLE,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            persistence: PersistenceConfig::default(),
            eeprom: ClassConfig::default(),
            memory: ClassConfig::default(),
            tables: ClassConfig::default(),
            apps: ClassConfig::default(),
            os_core: ClassConfig::default(),
            cfe_core: ClassConfig::default(),
        }
    }
}

/// Registry built from a configuration plus the entries it left out.
#[derive(Debug, Clone)]
pub struct RegistryBuild {
    /// Registry holding every accepted entry.
    pub registry: Registry,
    /// Entries rejected during validation.
    pub rejections: Vec<EntryRejection>,
}

impl MonitorConfig {
    /// Load and parse a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        debug!("loaded monitor config from {}", path.display());
        Ok(config)
    }

    /// Parse TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: MonitorConfig = toml::from_str(text)?;
        if config.max_bytes_per_cycle == 0 {
            return Err(ConfigError::ZeroBudget);
        }
        Ok(config)
    }

    /// Configuration of `class`.
    #[must_use]
    pub fn class(&self, class: ResourceClass) -> &ClassConfig {
        match class {
            ResourceClass::Eeprom => &self.eeprom,
            ResourceClass::Memory => &self.memory,
            ResourceClass::Tables => &self.tables,
            ResourceClass::Apps => &self.apps,
            ResourceClass::OsCore => &self.os_core,
            ResourceClass::CfeCore => &self.cfe_core,
        }
    }

    /// Configured default flag of every class.
    #[must_use]
    pub fn default_states(&self) -> ClassStates {
        let mut states = ClassStates::default();
        for class in ResourceClass::SWEEP_ORDER {
            states.set(class, self.class(class).state);
        }
        states
    }

    /// Validate every entry against `source` and build the registry.
    pub fn build_registry<M: MemorySource + ?Sized>(&self, source: &M) -> RegistryBuild {
        let mut registry = Registry::new(self.default_states());
        let mut rejections = Vec::new();
        for class in ResourceClass::SWEEP_ORDER {
            let (entries, mut rejected) = build_class(class, &self.class(class).entries, source);
            registry.replace_entries(class, entries);
            rejections.append(&mut rejected);
        }
        RegistryBuild {
            registry,
            rejections,
        }
    }
}

/// Validate the configured entries of one class.
pub fn build_class<M: MemorySource + ?Sized>(
    class: ResourceClass,
    configs: &[EntryConfig],
    source: &M,
) -> (Vec<Entry>, Vec<EntryRejection>) {
    let mut entries: Vec<Entry> = Vec::with_capacity(configs.len());
    let mut rejections = Vec::new();
    let mut names = HashSet::new();
    for (position, config) in configs.iter().enumerate() {
        let outcome = build_entry(class, position, config, source).and_then(|entry| {
            if class.is_core_image() && !entries.is_empty() {
                return Err(RejectReason::TooManyCoreEntries);
            }
            if let EntryKey::Name(name) = &entry.key {
                if !names.insert(name.clone()) {
                    return Err(RejectReason::DuplicateName(name.clone()));
                }
            }
            Ok(entry)
        });
        match outcome {
            Ok(entry) => entries.push(entry),
            Err(reason) => rejections.push(EntryRejection {
                class,
                position,
                reason,
            }),
        }
    }
    (entries, rejections)
}

fn build_entry<M: MemorySource + ?Sized>(
    class: ResourceClass,
    position: usize,
    config: &EntryConfig,
    source: &M,
) -> Result<Entry, RejectReason> {
    let key = if class.keyed_by_name() {
        match config.name.as_deref() {
            Some(name) if !name.is_empty() => EntryKey::Name(name.to_owned()),
            _ => return Err(RejectReason::MissingName),
        }
    } else {
        if config.name.is_some() {
            return Err(RejectReason::NameNotAllowed);
        }
        EntryKey::Id(u16::try_from(position).map_err(|_| RejectReason::TooManyEntries)?)
    };

    if !config.segments.is_empty() {
        if !class.allows_segments() {
            return Err(RejectReason::SegmentsNotAllowed);
        }
        if config.address.is_some() || config.size.is_some() {
            return Err(RejectReason::ConflictingRange);
        }
        let region = Region::from_segments(
            config
                .segments
                .iter()
                .map(|seg| Segment {
                    address: seg.address,
                    size: seg.size,
                })
                .collect(),
        );
        region.validate(source)?;
        return Ok(Entry::new(key, region, config.state));
    }

    match (config.address, config.size, key) {
        (Some(address), Some(size), key) => {
            let region = Region::single(address, size);
            region.validate(source)?;
            Ok(Entry::new(key, region, config.state))
        }
        (None, None, EntryKey::Name(name)) => Ok(Entry::unloaded(name, config.state)),
        _ => Err(RejectReason::MissingRange),
    }
}
