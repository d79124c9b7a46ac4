// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Typed command router for the checksum monitor.
// Author: Lukas Bower

//! Command router.
//!
//! Every inbound request is a [`Command`] variant handled by
//! [`ChecksumMonitor::handle`]. Each outcome bumps exactly one of the
//! accepted/rejected counters, except `ResetCounters`, which clears them.

use std::fmt;

use log::{info, warn};
use serde::Serialize;

use crate::checksum::ChecksumPrimitive;
use crate::error::CommandError;
use crate::memory::MemorySource;
use crate::registry::{EntryKey, Region};
use crate::scheduler::ChecksumMonitor;
use crate::special::OneShotJob;
use crate::types::{ChecksumState, ResourceClass};

/// Reference to one entry of a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRef {
    /// Class holding the entry.
    pub class: ResourceClass,
    /// Numeric ID or name, depending on the class.
    pub key: EntryKey,
}

impl EntryRef {
    /// Entry of an id-keyed class.
    #[must_use]
    pub fn id(class: ResourceClass, id: u16) -> Self {
        Self {
            class,
            key: EntryKey::Id(id),
        }
    }

    /// Entry of a name-keyed class.
    #[must_use]
    pub fn name(class: ResourceClass, name: &str) -> Self {
        Self {
            class,
            key: EntryKey::Name(name.to_owned()),
        }
    }
}

/// Object of a recompute or report request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Every entry of a class.
    Class(ResourceClass),
    /// One entry.
    Entry(EntryRef),
}

/// Inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Do nothing; counted as accepted.
    NoOp,
    /// Zero the housekeeping counters.
    ResetCounters,
    /// Open the master sweep gate.
    EnableAll,
    /// Close the master sweep gate.
    DisableAll,
    /// Enable a class and persist the class flags.
    EnableClass(ResourceClass),
    /// Disable a class, drop its in-flight passes and persist the class flags.
    DisableClass(ResourceClass),
    /// Enable one entry; it resumes from its frozen offset.
    EnableEntry(EntryRef),
    /// Disable one entry, freezing its offset.
    DisableEntry(EntryRef),
    /// Re-establish baselines.
    RecomputeBaseline(Target),
    /// Read baselines without side effects.
    ReportBaseline(Target),
    /// Checksum an arbitrary range once.
    OneShot {
        /// First address.
        address: u64,
        /// Length in bytes.
        size: u64,
        /// Per-tick budget override; `None` or zero uses the monitor's.
        max_bytes_per_cycle: Option<u32>,
    },
    /// Discard the in-flight one-shot, if any.
    CancelOneShot,
    /// Find the entry of `class` covering `address`.
    GetEntryId {
        /// Class searched.
        class: ResourceClass,
        /// Address to look up.
        address: u64,
    },
}

impl Command {
    /// Short name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Command::NoOp => "noop",
            Command::ResetCounters => "reset-counters",
            Command::EnableAll => "enable-all",
            Command::DisableAll => "disable-all",
            Command::EnableClass(_) => "enable-class",
            Command::DisableClass(_) => "disable-class",
            Command::EnableEntry(_) => "enable-entry",
            Command::DisableEntry(_) => "disable-entry",
            Command::RecomputeBaseline(_) => "recompute-baseline",
            Command::ReportBaseline(_) => "report-baseline",
            Command::OneShot { .. } => "one-shot",
            Command::CancelOneShot => "cancel-one-shot",
            Command::GetEntryId { .. } => "get-entry-id",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Baseline of one entry as reported outward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BaselineReport {
    /// Entry class.
    pub class: ResourceClass,
    /// Entry key.
    pub key: EntryKey,
    /// Stored baseline, `None` until computed.
    pub baseline: Option<u32>,
}

impl BaselineReport {
    /// True once a baseline has been computed.
    #[must_use]
    pub fn computed_yet(&self) -> bool {
        self.baseline.is_some()
    }
}

/// Successful command result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandReply {
    /// Accepted with nothing to report.
    Ack,
    /// Baselines in entry order.
    Baselines(Vec<BaselineReport>),
    /// Entry covering the requested address.
    EntryId(EntryKey),
}

impl<M: MemorySource, P: ChecksumPrimitive> ChecksumMonitor<M, P> {
    /// Dispatch `command` and update the command counters.
    pub fn handle(&mut self, command: Command) -> Result<CommandReply, CommandError> {
        let name = command.name();
        let counted = command != Command::ResetCounters;
        let result = self.dispatch(command);
        if counted {
            self.counters.record_outcome(result.is_ok());
        }
        if let Err(err) = &result {
            warn!("{name} rejected ({}): {err}", err.code());
        }
        result
    }

    fn dispatch(&mut self, command: Command) -> Result<CommandReply, CommandError> {
        match command {
            Command::NoOp => {
                info!("no-op received");
                Ok(CommandReply::Ack)
            }
            Command::ResetCounters => {
                self.counters.reset();
                info!("housekeeping counters reset");
                Ok(CommandReply::Ack)
            }
            Command::EnableAll => self.set_master(ChecksumState::Enabled),
            Command::DisableAll => self.set_master(ChecksumState::Disabled),
            Command::EnableClass(class) => self.change_class(class, ChecksumState::Enabled),
            Command::DisableClass(class) => self.change_class(class, ChecksumState::Disabled),
            Command::EnableEntry(entry) => self.change_entry(&entry, ChecksumState::Enabled),
            Command::DisableEntry(entry) => self.change_entry(&entry, ChecksumState::Disabled),
            Command::RecomputeBaseline(target) => self.recompute(target),
            Command::ReportBaseline(target) => self.report(&target),
            Command::OneShot {
                address,
                size,
                max_bytes_per_cycle,
            } => self.one_shot(address, size, max_bytes_per_cycle),
            Command::CancelOneShot => {
                if !self.cancel_one_shot() {
                    info!("cancel requested with no one-shot in flight");
                }
                Ok(CommandReply::Ack)
            }
            Command::GetEntryId { class, address } => {
                let entry = self.registry.entry_covering(class, address)?;
                Ok(CommandReply::EntryId(entry.key().clone()))
            }
        }
    }

    fn set_master(&mut self, state: ChecksumState) -> Result<CommandReply, CommandError> {
        self.master = state;
        info!("background checksumming {state}");
        Ok(CommandReply::Ack)
    }

    fn change_class(
        &mut self,
        class: ResourceClass,
        state: ChecksumState,
    ) -> Result<CommandReply, CommandError> {
        self.ensure_idle()?;
        self.set_class_state(class, state);
        Ok(CommandReply::Ack)
    }

    fn change_entry(
        &mut self,
        target: &EntryRef,
        state: ChecksumState,
    ) -> Result<CommandReply, CommandError> {
        self.ensure_idle()?;
        let index = self.registry.find(target.class, &target.key)?;
        if let Some(entry) = self.registry.entry_mut(target.class, index) {
            entry.state = state;
            info!(
                "{} {} checksumming {state} at offset {}",
                target.class, target.key, entry.cursor.byte_offset
            );
        }
        Ok(CommandReply::Ack)
    }

    fn recompute(&mut self, target: Target) -> Result<CommandReply, CommandError> {
        self.ensure_idle()?;
        let (class, indices) = match target {
            Target::Entry(entry_ref) => {
                let index = self.registry.find(entry_ref.class, &entry_ref.key)?;
                let loaded = self
                    .registry
                    .entry(entry_ref.class, index)
                    .is_some_and(|entry| entry.is_loaded());
                if !loaded {
                    return Err(CommandError::ImageUnloaded {
                        class: entry_ref.class,
                        name: entry_ref.key.name().unwrap_or_default().to_owned(),
                    });
                }
                (entry_ref.class, vec![index])
            }
            Target::Class(class) => {
                let indices: Vec<usize> = self
                    .registry
                    .class(class)
                    .entries()
                    .iter()
                    .enumerate()
                    .filter(|(_, entry)| entry.is_loaded())
                    .map(|(index, _)| index)
                    .collect();
                if indices.is_empty() {
                    return Err(CommandError::EmptyClass(class));
                }
                (class, indices)
            }
        };
        self.start_recompute(class, indices);
        Ok(CommandReply::Ack)
    }

    fn report(&self, target: &Target) -> Result<CommandReply, CommandError> {
        let reports = match target {
            Target::Entry(entry_ref) => {
                let index = self.registry.find(entry_ref.class, &entry_ref.key)?;
                self.registry
                    .entry(entry_ref.class, index)
                    .map(|entry| BaselineReport {
                        class: entry_ref.class,
                        key: entry.key().clone(),
                        baseline: entry.baseline(),
                    })
                    .into_iter()
                    .collect()
            }
            Target::Class(class) => {
                let table = self.registry.class(*class);
                if table.is_empty() {
                    return Err(CommandError::EmptyClass(*class));
                }
                table
                    .entries()
                    .iter()
                    .map(|entry| BaselineReport {
                        class: *class,
                        key: entry.key().clone(),
                        baseline: entry.baseline(),
                    })
                    .collect()
            }
        };
        Ok(CommandReply::Baselines(reports))
    }

    fn one_shot(
        &mut self,
        address: u64,
        size: u64,
        max_bytes_per_cycle: Option<u32>,
    ) -> Result<CommandReply, CommandError> {
        self.ensure_idle()?;
        if Region::single(address, size).validate(&self.source).is_err() {
            return Err(CommandError::InvalidRange { address, size });
        }
        self.start_one_shot(OneShotJob::new(address, size, max_bytes_per_cycle));
        Ok(CommandReply::Ack)
    }
}
