// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Library root for the bounded-work background checksum monitor.
// Author: Lukas Bower
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Background checksum monitor.
//!
//! The monitor keeps CRC baselines for EEPROM ranges, RAM regions, table
//! and application images and the core images, and re-verifies them in a
//! round-robin sweep. The host calls [`ChecksumMonitor::tick`] once per
//! period; each call folds at most `max_bytes_per_cycle` bytes, so passes
//! over large regions are spread across many ticks. Commands arrive between
//! ticks through [`ChecksumMonitor::handle`]. Class enable flags survive
//! resets through a [`persist::StatePersistence`] implementation.

pub mod checksum;
pub mod command;
pub mod config;
pub mod error;
pub mod events;
pub mod housekeeping;
pub mod memory;
pub mod persist;
pub mod registry;
pub mod scheduler;
pub mod special;
pub mod types;
pub mod walker;

pub use checksum::{ChecksumPrimitive, Crc32c};
pub use command::{BaselineReport, Command, CommandReply, EntryRef, Target};
pub use config::{EntryConfig, MonitorConfig};
pub use error::{CommandError, ConfigError, EntryRejection, ResultCode};
pub use events::MonitorEvent;
pub use housekeeping::HousekeepingSnapshot;
pub use memory::{MemoryImage, MemorySource, ReadFault};
pub use persist::{CdsBridge, NoPersist, StatePersistence};
pub use registry::{Entry, EntryKey, Region, Registry, Segment};
pub use scheduler::{ChecksumMonitor, MonitorOptions, TickActivity, TickOutcome};
pub use types::{ChecksumState, ClassStates, ResourceClass};
