// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Monitoring events and the bounded FIFO they are queued in.
// Author: Lukas Bower

//! Monitoring events.
//!
//! Integrity findings and special-operation completions are not command
//! results; they are queued here and drained by whoever forwards telemetry.

use std::collections::VecDeque;

use log::{debug, error, info, warn};
use serde::Serialize;

use crate::registry::EntryKey;
use crate::types::ResourceClass;

/// Default number of events retained before the oldest is dropped.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Something the monitor reports outward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MonitorEvent {
    /// First completed pass set an entry's baseline.
    BaselineEstablished {
        /// Entry class.
        class: ResourceClass,
        /// Entry key.
        key: EntryKey,
        /// New baseline.
        checksum: u32,
    },
    /// Completed pass disagrees with the baseline.
    Mismatch {
        /// Entry class.
        class: ResourceClass,
        /// Entry key.
        key: EntryKey,
        /// Stored baseline, left unchanged.
        expected: u32,
        /// Checksum of the pass that just finished.
        computed: u32,
    },
    /// Recompute stored a new baseline.
    RecomputeComplete {
        /// Entry class.
        class: ResourceClass,
        /// Entry key.
        key: EntryKey,
        /// New baseline.
        checksum: u32,
    },
    /// Recompute aborted on a read fault.
    RecomputeFailed {
        /// Entry class.
        class: ResourceClass,
        /// Entry key.
        key: EntryKey,
        /// Faulting address.
        address: u64,
    },
    /// One-shot finished.
    OneShotComplete {
        /// First address checked.
        address: u64,
        /// Bytes checked.
        size: u64,
        /// Resulting checksum.
        checksum: u32,
    },
    /// One-shot aborted on a read fault.
    OneShotFailed {
        /// Requested start address.
        address: u64,
        /// Requested size.
        size: u64,
        /// Faulting address.
        fault_address: u64,
    },
    /// One-shot discarded by a cancel request.
    OneShotCancelled {
        /// Requested start address.
        address: u64,
        /// Requested size.
        size: u64,
    },
    /// Routine pass aborted on a read fault.
    ReadFault {
        /// Entry class.
        class: ResourceClass,
        /// Entry key.
        key: EntryKey,
        /// Faulting address.
        address: u64,
    },
}

impl MonitorEvent {
    fn log(&self) {
        match self {
            MonitorEvent::BaselineEstablished {
                class,
                key,
                checksum,
            } => debug!("{class} {key}: baseline established {checksum:#010x}"),
            MonitorEvent::Mismatch {
                class,
                key,
                expected,
                computed,
            } => error!(
                "{class} {key}: checksum mismatch, expected {expected:#010x} computed {computed:#010x}"
            ),
            MonitorEvent::RecomputeComplete {
                class,
                key,
                checksum,
            } => info!("{class} {key}: baseline recomputed {checksum:#010x}"),
            MonitorEvent::RecomputeFailed {
                class,
                key,
                address,
            } => warn!("{class} {key}: recompute aborted, read fault at {address:#x}"),
            MonitorEvent::OneShotComplete {
                address,
                size,
                checksum,
            } => info!("one-shot {address:#x}+{size} complete: {checksum:#010x}"),
            MonitorEvent::OneShotFailed {
                address,
                size,
                fault_address,
            } => warn!("one-shot {address:#x}+{size} aborted, read fault at {fault_address:#x}"),
            MonitorEvent::OneShotCancelled { address, size } => {
                info!("one-shot {address:#x}+{size} cancelled")
            }
            MonitorEvent::ReadFault {
                class,
                key,
                address,
            } => warn!("{class} {key}: pass aborted, read fault at {address:#x}"),
        }
    }
}

/// FIFO of undelivered events that drops the oldest when full.
#[derive(Debug, Clone)]
pub struct EventLog {
    events: VecDeque<MonitorEvent>,
    capacity: usize,
    dropped: u64,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventLog {
    /// Log retaining at most `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Log and queue `event`.
    pub fn record(&mut self, event: MonitorEvent) {
        event.log();
        if self.capacity == 0 {
            self.dropped += 1;
            return;
        }
        if self.events.len() >= self.capacity {
            let _ = self.events.pop_front();
            self.dropped += 1;
        }
        self.events.push_back(event);
    }

    /// Remove and return every queued event, oldest first.
    pub fn drain(&mut self) -> Vec<MonitorEvent> {
        self.events.drain(..).collect()
    }

    /// Number of queued events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events discarded because the log was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
