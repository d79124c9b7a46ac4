// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Housekeeping counters and the serialisable telemetry snapshot.
// Author: Lukas Bower

//! Housekeeping counters and snapshot.

use serde::Serialize;

use crate::special::OneShotResult;
use crate::types::{ChecksumState, ResourceClass, CLASS_COUNT};

/// Counters cleared by `ResetCounters`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    /// Commands that returned OK.
    pub commands_accepted: u32,
    /// Commands that returned an error code.
    pub commands_rejected: u32,
    /// Completed passes that disagreed with their baseline, per class.
    pub mismatches: [u32; CLASS_COUNT],
    /// Times the routine sweep wrapped back to the first class.
    pub passes: u32,
}

impl Counters {
    /// Zero every counter.
    pub fn reset(&mut self) {
        *self = Counters::default();
    }

    /// Mismatch count of `class`.
    #[must_use]
    pub fn mismatches(&self, class: ResourceClass) -> u32 {
        self.mismatches[class.sweep_index()]
    }

    pub(crate) fn record_mismatch(&mut self, class: ResourceClass) {
        let slot = &mut self.mismatches[class.sweep_index()];
        *slot = slot.wrapping_add(1);
    }

    pub(crate) fn record_outcome(&mut self, accepted: bool) {
        if accepted {
            self.commands_accepted = self.commands_accepted.wrapping_add(1);
        } else {
            self.commands_rejected = self.commands_rejected.wrapping_add(1);
        }
    }
}

/// Per-class section of the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassHousekeeping {
    /// Class described.
    pub class: ResourceClass,
    /// Class enable flag.
    pub state: ChecksumState,
    /// Registered entries, loaded or not.
    pub entries: usize,
    /// Mismatches since the last counter reset.
    pub mismatches: u32,
}

/// Point-in-time view of the monitor for telemetry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HousekeepingSnapshot {
    /// Commands that returned OK.
    pub commands_accepted: u32,
    /// Commands that returned an error code.
    pub commands_rejected: u32,
    /// Completed sweeps of all classes.
    pub passes: u32,
    /// Master sweep gate.
    pub master_state: ChecksumState,
    /// Class under the sweep cursor.
    pub current_class: ResourceClass,
    /// Entry index under the sweep cursor.
    pub current_entry: usize,
    /// A recompute is running.
    pub recompute_in_progress: bool,
    /// A one-shot is running.
    pub one_shot_in_progress: bool,
    /// Most recent completed one-shot.
    pub last_one_shot: Option<OneShotResult>,
    /// Routine per-tick byte budget.
    pub max_bytes_per_cycle: u32,
    /// Class flags still reach the store.
    pub persistence_active: bool,
    /// Events lost to a full event log.
    pub events_dropped: u64,
    /// Per-class detail in sweep order.
    pub classes: Vec<ClassHousekeeping>,
}

impl HousekeepingSnapshot {
    /// Render as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
