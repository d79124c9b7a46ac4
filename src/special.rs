// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Recompute and one-shot operations that preempt the routine sweep.
// Author: Lukas Bower

//! Special operations.
//!
//! At most one special operation exists at a time. While it does, the
//! routine sweep is paused and every tick services the operation instead.

use std::collections::VecDeque;
use std::fmt;

use serde::Serialize;

use crate::registry::{PassCursor, Region};
use crate::types::ResourceClass;

/// Kind of special operation, used in `BUSY` rejections and housekeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialKind {
    /// Baseline recompute of one entry or a class.
    Recompute,
    /// Ad-hoc checksum of an address range.
    OneShot,
}

impl fmt::Display for SpecialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecialKind::Recompute => f.write_str("recompute"),
            SpecialKind::OneShot => f.write_str("one-shot"),
        }
    }
}

/// Baseline recompute over a queue of entries of one class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecomputeJob {
    class: ResourceClass,
    pending: VecDeque<usize>,
}

impl RecomputeJob {
    /// Job recomputing the entries at `indices` of `class`, in order.
    #[must_use]
    pub fn new(class: ResourceClass, indices: impl IntoIterator<Item = usize>) -> Self {
        Self {
            class,
            pending: indices.into_iter().collect(),
        }
    }

    /// Class being recomputed.
    #[must_use]
    pub fn class(&self) -> ResourceClass {
        self.class
    }

    /// Entry currently being walked.
    #[must_use]
    pub fn current(&self) -> Option<usize> {
        self.pending.front().copied()
    }

    /// Move past the current entry. Returns true when the queue is empty.
    pub fn finish_current(&mut self) -> bool {
        let _ = self.pending.pop_front();
        self.pending.is_empty()
    }
}

/// Ad-hoc checksum of an address range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneShotJob {
    pub(crate) address: u64,
    pub(crate) size: u64,
    pub(crate) region: Region,
    pub(crate) cursor: PassCursor,
    pub(crate) max_bytes_per_cycle: Option<u32>,
}

impl OneShotJob {
    /// One-shot over `[address, address + size)`.
    ///
    /// `max_bytes_per_cycle` of `None` or zero uses the monitor's budget;
    /// a larger override is capped by it.
    #[must_use]
    pub fn new(address: u64, size: u64, max_bytes_per_cycle: Option<u32>) -> Self {
        Self {
            address,
            size,
            region: Region::single(address, size),
            cursor: PassCursor::default(),
            max_bytes_per_cycle: max_bytes_per_cycle.filter(|budget| *budget > 0),
        }
    }

    /// Per-tick budget for this job, never above the monitor's `default_budget`.
    #[must_use]
    pub fn budget(&self, default_budget: u32) -> u32 {
        self.max_bytes_per_cycle
            .map_or(default_budget, |limit| limit.min(default_budget))
    }

    /// Bytes checked so far.
    #[must_use]
    pub fn progress(&self) -> u64 {
        self.cursor.byte_offset
    }
}

/// Result retained from the most recent completed one-shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OneShotResult {
    /// First address checked.
    pub address: u64,
    /// Bytes checked.
    pub size: u64,
    /// Resulting checksum.
    pub checksum: u32,
}

/// The single in-flight special operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialOp {
    /// Baseline recompute.
    Recompute(RecomputeJob),
    /// Ad-hoc range check.
    OneShot(OneShotJob),
}

impl SpecialOp {
    /// Kind of this operation.
    #[must_use]
    pub fn kind(&self) -> SpecialKind {
        match self {
            SpecialOp::Recompute(_) => SpecialKind::Recompute,
            SpecialOp::OneShot(_) => SpecialKind::OneShot,
        }
    }
}
