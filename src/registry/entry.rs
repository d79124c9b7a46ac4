// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Checkable entry records, their byte regions and in-flight pass state.
// Author: Lukas Bower

use std::fmt;

use serde::Serialize;

use crate::error::RejectReason;
use crate::memory::MemorySource;
use crate::types::ChecksumState;

/// Identity of an entry within its class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum EntryKey {
    /// Position in the configured list of an id-keyed class.
    Id(u16),
    /// Table or application name.
    Name(String),
}

impl EntryKey {
    /// Numeric ID, if the key is one.
    #[must_use]
    pub fn id(&self) -> Option<u16> {
        match self {
            EntryKey::Id(id) => Some(*id),
            EntryKey::Name(_) => None,
        }
    }

    /// Name, if the key is one.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            EntryKey::Id(_) => None,
            EntryKey::Name(name) => Some(name),
        }
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKey::Id(id) => write!(f, "#{id}"),
            EntryKey::Name(name) => write!(f, "{name:?}"),
        }
    }
}

/// Contiguous address range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Segment {
    /// First address.
    pub address: u64,
    /// Length in bytes.
    pub size: u64,
}

impl Segment {
    /// True when `address` falls in `[address, address + size)`.
    #[must_use]
    pub fn contains(&self, address: u64) -> bool {
        address >= self.address && address - self.address < self.size
    }
}

/// Ordered, possibly disjoint, segments walked as one logical byte stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Region {
    segments: Vec<Segment>,
}

impl Region {
    /// Single contiguous range.
    #[must_use]
    pub fn single(address: u64, size: u64) -> Self {
        Self {
            segments: vec![Segment { address, size }],
        }
    }

    /// Region built from `segments` in order.
    #[must_use]
    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// Segments in walk order.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Total length of all segments.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.segments
            .iter()
            .fold(0u64, |acc, seg| acc.saturating_add(seg.size))
    }

    /// True when the region covers no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when any segment covers `address`.
    #[must_use]
    pub fn contains(&self, address: u64) -> bool {
        self.segments.iter().any(|seg| seg.contains(address))
    }

    /// Address of logical byte `offset` and bytes left in its segment.
    #[must_use]
    pub fn locate(&self, offset: u64) -> Option<(u64, u64)> {
        let mut skipped = 0u64;
        for seg in &self.segments {
            let within = offset - skipped;
            if within < seg.size {
                return Some((seg.address + within, seg.size - within));
            }
            skipped += seg.size;
        }
        None
    }

    /// Check every segment is non-empty and does not wrap the address space.
    pub fn check_shape(&self) -> Result<(), RejectReason> {
        if self.segments.is_empty() {
            return Err(RejectReason::ZeroSize);
        }
        for seg in &self.segments {
            if seg.size == 0 {
                return Err(RejectReason::ZeroSize);
            }
            if seg.address.checked_add(seg.size).is_none() {
                return Err(RejectReason::OutOfRange {
                    address: seg.address,
                    size: seg.size,
                });
            }
        }
        Ok(())
    }

    /// Check the region is well formed and readable from `source`.
    pub fn validate<M: MemorySource + ?Sized>(&self, source: &M) -> Result<(), RejectReason> {
        self.check_shape()?;
        match self
            .segments
            .iter()
            .find(|seg| !source.contains(seg.address, seg.size))
        {
            Some(seg) => Err(RejectReason::OutOfRange {
                address: seg.address,
                size: seg.size,
            }),
            None => Ok(()),
        }
    }
}

/// Progress of the current pass over an entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassCursor {
    /// Bytes folded so far.
    pub byte_offset: u64,
    /// Partial checksum over the folded bytes.
    pub accumulator: u32,
}

impl PassCursor {
    /// Discard progress so the next walk starts a fresh pass.
    pub fn reset(&mut self) {
        *self = PassCursor::default();
    }

    /// True when no bytes of the current pass have been folded.
    #[must_use]
    pub fn at_start(&self) -> bool {
        self.byte_offset == 0
    }
}

/// One checkable object of a resource class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub(crate) key: EntryKey,
    pub(crate) region: Option<Region>,
    pub(crate) state: ChecksumState,
    pub(crate) cursor: PassCursor,
    pub(crate) computed: Option<u32>,
    pub(crate) baseline: Option<u32>,
}

impl Entry {
    /// Loaded entry covering `region`.
    #[must_use]
    pub fn new(key: EntryKey, region: Region, state: ChecksumState) -> Self {
        Self {
            key,
            region: Some(region),
            state,
            cursor: PassCursor::default(),
            computed: None,
            baseline: None,
        }
    }

    /// Named image that is registered but not loaded yet.
    #[must_use]
    pub fn unloaded(name: String, state: ChecksumState) -> Self {
        Self {
            key: EntryKey::Name(name),
            region: None,
            state,
            cursor: PassCursor::default(),
            computed: None,
            baseline: None,
        }
    }

    /// Identity within the class.
    #[must_use]
    pub fn key(&self) -> &EntryKey {
        &self.key
    }

    /// Region walked by the sweep, absent while unloaded.
    #[must_use]
    pub fn region(&self) -> Option<&Region> {
        self.region.as_ref()
    }

    /// Entry enable flag.
    #[must_use]
    pub fn state(&self) -> ChecksumState {
        self.state
    }

    /// Progress of the in-flight pass.
    #[must_use]
    pub fn cursor(&self) -> PassCursor {
        self.cursor
    }

    /// Last baseline, unset until a pass or recompute completes.
    #[must_use]
    pub fn baseline(&self) -> Option<u32> {
        self.baseline
    }

    /// Checksum produced by the most recent completed pass.
    #[must_use]
    pub fn computed(&self) -> Option<u32> {
        self.computed
    }

    /// True when the entry has a region to walk.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.region.is_some()
    }

    /// Size of the region, zero when unloaded.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.region.as_ref().map_or(0, Region::len)
    }

    /// Eligible for the routine sweep.
    #[must_use]
    pub fn is_sweepable(&self) -> bool {
        self.state.is_enabled() && self.is_loaded()
    }

    /// True when any segment covers `address`.
    #[must_use]
    pub fn covers(&self, address: u64) -> bool {
        self.region
            .as_ref()
            .is_some_and(|region| region.contains(address))
    }

    /// Install a new image and forget everything learned about the old one.
    pub(crate) fn replace_region(&mut self, region: Option<Region>) {
        self.region = region;
        self.cursor.reset();
        self.computed = None;
        self.baseline = None;
    }
}
