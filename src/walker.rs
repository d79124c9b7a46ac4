// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Budget-bounded incremental walk over an entry's byte region.
// Author: Lukas Bower

//! Segment walker.
//!
//! [`SegmentWalker::advance`] folds at most `budget` bytes of a region into
//! a [`PassCursor`], starting where the previous call stopped. Multi-segment
//! regions are treated as one byte stream: when a segment runs out the walk
//! continues in the next one with the remaining budget. Reads go through a
//! fixed scratch buffer so a large budget never allocates.

use log::trace;

use crate::checksum::ChecksumPrimitive;
use crate::memory::{MemorySource, ReadFault};
use crate::registry::{PassCursor, Region};

/// Largest single read issued to a memory source.
pub const SCRATCH_LEN: usize = 4096;

/// Result of one [`SegmentWalker::advance`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkStep {
    /// Bytes folded by this call.
    pub consumed: u64,
    /// The cursor now covers the whole region.
    pub complete: bool,
}

/// Reusable walker owning the read scratch buffer.
#[derive(Debug)]
pub struct SegmentWalker {
    scratch: Vec<u8>,
}

impl Default for SegmentWalker {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentWalker {
    /// Walker with a [`SCRATCH_LEN`] scratch buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::with_scratch(SCRATCH_LEN)
    }

    /// Walker reading at most `len` bytes per source access.
    #[must_use]
    pub fn with_scratch(len: usize) -> Self {
        Self {
            scratch: vec![0; len.max(1)],
        }
    }

    /// Fold up to `budget` bytes of `region` into `cursor`.
    ///
    /// On a read fault the cursor holds whatever was folded before the
    /// failing read; callers discard it.
    pub fn advance<M, P>(
        &mut self,
        source: &M,
        primitive: &P,
        region: &Region,
        cursor: &mut PassCursor,
        budget: u64,
    ) -> Result<WalkStep, ReadFault>
    where
        M: MemorySource + ?Sized,
        P: ChecksumPrimitive + ?Sized,
    {
        let total = region.len();
        if cursor.at_start() {
            cursor.accumulator = primitive.seed();
        }
        let mut remaining = budget.min(total.saturating_sub(cursor.byte_offset));
        let mut consumed = 0u64;
        while remaining > 0 {
            let Some((address, left_in_segment)) = region.locate(cursor.byte_offset) else {
                break;
            };
            let take = remaining
                .min(left_in_segment)
                .min(self.scratch.len() as u64) as usize;
            let chunk = &mut self.scratch[..take];
            source.read(address, chunk)?;
            cursor.accumulator = primitive.update(cursor.accumulator, chunk);
            cursor.byte_offset += take as u64;
            consumed += take as u64;
            remaining -= take as u64;
        }
        trace!(
            "walked {consumed} bytes, offset {}/{total}",
            cursor.byte_offset
        );
        Ok(WalkStep {
            consumed,
            complete: cursor.byte_offset >= total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::Crc32c;
    use crate::memory::MemoryImage;
    use crate::registry::Segment;

    fn image() -> MemoryImage {
        MemoryImage::new(0, (0..=255u8).cycle().take(1024).collect())
    }

    #[test]
    fn resumes_across_calls_without_loss() {
        let image = image();
        let region = Region::single(0x40, 400);
        let mut walker = SegmentWalker::with_scratch(64);
        let mut cursor = PassCursor::default();
        let mut steps = Vec::new();
        loop {
            let step = walker
                .advance(&image, &Crc32c, &region, &mut cursor, 100)
                .unwrap();
            steps.push(step.consumed);
            if step.complete {
                break;
            }
        }
        assert_eq!(steps, vec![100, 100, 100, 100]);
        let mut whole = vec![0u8; 400];
        image.read(0x40, &mut whole).unwrap();
        assert_eq!(cursor.accumulator, Crc32c.checksum(&whole));
    }

    #[test]
    fn continues_into_next_segment_within_one_budget() {
        let image = image();
        let region = Region::from_segments(vec![
            Segment {
                address: 0x10,
                size: 30,
            },
            Segment {
                address: 0x200,
                size: 50,
            },
        ]);
        let mut walker = SegmentWalker::new();
        let mut cursor = PassCursor::default();
        let first = walker
            .advance(&image, &Crc32c, &region, &mut cursor, 60)
            .unwrap();
        assert_eq!(first.consumed, 60);
        assert!(!first.complete);
        let second = walker
            .advance(&image, &Crc32c, &region, &mut cursor, 60)
            .unwrap();
        assert_eq!(second.consumed, 20);
        assert!(second.complete);

        let mut stream = vec![0u8; 80];
        image.read(0x10, &mut stream[..30]).unwrap();
        image.read(0x200, &mut stream[30..]).unwrap();
        assert_eq!(cursor.accumulator, Crc32c.checksum(&stream));
    }

    #[test]
    fn zero_budget_consumes_nothing() {
        let image = image();
        let region = Region::single(0, 10);
        let mut cursor = PassCursor::default();
        let step = SegmentWalker::new()
            .advance(&image, &Crc32c, &region, &mut cursor, 0)
            .unwrap();
        assert_eq!(
            step,
            WalkStep {
                consumed: 0,
                complete: false
            }
        );
    }

    #[test]
    fn read_fault_propagates() {
        let image = MemoryImage::new(0, vec![0; 16]);
        let region = Region::from_segments(vec![
            Segment {
                address: 0,
                size: 8,
            },
            Segment {
                address: 64,
                size: 8,
            },
        ]);
        let mut cursor = PassCursor::default();
        let err = SegmentWalker::new()
            .advance(&image, &Crc32c, &region, &mut cursor, 16)
            .unwrap_err();
        assert_eq!(err.address, 64);
        assert_eq!(cursor.byte_offset, 8);
    }
}
