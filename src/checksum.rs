// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Pluggable incremental checksum primitive with a CRC-32C default.
// Author: Lukas Bower

//! Incremental checksum primitive.
//!
//! The monitor only schedules checksum work; the arithmetic lives behind
//! [`ChecksumPrimitive`]. A pass starts from [`ChecksumPrimitive::seed`] and
//! folds each chunk with [`ChecksumPrimitive::update`]. Folding a byte stream
//! in arbitrary chunk sizes must yield the same value as folding it at once.

/// Stateless incremental checksum function.
pub trait ChecksumPrimitive {
    /// Accumulator value at the start of a pass.
    fn seed(&self) -> u32;

    /// Fold `data` into `accumulator` and return the new accumulator.
    fn update(&self, accumulator: u32, data: &[u8]) -> u32;

    /// Checksum of a complete buffer.
    fn checksum(&self, data: &[u8]) -> u32 {
        self.update(self.seed(), data)
    }
}

impl<P: ChecksumPrimitive + ?Sized> ChecksumPrimitive for Box<P> {
    fn seed(&self) -> u32 {
        (**self).seed()
    }

    fn update(&self, accumulator: u32, data: &[u8]) -> u32 {
        (**self).update(accumulator, data)
    }
}

/// CRC-32C (Castagnoli) folded with `crc32c_append`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Crc32c;

impl ChecksumPrimitive for Crc32c {
    fn seed(&self) -> u32 {
        0
    }

    fn update(&self, accumulator: u32, data: &[u8]) -> u32 {
        crc32c::crc32c_append(accumulator, data)
    }
}
