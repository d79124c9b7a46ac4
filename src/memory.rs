// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Address-space access used by the walker to read checksummed bytes.
// Author: Lukas Bower

//! Memory sources the monitor reads from.

use thiserror::Error;

/// Failure reading bytes from a [`MemorySource`].
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("read fault at {address:#x} ({len} bytes)")]
pub struct ReadFault {
    /// First address of the failed read.
    pub address: u64,
    /// Number of bytes requested.
    pub len: usize,
}

/// Byte-addressable view of the monitored address space.
pub trait MemorySource {
    /// Fill `buf` with the bytes starting at `address`.
    fn read(&self, address: u64, buf: &mut [u8]) -> Result<(), ReadFault>;

    /// True when `[address, address + len)` is readable.
    fn contains(&self, address: u64, len: u64) -> bool;
}

impl<M: MemorySource + ?Sized> MemorySource for &M {
    fn read(&self, address: u64, buf: &mut [u8]) -> Result<(), ReadFault> {
        (**self).read(address, buf)
    }

    fn contains(&self, address: u64, len: u64) -> bool {
        (**self).contains(address, len)
    }
}

/// Contiguous byte image mapped at `base`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryImage {
    base: u64,
    bytes: Vec<u8>,
}

impl MemoryImage {
    /// Map `bytes` at `base`.
    #[must_use]
    pub fn new(base: u64, bytes: Vec<u8>) -> Self {
        Self { base, bytes }
    }

    /// First mapped address.
    #[must_use]
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Number of mapped bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when no bytes are mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Overwrite the byte at `address`. Returns false when it is unmapped.
    pub fn poke(&mut self, address: u64, value: u8) -> bool {
        match self.offset_of(address, 1) {
            Some(offset) => {
                self.bytes[offset] = value;
                true
            }
            None => false,
        }
    }

    fn offset_of(&self, address: u64, len: u64) -> Option<usize> {
        let start = address.checked_sub(self.base)?;
        let end = start.checked_add(len)?;
        if end > self.bytes.len() as u64 {
            return None;
        }
        usize::try_from(start).ok()
    }
}

impl MemorySource for MemoryImage {
    fn read(&self, address: u64, buf: &mut [u8]) -> Result<(), ReadFault> {
        let fault = ReadFault {
            address,
            len: buf.len(),
        };
        let offset = self.offset_of(address, buf.len() as u64).ok_or(fault)?;
        buf.copy_from_slice(&self.bytes[offset..offset + buf.len()]);
        Ok(())
    }

    fn contains(&self, address: u64, len: u64) -> bool {
        self.offset_of(address, len).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_inside_image() {
        let image = MemoryImage::new(0x1000, (0..16).collect());
        let mut buf = [0u8; 4];
        image.read(0x1004, &mut buf).unwrap();
        assert_eq!(buf, [4, 5, 6, 7]);
        assert!(image.contains(0x1000, 16));
        assert!(!image.contains(0x1000, 17));
    }

    #[test]
    fn out_of_range_reads_fault() {
        let image = MemoryImage::new(0x1000, vec![0; 8]);
        let mut buf = [0u8; 4];
        assert_eq!(
            image.read(0x0fff, &mut buf),
            Err(ReadFault {
                address: 0x0fff,
                len: 4
            })
        );
        assert!(image.read(0x1006, &mut buf).is_err());
        assert!(!image.contains(u64::MAX, 2));
    }

    #[test]
    fn poke_changes_one_byte() {
        let mut image = MemoryImage::new(0, vec![0; 4]);
        assert!(image.poke(2, 0xAA));
        assert!(!image.poke(4, 0xAA));
        let mut buf = [0u8; 4];
        image.read(0, &mut buf).unwrap();
        assert_eq!(buf, [0, 0, 0xAA, 0]);
    }
}
