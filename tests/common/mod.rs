// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Shared fixtures for checksum monitor integration tests.
// Author: Lukas Bower
#![allow(dead_code)]

use csmon::persist::{NoPersist, StatePersistence};
use csmon::{ChecksumMonitor, Crc32c, ChecksumPrimitive, MemoryImage, MonitorConfig};

pub const IMAGE_BASE: u64 = 0x1000;
pub const IMAGE_LEN: usize = 0x4000;

/// Deterministic, non-repeating-per-entry image contents.
pub fn image() -> MemoryImage {
    let bytes = (0..IMAGE_LEN)
        .map(|i| (i.wrapping_mul(31) ^ (i >> 7)) as u8)
        .collect();
    MemoryImage::new(IMAGE_BASE, bytes)
}

/// CRC of `[address, address + size)` computed in one go.
pub fn crc_of(image: &MemoryImage, address: u64, size: usize) -> u32 {
    use csmon::MemorySource;
    let mut buf = vec![0u8; size];
    image.read(address, &mut buf).expect("range inside image");
    Crc32c.checksum(&buf)
}

pub fn config(toml: &str) -> MonitorConfig {
    MonitorConfig::from_toml_str(toml).expect("valid test config")
}

pub fn monitor(toml: &str) -> ChecksumMonitor<MemoryImage> {
    monitor_with(toml, Box::new(NoPersist))
}

pub fn monitor_with(
    toml: &str,
    persistence: Box<dyn StatePersistence>,
) -> ChecksumMonitor<MemoryImage> {
    ChecksumMonitor::from_config(&config(toml), image(), persistence)
}
