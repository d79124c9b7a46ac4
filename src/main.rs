// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: CLI host that drives the checksum monitor over a memory image file.
// Author: Lukas Bower
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! CLI host for the checksum monitor.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use csmon::persist::{CdsBridge, NoPersist, StatePersistence};
use csmon::{ChecksumMonitor, MemoryImage, MonitorConfig};
use csmon_store::FileStore;
use env_logger::Env;
use log::{info, LevelFilter};

/// Checksum monitor command-line arguments.
#[derive(Debug, Parser)]
#[command(author = "Lukas Bower", version, about = "Background checksum monitor", long_about = None)]
struct Cli {
    /// Monitor configuration (TOML).
    #[arg(long, value_name = "FILE")]
    config: PathBuf,

    /// Raw memory image to monitor.
    #[arg(long, value_name = "FILE")]
    image: PathBuf,

    /// Address the first image byte is mapped at (decimal or 0x-prefixed hex).
    #[arg(long, default_value = "0", value_parser = parse_address)]
    base: u64,

    /// Number of ticks to run.
    #[arg(long, default_value_t = 1000)]
    cycles: u64,

    /// Enable debug logging.
    #[arg(short = 'v', long, default_value_t = false)]
    verbose: bool,
}

fn parse_address(text: &str) -> Result<u64, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|err| format!("invalid address {text:?}: {err}"))
}

fn init_logging(verbose: bool) {
    let default_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let mut builder =
        env_logger::Builder::from_env(Env::default().default_filter_or(default_level.as_str()));
    builder.format_timestamp_millis();
    let _ = builder.try_init();
}

fn persistence(config: &MonitorConfig) -> Result<Box<dyn StatePersistence>> {
    match config.persistence.active_dir() {
        Some(dir) => {
            let store = FileStore::open(dir)
                .with_context(|| format!("failed to open state store {}", dir.display()))?;
            Ok(Box::new(CdsBridge::new(store)))
        }
        None => Ok(Box::new(NoPersist)),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = MonitorConfig::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    let bytes = fs::read(&cli.image)
        .with_context(|| format!("failed to read image {}", cli.image.display()))?;
    let image = MemoryImage::new(cli.base, bytes);
    let mut monitor = ChecksumMonitor::from_config(&config, image, persistence(&config)?);

    let mut processed = 0u64;
    for _ in 0..cli.cycles {
        processed += monitor.tick().bytes_processed;
        for event in monitor.drain_events() {
            println!("{}", serde_json::to_string(&event)?);
        }
    }
    info!("{} ticks, {processed} bytes checksummed", cli.cycles);
    println!("{}", monitor.housekeeping().to_json()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_accept_hex_and_decimal() {
        assert_eq!(parse_address("0x1000"), Ok(0x1000));
        assert_eq!(parse_address("4096"), Ok(4096));
        assert!(parse_address("0xzz").is_err());
    }
}
