// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Log levels used for monitoring events, rejections and degraded persistence.
// Author: Lukas Bower

mod common;

use std::sync::Mutex;

use common::{monitor, monitor_with, IMAGE_BASE};
use csmon::persist::{CdsBridge, CLASS_STATES_KEY};
use csmon::{Command, EntryRef, MemorySource, ResourceClass};
use csmon_store::MemoryStore;
use log::{Level, LevelFilter, Log, Metadata, Record};
use serial_test::serial;

struct Capture;

static RECORDS: Mutex<Vec<(Level, String)>> = Mutex::new(Vec::new());
static LOGGER: Capture = Capture;

impl Log for Capture {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        if let Ok(mut records) = RECORDS.lock() {
            records.push((record.level(), record.args().to_string()));
        }
    }

    fn flush(&self) {}
}

fn install() {
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(LevelFilter::Trace);
    RECORDS.lock().unwrap().clear();
}

fn logged_at(level: Level, needle: &str) -> bool {
    RECORDS
        .lock()
        .unwrap()
        .iter()
        .any(|(lvl, msg)| *lvl == level && msg.contains(needle))
}

const ONE_ENTRY: &str = r#"
max_bytes_per_cycle = 1024

[eeprom]
entries = [{ address = 0x1000, size = 64 }]
"#;

#[test]
#[serial]
fn mismatch_is_logged_as_error() {
    install();
    let mut monitor = monitor(ONE_ENTRY);
    monitor.tick();
    assert!(logged_at(Level::Debug, "baseline established"));

    let mut byte = [0u8; 1];
    monitor.source().read(IMAGE_BASE, &mut byte).unwrap();
    monitor.source_mut().poke(IMAGE_BASE, !byte[0]);
    monitor.tick();
    assert!(logged_at(Level::Error, "checksum mismatch"));
}

#[test]
#[serial]
fn rejected_command_is_logged_with_code() {
    install();
    let mut monitor = monitor(ONE_ENTRY);
    let _ = monitor.handle(Command::EnableEntry(EntryRef::id(ResourceClass::Eeprom, 4)));
    assert!(logged_at(Level::Warn, "NOT_FOUND"));
}

#[test]
#[serial]
fn corrupt_record_is_logged_as_warning() {
    install();
    let store = MemoryStore::new();
    store.seed(CLASS_STATES_KEY, &[9, 9, 9, 9, 9, 9]);
    let monitor = monitor_with(ONE_ENTRY, Box::new(CdsBridge::new(store)));
    assert!(!monitor.housekeeping().persistence_active);
    assert!(logged_at(Level::Warn, "using defaults"));
}

#[test]
#[serial]
fn rejected_config_entry_is_logged() {
    install();
    let monitor = monitor(
        r#"
[eeprom]
entries = [{ address = 0x1000, size = 0 }]
"#,
    );
    assert!(monitor.registry().class(ResourceClass::Eeprom).is_empty());
    assert!(logged_at(Level::Warn, "zero-sized range"));
}
