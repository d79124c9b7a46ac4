// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Routine sweep behaviour: budgets, baselines, mismatches and resumption.
// Author: Lukas Bower

mod common;

use common::{crc_of, monitor, IMAGE_BASE};
use csmon::{
    ChecksumState, Command, CommandReply, EntryKey, EntryRef, MemorySource, MonitorEvent,
    ResourceClass, TickActivity,
};

const TWO_EEPROM: &str = r#"
max_bytes_per_cycle = 100

[eeprom]
entries = [
    { address = 0x1000, size = 400 },
    { address = 0x2000, size = 50 },
]
"#;

fn offset_of(monitor: &csmon::ChecksumMonitor<csmon::MemoryImage>, id: usize) -> u64 {
    monitor
        .registry()
        .entry(ResourceClass::Eeprom, id)
        .expect("entry exists")
        .cursor()
        .byte_offset
}

#[test]
fn four_ticks_complete_a_400_byte_entry() {
    let mut monitor = monitor(TWO_EEPROM);
    let expected = crc_of(monitor.source(), IMAGE_BASE, 400);

    for tick in 1..=4 {
        let outcome = monitor.tick();
        assert_eq!(outcome.bytes_processed, 100, "tick {tick}");
        let baseline = monitor
            .registry()
            .entry(ResourceClass::Eeprom, 0)
            .and_then(|e| e.baseline());
        if tick < 4 {
            assert_eq!(baseline, None);
        } else {
            assert_eq!(baseline, Some(expected));
        }
    }
    assert_eq!(offset_of(&monitor, 0), 0);
    assert_eq!(
        monitor.drain_events(),
        vec![MonitorEvent::BaselineEstablished {
            class: ResourceClass::Eeprom,
            key: EntryKey::Id(0),
            checksum: expected,
        }]
    );

    let fifth = monitor.tick();
    assert_eq!(fifth.bytes_processed, 50);
    assert_eq!(
        fifth.activity,
        TickActivity::Sweep {
            class: ResourceClass::Eeprom,
            key: EntryKey::Id(1),
            complete: true,
        }
    );
}

#[test]
fn corrupted_byte_reports_mismatch_and_keeps_baseline() {
    let mut monitor = monitor(TWO_EEPROM);
    for _ in 0..5 {
        monitor.tick();
    }
    let baseline = monitor
        .registry()
        .entry(ResourceClass::Eeprom, 0)
        .and_then(|e| e.baseline())
        .expect("baseline after first pass");
    monitor.drain_events();

    let target = IMAGE_BASE + 123;
    let mut original = [0u8; 1];
    monitor.source().read(target, &mut original).unwrap();
    assert!(monitor.source_mut().poke(target, original[0] ^ 0xff));

    for _ in 0..4 {
        assert_eq!(monitor.tick().bytes_processed, 100);
    }
    let corrupted = crc_of(monitor.source(), IMAGE_BASE, 400);
    assert_ne!(corrupted, baseline);
    assert_eq!(
        monitor.drain_events(),
        vec![MonitorEvent::Mismatch {
            class: ResourceClass::Eeprom,
            key: EntryKey::Id(0),
            expected: baseline,
            computed: corrupted,
        }]
    );
    let entry = monitor.registry().entry(ResourceClass::Eeprom, 0).unwrap();
    assert_eq!(entry.baseline(), Some(baseline));
    assert_eq!(entry.computed(), Some(corrupted));
    assert_eq!(monitor.counters().mismatches(ResourceClass::Eeprom), 1);
    assert_eq!(monitor.counters().passes, 1);
}

#[test]
fn budget_is_never_exceeded() {
    let mut monitor = monitor(
        r#"
max_bytes_per_cycle = 64

[eeprom]
entries = [{ address = 0x1000, size = 130 }]

[memory]
entries = [
    { segments = [{ address = 0x1800, size = 33 }, { address = 0x3000, size = 90 }, { address = 0x1100, size = 7 }] },
]

[apps]
entries = [{ name = "nav", address = 0x4000, size = 200 }]
"#,
    );
    let mut walked = 0u64;
    for _ in 0..200 {
        let outcome = monitor.tick();
        assert!(outcome.bytes_processed <= 64);
        walked += outcome.bytes_processed;
        for class in [ResourceClass::Eeprom, ResourceClass::Memory, ResourceClass::Apps] {
            let entry = &monitor.registry().class(class).entries()[0];
            assert!(entry.cursor().byte_offset <= entry.size());
        }
    }
    assert!(walked > 0);
    assert!(monitor
        .drain_events()
        .iter()
        .all(|event| matches!(event, MonitorEvent::BaselineEstablished { .. })));
}

#[test]
fn multi_segment_entry_checksums_concatenation() {
    let mut monitor = monitor(
        r#"
max_bytes_per_cycle = 40

[memory]
entries = [{ segments = [{ address = 0x1010, size = 25 }, { address = 0x2200, size = 30 }] }]
"#,
    );
    let mut stream = vec![0u8; 55];
    monitor.source().read(0x1010, &mut stream[..25]).unwrap();
    monitor.source().read(0x2200, &mut stream[25..]).unwrap();
    let expected = {
        use csmon::ChecksumPrimitive;
        csmon::Crc32c.checksum(&stream)
    };

    assert_eq!(monitor.tick().bytes_processed, 40);
    assert_eq!(monitor.tick().bytes_processed, 15);
    let entry = monitor.registry().entry(ResourceClass::Memory, 0).unwrap();
    assert_eq!(entry.baseline(), Some(expected));
}

#[test]
fn disabled_entry_resumes_from_frozen_offset() {
    let mut monitor = monitor(TWO_EEPROM);
    let expected = crc_of(monitor.source(), IMAGE_BASE, 400);
    monitor.tick();
    monitor.tick();
    assert_eq!(offset_of(&monitor, 0), 200);

    monitor
        .handle(Command::DisableEntry(EntryRef::id(ResourceClass::Eeprom, 0)))
        .unwrap();
    for _ in 0..3 {
        let outcome = monitor.tick();
        assert!(matches!(
            outcome.activity,
            TickActivity::Sweep {
                key: EntryKey::Id(1),
                ..
            }
        ));
        assert_eq!(offset_of(&monitor, 0), 200);
    }

    monitor
        .handle(Command::EnableEntry(EntryRef::id(ResourceClass::Eeprom, 0)))
        .unwrap();
    assert_eq!(monitor.tick().bytes_processed, 100);
    assert_eq!(offset_of(&monitor, 0), 300);
    assert_eq!(monitor.tick().bytes_processed, 100);
    let entry = monitor.registry().entry(ResourceClass::Eeprom, 0).unwrap();
    assert_eq!(entry.baseline(), Some(expected));
    assert_eq!(entry.state(), ChecksumState::Enabled);
}

#[test]
fn class_disable_discards_progress() {
    let mut monitor = monitor(TWO_EEPROM);
    monitor.tick();
    assert_eq!(offset_of(&monitor, 0), 100);
    monitor
        .handle(Command::DisableClass(ResourceClass::Eeprom))
        .unwrap();
    assert_eq!(offset_of(&monitor, 0), 0);
    assert_eq!(monitor.tick().bytes_processed, 0);

    monitor
        .handle(Command::EnableClass(ResourceClass::Eeprom))
        .unwrap();
    for _ in 0..4 {
        assert_eq!(monitor.tick().bytes_processed, 100);
    }
    assert!(monitor
        .registry()
        .entry(ResourceClass::Eeprom, 0)
        .unwrap()
        .baseline()
        .is_some());
}

#[test]
fn master_gate_stops_and_restarts_sweep() {
    let mut monitor = monitor(TWO_EEPROM);
    monitor.handle(Command::DisableAll).unwrap();
    for _ in 0..3 {
        assert_eq!(monitor.tick().activity, TickActivity::Idle);
    }
    monitor.handle(Command::EnableAll).unwrap();
    assert_eq!(monitor.master_state(), ChecksumState::Enabled);
    assert_eq!(monitor.tick().bytes_processed, 100);
}

#[test]
fn unloaded_images_are_skipped_until_reloaded() {
    let mut monitor = monitor(
        r#"
max_bytes_per_cycle = 1000

[tables]
entries = [{ name = "limits" }, { name = "sched", address = 0x1400, size = 16 }]
"#,
    );
    let outcome = monitor.tick();
    assert!(matches!(
        outcome.activity,
        TickActivity::Sweep { key: EntryKey::Name(ref name), .. } if name == "sched"
    ));

    monitor
        .reload_entry(
            ResourceClass::Tables,
            "limits",
            csmon::Region::single(0x1500, 32),
        )
        .unwrap();
    let outcome = monitor.tick();
    assert_eq!(outcome.bytes_processed, 32);

    monitor.unload_entry(ResourceClass::Tables, "sched").unwrap();
    let sched = monitor.registry().entry(ResourceClass::Tables, 1).unwrap();
    assert!(!sched.is_loaded());
    assert_eq!(sched.baseline(), None);
}

#[test]
fn entry_disabled_by_address_lookup() {
    let mut monitor = monitor(TWO_EEPROM);
    let reply = monitor
        .handle(Command::GetEntryId {
            class: ResourceClass::Eeprom,
            address: 0x2010,
        })
        .unwrap();
    let CommandReply::EntryId(key) = reply else {
        panic!("unexpected reply {reply:?}");
    };
    let id = key.id().expect("eeprom entries are keyed by id");
    assert_eq!(id, 1);

    monitor
        .handle(Command::DisableEntry(EntryRef::id(ResourceClass::Eeprom, id)))
        .unwrap();
    let entry = monitor.registry().entry(ResourceClass::Eeprom, 1).unwrap();
    assert_eq!(entry.state(), ChecksumState::Disabled);
    assert_eq!(
        monitor
            .registry()
            .entry(ResourceClass::Eeprom, 0)
            .map(|entry| entry.state()),
        Some(ChecksumState::Enabled)
    );
}
