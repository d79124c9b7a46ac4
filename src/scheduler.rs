// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Background cycle scheduler driving the round-robin checksum sweep.
// Author: Lukas Bower

//! Background cycle scheduler.
//!
//! [`ChecksumMonitor`] owns the registry, the sweep cursor and the special
//! operation slot. Each [`ChecksumMonitor::tick`] does a bounded amount of
//! work: it services the in-flight recompute or one-shot if there is one,
//! otherwise it advances the routine sweep on a single entry. No tick folds
//! more than `max_bytes_per_cycle` bytes.

use log::{debug, info, warn};

use crate::checksum::{ChecksumPrimitive, Crc32c};
use crate::config::{build_class, EntryConfig, MonitorConfig, DEFAULT_MAX_BYTES_PER_CYCLE};
use crate::error::{CommandError, EntryRejection};
use crate::events::{EventLog, MonitorEvent, DEFAULT_EVENT_CAPACITY};
use crate::housekeeping::{ClassHousekeeping, Counters, HousekeepingSnapshot};
use crate::memory::MemorySource;
use crate::persist::StatePersistence;
use crate::registry::{Entry, EntryKey, Region, Registry};
use crate::special::{OneShotJob, OneShotResult, RecomputeJob, SpecialKind, SpecialOp};
use crate::types::{ChecksumState, ResourceClass, CLASS_COUNT};
use crate::walker::SegmentWalker;

/// Tunables fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorOptions {
    /// Byte budget of one tick.
    pub max_bytes_per_cycle: u32,
    /// Events retained before the oldest is dropped.
    pub event_capacity: usize,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            max_bytes_per_cycle: DEFAULT_MAX_BYTES_PER_CYCLE,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl From<&MonitorConfig> for MonitorOptions {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            max_bytes_per_cycle: config.max_bytes_per_cycle,
            event_capacity: config.event_capacity,
        }
    }
}

/// Position of the routine sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepCursor {
    /// Index into [`ResourceClass::SWEEP_ORDER`].
    pub class_index: usize,
    /// Index into that class's entries.
    pub entry_index: usize,
}

impl SweepCursor {
    /// Class under the cursor.
    #[must_use]
    pub fn class(&self) -> ResourceClass {
        ResourceClass::SWEEP_ORDER[self.class_index % CLASS_COUNT]
    }
}

/// What a tick spent its budget on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickActivity {
    /// Nothing to do: master gate off or no sweepable entry.
    Idle,
    /// Routine sweep walked an entry.
    Sweep {
        /// Entry class.
        class: ResourceClass,
        /// Entry key.
        key: EntryKey,
        /// The entry's pass finished on this tick.
        complete: bool,
    },
    /// Recompute walked an entry.
    Recompute {
        /// Entry class.
        class: ResourceClass,
        /// Entry key.
        key: EntryKey,
        /// The entry's baseline was stored on this tick.
        complete: bool,
    },
    /// One-shot advanced.
    OneShot {
        /// The one-shot finished on this tick.
        complete: bool,
    },
}

/// Result of a single [`ChecksumMonitor::tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickOutcome {
    /// Bytes folded on this tick.
    pub bytes_processed: u64,
    /// Work serviced.
    pub activity: TickActivity,
}

impl TickOutcome {
    fn idle() -> Self {
        Self {
            bytes_processed: 0,
            activity: TickActivity::Idle,
        }
    }
}

/// The checksum monitor: registry, sweep state and special-operation slot.
pub struct ChecksumMonitor<M, P = Crc32c> {
    pub(crate) source: M,
    pub(crate) primitive: P,
    pub(crate) walker: SegmentWalker,
    pub(crate) registry: Registry,
    pub(crate) persistence: Box<dyn StatePersistence>,
    pub(crate) master: ChecksumState,
    pub(crate) cursor: SweepCursor,
    pub(crate) special: Option<SpecialOp>,
    pub(crate) max_bytes_per_cycle: u32,
    pub(crate) counters: Counters,
    pub(crate) events: EventLog,
    pub(crate) last_one_shot: Option<OneShotResult>,
}

impl<M: MemorySource> ChecksumMonitor<M, Crc32c> {
    /// Monitor over `registry` using CRC-32C.
    ///
    /// The registry's class flags are the defaults handed to `persistence`;
    /// whatever it restores replaces them.
    pub fn new(
        source: M,
        registry: Registry,
        options: MonitorOptions,
        persistence: Box<dyn StatePersistence>,
    ) -> Self {
        Self::with_primitive(source, Crc32c, registry, options, persistence)
    }

    /// Build the registry from `config`, log rejected entries and start.
    pub fn from_config(
        config: &MonitorConfig,
        source: M,
        persistence: Box<dyn StatePersistence>,
    ) -> Self {
        let build = config.build_registry(&source);
        log_rejections(&build.rejections);
        Self::new(source, build.registry, config.into(), persistence)
    }
}

impl<M: MemorySource, P: ChecksumPrimitive> ChecksumMonitor<M, P> {
    /// Monitor using a custom checksum primitive.
    pub fn with_primitive(
        source: M,
        primitive: P,
        mut registry: Registry,
        options: MonitorOptions,
        mut persistence: Box<dyn StatePersistence>,
    ) -> Self {
        let restored = persistence.restore(registry.class_states());
        registry.apply_states(restored);
        let max_bytes_per_cycle = if options.max_bytes_per_cycle == 0 {
            DEFAULT_MAX_BYTES_PER_CYCLE
        } else {
            options.max_bytes_per_cycle
        };
        info!(
            "checksum monitor started: {} entries, {} bytes per cycle",
            registry.entry_count(),
            max_bytes_per_cycle
        );
        Self {
            source,
            primitive,
            walker: SegmentWalker::new(),
            registry,
            persistence,
            master: ChecksumState::Enabled,
            cursor: SweepCursor::default(),
            special: None,
            max_bytes_per_cycle,
            counters: Counters::default(),
            events: EventLog::new(options.event_capacity),
            last_one_shot: None,
        }
    }

    /// Run one bounded increment of checksum work.
    pub fn tick(&mut self) -> TickOutcome {
        if let Some(op) = self.special.take() {
            return self.service_special(op);
        }
        if !self.master.is_enabled() {
            return TickOutcome::idle();
        }
        match self.locate_next() {
            Some(cursor) => {
                self.cursor = cursor;
                self.sweep_current()
            }
            None => TickOutcome::idle(),
        }
    }

    /// Find the next sweepable entry at or after the cursor.
    ///
    /// Visits every class once plus the starting class again, so entries
    /// before the cursor in its own class are reached after a wrap. Wraps
    /// are only counted when an entry is found.
    fn locate_next(&mut self) -> Option<SweepCursor> {
        let mut class_index = self.cursor.class_index % CLASS_COUNT;
        let mut entry_index = self.cursor.entry_index;
        let mut wraps = 0u32;
        for _ in 0..=CLASS_COUNT {
            let table = self.registry.class(ResourceClass::SWEEP_ORDER[class_index]);
            if table.state().is_enabled() {
                if let Some(offset) = table
                    .entries()
                    .iter()
                    .skip(entry_index)
                    .position(Entry::is_sweepable)
                {
                    self.counters.passes = self.counters.passes.wrapping_add(wraps);
                    return Some(SweepCursor {
                        class_index,
                        entry_index: entry_index + offset,
                    });
                }
            }
            class_index += 1;
            entry_index = 0;
            if class_index == CLASS_COUNT {
                class_index = 0;
                wraps += 1;
            }
        }
        None
    }

    fn sweep_current(&mut self) -> TickOutcome {
        let class = self.cursor.class();
        let budget = u64::from(self.max_bytes_per_cycle);
        let Some(entry) = self.registry.entry_mut(class, self.cursor.entry_index) else {
            return TickOutcome::idle();
        };
        let Entry {
            key,
            region,
            cursor,
            computed,
            baseline,
            ..
        } = entry;
        let Some(region) = region.as_ref() else {
            return TickOutcome::idle();
        };
        let key = key.clone();
        let start = cursor.byte_offset;
        match self
            .walker
            .advance(&self.source, &self.primitive, region, cursor, budget)
        {
            Ok(step) => {
                if step.complete {
                    let value = cursor.accumulator;
                    cursor.reset();
                    *computed = Some(value);
                    match *baseline {
                        None => {
                            *baseline = Some(value);
                            self.events.record(MonitorEvent::BaselineEstablished {
                                class,
                                key: key.clone(),
                                checksum: value,
                            });
                        }
                        Some(expected) if expected != value => {
                            self.counters.record_mismatch(class);
                            self.events.record(MonitorEvent::Mismatch {
                                class,
                                key: key.clone(),
                                expected,
                                computed: value,
                            });
                        }
                        Some(_) => debug!("{class} {key}: checksum verified {value:#010x}"),
                    }
                    self.cursor.entry_index += 1;
                }
                TickOutcome {
                    bytes_processed: step.consumed,
                    activity: TickActivity::Sweep {
                        class,
                        key,
                        complete: step.complete,
                    },
                }
            }
            Err(fault) => {
                let consumed = cursor.byte_offset.saturating_sub(start);
                cursor.reset();
                self.events.record(MonitorEvent::ReadFault {
                    class,
                    key: key.clone(),
                    address: fault.address,
                });
                self.cursor.entry_index += 1;
                TickOutcome {
                    bytes_processed: consumed,
                    activity: TickActivity::Sweep {
                        class,
                        key,
                        complete: false,
                    },
                }
            }
        }
    }

    fn service_special(&mut self, op: SpecialOp) -> TickOutcome {
        match op {
            SpecialOp::Recompute(job) => self.service_recompute(job),
            SpecialOp::OneShot(job) => self.service_one_shot(job),
        }
    }

    fn service_recompute(&mut self, mut job: RecomputeJob) -> TickOutcome {
        let class = job.class();
        let budget = u64::from(self.max_bytes_per_cycle);
        let Some(index) = job.current() else {
            return TickOutcome::idle();
        };
        let entry = self
            .registry
            .entry_mut(class, index)
            .filter(|entry| entry.is_loaded());
        let Some(entry) = entry else {
            if !job.finish_current() {
                self.special = Some(SpecialOp::Recompute(job));
            }
            return TickOutcome::idle();
        };
        let Entry {
            key,
            region,
            cursor,
            computed,
            baseline,
            ..
        } = entry;
        let Some(region) = region.as_ref() else {
            return TickOutcome::idle();
        };
        let key = key.clone();
        let start = cursor.byte_offset;
        match self
            .walker
            .advance(&self.source, &self.primitive, region, cursor, budget)
        {
            Ok(step) => {
                let mut done = false;
                if step.complete {
                    let value = cursor.accumulator;
                    cursor.reset();
                    *computed = Some(value);
                    *baseline = Some(value);
                    self.events.record(MonitorEvent::RecomputeComplete {
                        class,
                        key: key.clone(),
                        checksum: value,
                    });
                    done = job.finish_current();
                }
                if !done {
                    self.special = Some(SpecialOp::Recompute(job));
                }
                TickOutcome {
                    bytes_processed: step.consumed,
                    activity: TickActivity::Recompute {
                        class,
                        key,
                        complete: step.complete,
                    },
                }
            }
            Err(fault) => {
                let consumed = cursor.byte_offset.saturating_sub(start);
                cursor.reset();
                self.events.record(MonitorEvent::RecomputeFailed {
                    class,
                    key: key.clone(),
                    address: fault.address,
                });
                TickOutcome {
                    bytes_processed: consumed,
                    activity: TickActivity::Recompute {
                        class,
                        key,
                        complete: false,
                    },
                }
            }
        }
    }

    fn service_one_shot(&mut self, mut job: OneShotJob) -> TickOutcome {
        let budget = u64::from(job.budget(self.max_bytes_per_cycle));
        let start = job.cursor.byte_offset;
        match self.walker.advance(
            &self.source,
            &self.primitive,
            &job.region,
            &mut job.cursor,
            budget,
        ) {
            Ok(step) => {
                if step.complete {
                    let result = OneShotResult {
                        address: job.address,
                        size: job.size,
                        checksum: job.cursor.accumulator,
                    };
                    self.last_one_shot = Some(result);
                    self.events.record(MonitorEvent::OneShotComplete {
                        address: result.address,
                        size: result.size,
                        checksum: result.checksum,
                    });
                } else {
                    self.special = Some(SpecialOp::OneShot(job));
                }
                TickOutcome {
                    bytes_processed: step.consumed,
                    activity: TickActivity::OneShot {
                        complete: step.complete,
                    },
                }
            }
            Err(fault) => {
                self.events.record(MonitorEvent::OneShotFailed {
                    address: job.address,
                    size: job.size,
                    fault_address: fault.address,
                });
                TickOutcome {
                    bytes_processed: job.cursor.byte_offset.saturating_sub(start),
                    activity: TickActivity::OneShot { complete: false },
                }
            }
        }
    }

    /// Reject with `BUSY` while a special operation is in flight.
    pub(crate) fn ensure_idle(&self) -> Result<(), CommandError> {
        match &self.special {
            Some(op) => Err(CommandError::Busy(op.kind())),
            None => Ok(()),
        }
    }

    /// Start a recompute over `indices` of `class`.
    pub(crate) fn start_recompute(&mut self, class: ResourceClass, indices: Vec<usize>) {
        for index in &indices {
            if let Some(entry) = self.registry.entry_mut(class, *index) {
                entry.cursor.reset();
            }
        }
        info!("{class}: recomputing {} baseline(s)", indices.len());
        self.special = Some(SpecialOp::Recompute(RecomputeJob::new(class, indices)));
    }

    /// Start a one-shot over an already validated range.
    pub(crate) fn start_one_shot(&mut self, job: OneShotJob) {
        info!(
            "one-shot {:#x}+{} started, {} bytes per cycle",
            job.address,
            job.size,
            job.budget(self.max_bytes_per_cycle)
        );
        self.special = Some(SpecialOp::OneShot(job));
    }

    /// Discard the in-flight one-shot, if any. Returns true when one was dropped.
    pub(crate) fn cancel_one_shot(&mut self) -> bool {
        if !matches!(self.special, Some(SpecialOp::OneShot(_))) {
            return false;
        }
        if let Some(SpecialOp::OneShot(job)) = self.special.take() {
            self.events.record(MonitorEvent::OneShotCancelled {
                address: job.address,
                size: job.size,
            });
        }
        true
    }

    /// Change one class flag and persist all six.
    pub(crate) fn set_class_state(&mut self, class: ResourceClass, state: ChecksumState) {
        self.registry.set_class_state(class, state);
        info!("{class} checksumming {state}");
        self.persistence.save(&self.registry.class_states());
    }

    /// Install a freshly loaded image for a table or application.
    ///
    /// Offset, accumulator and baseline are cleared.
    pub fn reload_entry(
        &mut self,
        class: ResourceClass,
        name: &str,
        region: Region,
    ) -> Result<(), CommandError> {
        self.ensure_idle()?;
        let index = self.registry.find(class, &EntryKey::Name(name.to_owned()))?;
        let size = region.len();
        let address = region.segments().first().map_or(0, |seg| seg.address);
        if region.segments().len() != 1 || region.validate(&self.source).is_err() {
            return Err(CommandError::InvalidRange { address, size });
        }
        if let Some(entry) = self.registry.entry_mut(class, index) {
            entry.replace_region(Some(region));
        }
        info!("{class} image {name:?} reloaded at {address:#x}+{size}");
        Ok(())
    }

    /// Mark a table or application image as absent.
    pub fn unload_entry(&mut self, class: ResourceClass, name: &str) -> Result<(), CommandError> {
        self.ensure_idle()?;
        let index = self.registry.find(class, &EntryKey::Name(name.to_owned()))?;
        if let Some(entry) = self.registry.entry_mut(class, index) {
            entry.replace_region(None);
        }
        info!("{class} image {name:?} unloaded");
        Ok(())
    }

    /// Swap the whole entry table of `class` after a definition update.
    ///
    /// Returns the entries that failed validation. The sweep restarts at the
    /// first entry of the class when the cursor was inside it.
    pub fn replace_class_entries(
        &mut self,
        class: ResourceClass,
        entries: &[EntryConfig],
    ) -> Result<Vec<EntryRejection>, CommandError> {
        self.ensure_idle()?;
        let (accepted, rejections) = build_class(class, entries, &self.source);
        log_rejections(&rejections);
        info!("{class}: definition table replaced, {} entries", accepted.len());
        self.registry.replace_entries(class, accepted);
        if self.cursor.class() == class {
            self.cursor.entry_index = 0;
        }
        Ok(rejections)
    }

    /// Remove and return queued events, oldest first.
    pub fn drain_events(&mut self) -> Vec<MonitorEvent> {
        self.events.drain()
    }

    /// Registry view.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Memory source view.
    #[must_use]
    pub fn source(&self) -> &M {
        &self.source
    }

    /// Mutable memory source, for hosts that patch the monitored image.
    pub fn source_mut(&mut self) -> &mut M {
        &mut self.source
    }

    /// Master sweep gate.
    #[must_use]
    pub fn master_state(&self) -> ChecksumState {
        self.master
    }

    /// Routine sweep position.
    #[must_use]
    pub fn sweep_cursor(&self) -> SweepCursor {
        self.cursor
    }

    /// Kind of the in-flight special operation.
    #[must_use]
    pub fn special_in_progress(&self) -> Option<SpecialKind> {
        self.special.as_ref().map(SpecialOp::kind)
    }

    /// Bytes folded so far by the in-flight one-shot.
    #[must_use]
    pub fn one_shot_progress(&self) -> Option<u64> {
        match &self.special {
            Some(SpecialOp::OneShot(job)) => Some(job.progress()),
            _ => None,
        }
    }

    /// Most recent completed one-shot.
    #[must_use]
    pub fn last_one_shot(&self) -> Option<OneShotResult> {
        self.last_one_shot
    }

    /// Routine per-tick byte budget.
    #[must_use]
    pub fn max_bytes_per_cycle(&self) -> u32 {
        self.max_bytes_per_cycle
    }

    /// Housekeeping counters.
    #[must_use]
    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Point-in-time housekeeping view.
    #[must_use]
    pub fn housekeeping(&self) -> HousekeepingSnapshot {
        let special = self.special_in_progress();
        HousekeepingSnapshot {
            commands_accepted: self.counters.commands_accepted,
            commands_rejected: self.counters.commands_rejected,
            passes: self.counters.passes,
            master_state: self.master,
            current_class: self.cursor.class(),
            current_entry: self.cursor.entry_index,
            recompute_in_progress: special == Some(SpecialKind::Recompute),
            one_shot_in_progress: special == Some(SpecialKind::OneShot),
            last_one_shot: self.last_one_shot,
            max_bytes_per_cycle: self.max_bytes_per_cycle,
            persistence_active: self.persistence.is_active(),
            events_dropped: self.events.dropped(),
            classes: ResourceClass::SWEEP_ORDER
                .iter()
                .map(|class| ClassHousekeeping {
                    class: *class,
                    state: self.registry.class(*class).state(),
                    entries: self.registry.class(*class).len(),
                    mismatches: self.counters.mismatches(*class),
                })
                .collect(),
        }
    }
}

fn log_rejections(rejections: &[EntryRejection]) {
    for rejection in rejections {
        warn!("{rejection}");
    }
}
