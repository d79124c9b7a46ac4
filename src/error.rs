// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Error types and result codes returned by the checksum monitor.
// Author: Lukas Bower

//! Error types surfaced by the monitor.

use std::fmt;
use std::io;

use serde::Serialize;
use thiserror::Error;

use crate::registry::EntryKey;
use crate::special::SpecialKind;
use crate::types::ResourceClass;

/// Outcome code reported for every command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultCode {
    /// Command accepted.
    Ok,
    /// Malformed or inapplicable argument.
    InvalidArg,
    /// Referenced entry or address does not exist.
    NotFound,
    /// A recompute or one-shot is already running.
    Busy,
    /// Target exists but is not currently checkable.
    Disabled,
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ResultCode::Ok => "OK",
            ResultCode::InvalidArg => "INVALID_ARG",
            ResultCode::NotFound => "NOT_FOUND",
            ResultCode::Busy => "BUSY",
            ResultCode::Disabled => "DISABLED",
        };
        f.write_str(text)
    }
}

/// Rejection of a runtime request. No state is mutated when one is returned.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    /// Selector kind does not match how the class keys its entries.
    #[error("{class} entries are keyed by {expected}")]
    SelectorMismatch {
        /// Class addressed by the command.
        class: ResourceClass,
        /// Selector kind the class expects.
        expected: &'static str,
    },
    /// No entry carries the requested key.
    #[error("no {class} entry {key}")]
    UnknownEntry {
        /// Class searched.
        class: ResourceClass,
        /// Requested key.
        key: EntryKey,
    },
    /// No entry range of the class covers the address.
    #[error("address {address:#x} is not covered by any {class} entry")]
    AddressNotCovered {
        /// Class searched.
        class: ResourceClass,
        /// Requested address.
        address: u64,
    },
    /// The class holds no checkable entry.
    #[error("{0} has no loaded entries")]
    EmptyClass(ResourceClass),
    /// Range is zero-sized, overflows, or is not readable.
    #[error("range {address:#x}+{size} is not checkable")]
    InvalidRange {
        /// First address.
        address: u64,
        /// Length in bytes.
        size: u64,
    },
    /// Core-image classes hold a single entry.
    #[error("{0} accepts a single entry")]
    TooManyCoreEntries(ResourceClass),
    /// A special operation is in flight.
    #[error("{0} in progress")]
    Busy(SpecialKind),
    /// The table or application image is not loaded.
    #[error("{class} image {name:?} is not loaded")]
    ImageUnloaded {
        /// Class of the image.
        class: ResourceClass,
        /// Image name.
        name: String,
    },
}

impl CommandError {
    /// Result code reported for this rejection.
    #[must_use]
    pub fn code(&self) -> ResultCode {
        match self {
            CommandError::SelectorMismatch { .. }
            | CommandError::InvalidRange { .. }
            | CommandError::TooManyCoreEntries(_) => ResultCode::InvalidArg,
            CommandError::UnknownEntry { .. }
            | CommandError::AddressNotCovered { .. }
            | CommandError::EmptyClass(_) => ResultCode::NotFound,
            CommandError::Busy(_) => ResultCode::Busy,
            CommandError::ImageUnloaded { .. } => ResultCode::Disabled,
        }
    }
}

/// Failure loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] io::Error),
    /// File is not valid TOML for [`crate::config::MonitorConfig`].
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// Budget must be non-zero.
    #[error("max_bytes_per_cycle must be greater than zero")]
    ZeroBudget,
}

/// Reason a configured entry was left out of the registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RejectReason {
    /// Entry or segment size is zero.
    #[error("zero-sized range")]
    ZeroSize,
    /// Address or size is missing.
    #[error("address and size are required")]
    MissingRange,
    /// Both a single range and a segment list were given.
    #[error("address/size and segments are mutually exclusive")]
    ConflictingRange,
    /// Segments are only valid for the memory class.
    #[error("segments are only allowed for memory entries")]
    SegmentsNotAllowed,
    /// Table and application entries need a name.
    #[error("name is required")]
    MissingName,
    /// Name already used in the same class.
    #[error("duplicate name {0:?}")]
    DuplicateName(String),
    /// Id-keyed classes do not take names.
    #[error("names are not allowed for this class")]
    NameNotAllowed,
    /// Range overflows or lies outside the memory source.
    #[error("range {address:#x}+{size} is not readable")]
    OutOfRange {
        /// First address.
        address: u64,
        /// Length in bytes.
        size: u64,
    },
    /// Core-image class already holds its entry.
    #[error("core-image class already has an entry")]
    TooManyCoreEntries,
    /// Entry position does not fit a numeric ID.
    #[error("too many entries for numeric ids")]
    TooManyEntries,
}

/// A configured entry excluded from the registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{class} entry #{position} rejected: {reason}")]
pub struct EntryRejection {
    /// Class of the rejected entry.
    pub class: ResourceClass,
    /// Position in the configured entry list.
    pub position: usize,
    /// Why the entry was rejected.
    pub reason: RejectReason,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_rejection_kind() {
        assert_eq!(
            CommandError::Busy(SpecialKind::OneShot).code(),
            ResultCode::Busy
        );
        assert_eq!(
            CommandError::EmptyClass(ResourceClass::Apps).code(),
            ResultCode::NotFound
        );
        assert_eq!(
            CommandError::ImageUnloaded {
                class: ResourceClass::Tables,
                name: "sched".into()
            }
            .code(),
            ResultCode::Disabled
        );
        assert_eq!(
            CommandError::InvalidRange {
                address: 0,
                size: 0
            }
            .code(),
            ResultCode::InvalidArg
        );
        assert_eq!(ResultCode::InvalidArg.to_string(), "INVALID_ARG");
    }
}
