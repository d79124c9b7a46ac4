// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Directory-backed record store with atomic replace semantics.
// Author: Lukas Bower

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::{validate_key, StateStore, StoreError};

const RECORD_EXTENSION: &str = "cds";

/// Store keeping one file per record under a root directory.
///
/// Writes go to a temporary sibling that is fsynced and renamed over the
/// record, so a crash mid-write leaves the prior record intact.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Directory holding the record files.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.root.join(format!("{key}.{RECORD_EXTENSION}")))
    }
}

impl StateStore for FileStore {
    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.record_path(key)?;
        match fs::metadata(&path) {
            Ok(meta) => Ok(meta.is_file()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn read(&self, key: &str, buf: &mut [u8]) -> Result<(), StoreError> {
        let path = self.record_path(key)?;
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(key.to_owned()))
            }
            Err(err) => return Err(err.into()),
        };
        if data.len() != buf.len() {
            return Err(StoreError::SizeMismatch {
                key: key.to_owned(),
                expected: buf.len(),
                actual: data.len(),
            });
        }
        buf.copy_from_slice(&data);
        Ok(())
    }

    fn write(&mut self, key: &str, data: &[u8]) -> Result<(), StoreError> {
        let path = self.record_path(key)?;
        let staging = path.with_extension(format!("{RECORD_EXTENSION}.tmp"));
        {
            let mut file = fs::File::create(&staging)?;
            file.write_all(data)?;
            file.sync_all()?;
        }
        if let Err(err) = fs::rename(&staging, &path) {
            let _ = fs::remove_file(&staging);
            return Err(err.into());
        }
        debug!("record {key} written ({} bytes) to {}", data.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_then_reopen_reads_same_bytes() {
        let dir = tempdir().expect("tempdir");
        let mut store = FileStore::open(dir.path().join("cds")).expect("open store");
        assert!(!store.exists("csmon.class_states").unwrap());
        store.write("csmon.class_states", &[1, 2, 1, 1, 2, 1]).unwrap();

        let reopened = FileStore::open(dir.path().join("cds")).expect("reopen store");
        assert!(reopened.exists("csmon.class_states").unwrap());
        let mut buf = [0u8; 6];
        reopened.read("csmon.class_states", &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 1, 1, 2, 1]);
    }

    #[test]
    fn missing_record_reports_not_found() {
        let dir = tempdir().expect("tempdir");
        let store = FileStore::open(dir.path()).expect("open store");
        let mut buf = [0u8; 6];
        let err = store.read("absent", &mut buf).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn staging_file_does_not_linger() {
        let dir = tempdir().expect("tempdir");
        let mut store = FileStore::open(dir.path()).expect("open store");
        store.write("states", &[1]).unwrap();
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["states.cds".to_owned()]);
    }
}
