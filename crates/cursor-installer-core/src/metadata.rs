//! Persisted installation record.
//!
//! A single JSON file next to the installed artifact:
//! `{"version", "install_date", "last_update_date", "install_path"}` with
//! RFC 3339 timestamps.

use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::InstallError;
use crate::ops::PrivilegedOps;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct InstallMetadata {
    pub version: String,
    pub install_date: DateTime<Utc>,
    pub last_update_date: DateTime<Utc>,
    pub install_path: PathBuf,
}

impl InstallMetadata {
    /// A record stamped at `now`; `install_date` is replaced on write when a
    /// previous record exists.
    pub fn new(version: impl Into<String>, install_path: PathBuf, now: DateTime<Utc>) -> Self {
        Self {
            version: version.into(),
            install_date: now,
            last_update_date: now,
            install_path,
        }
    }
}

pub struct MetadataStore {
    path: PathBuf,
    ops: Arc<dyn PrivilegedOps>,
    scratch_dir: PathBuf,
}

impl MetadataStore {
    pub fn new(path: PathBuf, ops: Arc<dyn PrivilegedOps>) -> Self {
        Self {
            path,
            ops,
            scratch_dir: env::temp_dir(),
        }
    }

    /// Directory the record is encoded into before it is moved beside the
    /// target. Defaults to the system temp dir.
    pub fn with_scratch_dir(mut self, dir: PathBuf) -> Self {
        self.scratch_dir = dir;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the record; `None` when no install has been recorded.
    pub fn read(&self) -> Result<Option<InstallMetadata>, InstallError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(InstallError::io_at("read", &self.path, err)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|err| InstallError::Corruption(format!("{}: {err}", self.path.display())))
    }

    /// Persist `metadata`, keeping the `install_date` of an existing record.
    ///
    /// The record is staged beside the target and renamed into place, so a
    /// concurrent reader sees either the old or the new file.
    pub fn write(&self, metadata: &InstallMetadata) -> Result<InstallMetadata, InstallError> {
        let mut record = metadata.clone();
        if let Some(existing) = self.read()? {
            record.install_date = existing.install_date;
        }

        let data = serde_json::to_vec_pretty(&record)
            .map_err(|err| InstallError::Corruption(format!("failed to encode metadata: {err}")))?;

        // Created with a random name and O_EXCL; an existing entry in the
        // scratch dir is never opened.
        let mut scratch = tempfile::Builder::new()
            .prefix("cursor-metadata-")
            .suffix(".json")
            .tempfile_in(&self.scratch_dir)
            .map_err(|err| InstallError::io_at("create scratch file in", &self.scratch_dir, err))?;
        scratch
            .write_all(&data)
            .and_then(|()| scratch.flush())
            .map_err(|err| InstallError::io_at("write", scratch.path(), err))?;

        // Dropping the handle removes the scratch file if it was not moved.
        let scratch = scratch.into_temp_path();
        self.install_staged(&scratch, &self.staged_path())?;

        debug!(
            path = %self.path.display(),
            version = %record.version,
            "installation metadata written"
        );
        Ok(record)
    }

    fn install_staged(&self, scratch: &Path, staged: &Path) -> Result<(), InstallError> {
        if let Some(parent) = self.path.parent() {
            self.ops.create_dir_all(parent)?;
        }
        self.ops.move_file(scratch, staged)?;
        self.ops.set_mode(staged, 0o644)?;
        self.ops.move_file(staged, &self.path)
    }

    fn staged_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "metadata.json".to_string());
        self.path.with_file_name(format!(".{name}.tmp"))
    }
}
