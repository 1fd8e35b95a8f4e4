//! Snapshot identifiers and the on-disk snapshot layout:
//! `{snapshots_root}/{timestamp}/{feed_name}.json`.

use crate::realtime::error::RealtimeError;
use chrono::Utc;
use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Identifies a snapshot by the UNIX timestamp (seconds, fractional) it was taken at.
///
/// The textual form is the snapshot's directory name. An id parsed from a directory name
/// keeps that exact text, so ids of snapshots written by other tools (`1697040000.0`)
/// still resolve to their directory.
#[derive(Debug, Clone)]
pub struct SnapshotId {
    secs: f64,
    label: String,
}

impl SnapshotId {
    /// An id for the current instant, at microsecond resolution.
    pub fn now() -> Self {
        Self::from_secs(Utc::now().timestamp_micros() as f64 / 1e6)
    }

    pub fn from_secs(secs: f64) -> Self {
        Self {
            secs,
            label: secs.to_string(),
        }
    }

    pub fn as_secs(&self) -> f64 {
        self.secs
    }

    /// The directory name of this snapshot.
    pub fn as_str(&self) -> &str {
        &self.label
    }
}

impl PartialEq for SnapshotId {
    fn eq(&self, other: &Self) -> bool {
        self.secs == other.secs
    }
}

impl PartialOrd for SnapshotId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.secs.total_cmp(&other.secs))
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

impl FromStr for SnapshotId {
    type Err = std::num::ParseFloatError;

    /// Accepts digits with at most one decimal point, the only names snapshot
    /// directories are given.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let well_formed = !s.is_empty()
            && s.bytes().all(|b| b.is_ascii_digit() || b == b'.')
            && s.bytes().filter(|&b| b == b'.').count() <= 1;
        // Reuse f64's error type for anything that is not a plain decimal.
        let secs: f64 = if well_formed { s.parse()? } else { "x".parse()? };
        Ok(Self {
            secs,
            label: s.to_string(),
        })
    }
}

/// Directory holding the feeds of snapshot `id`.
pub fn snapshot_dir(root: &Path, id: &SnapshotId) -> PathBuf {
    root.join(id.as_str())
}

/// All snapshots under `root`, oldest first. A missing root holds no snapshots.
/// Entries that are not directories or whose name is not a timestamp are skipped.
pub fn list_snapshots(root: &Path) -> Result<Vec<SnapshotId>, RealtimeError> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(RealtimeError::SnapshotList(root.to_path_buf(), e)),
    };

    let mut snapshots = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| RealtimeError::SnapshotList(root.to_path_buf(), e))?;
        if !entry.path().is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if let Ok(id) = name.parse::<SnapshotId>() {
            snapshots.push(id);
        }
    }
    snapshots.sort_by(|a, b| a.secs.total_cmp(&b.secs));
    Ok(snapshots)
}

/// The most recent snapshot under `root`, if any.
pub fn latest_snapshot(root: &Path) -> Result<Option<SnapshotId>, RealtimeError> {
    Ok(list_snapshots(root)?.pop())
}
