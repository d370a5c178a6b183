//! Persistence of the previous run's pull request state.
//!
//! The file is a small versioned JSON document holding the minimal
//! projection of every PR seen at the end of the last run. Each save
//! replaces the whole file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::pr::{PullRequestRecord, PullRequestSnapshot};

/// Format version written by this build.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Failed to access snapshot file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot file {} is corrupted: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(
        "Snapshot file {} has unsupported version {found} (expected {})",
        .path.display(),
        SNAPSHOT_VERSION
    )]
    UnsupportedVersion { path: PathBuf, found: u32 },

    #[error("Failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    version: u32,
    pull_requests: Vec<PullRequestSnapshot>,
}

/// Single global snapshot stored at a fixed path.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> SnapshotError {
        SnapshotError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Previous run's PRs. A missing or zero-length file means no history.
    /// Anything unreadable is an error.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> Result<Vec<PullRequestSnapshot>, SnapshotError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("no previous snapshot, treating every PR as new");
                return Ok(Vec::new());
            }
            Err(e) => return Err(self.io_error(e)),
        };
        if contents.is_empty() {
            debug!("snapshot file is empty");
            return Ok(Vec::new());
        }

        let file: SnapshotFile =
            serde_json::from_str(&contents).map_err(|source| SnapshotError::Malformed {
                path: self.path.clone(),
                source,
            })?;
        if file.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                path: self.path.clone(),
                found: file.version,
            });
        }
        debug!(count = file.pull_requests.len(), "loaded snapshot");
        Ok(file.pull_requests)
    }

    /// Replace the snapshot with `records`.
    #[instrument(skip(self, records), fields(path = %self.path.display(), count = records.len()))]
    pub fn save(&self, records: &[PullRequestRecord]) -> Result<(), SnapshotError> {
        let file = SnapshotFile {
            version: SNAPSHOT_VERSION,
            pull_requests: records.iter().map(PullRequestRecord::snapshot).collect(),
        };
        let content = serde_json::to_string_pretty(&file)?;

        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(self.io_error(e)),
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        fs::write(&self.path, content).map_err(|e| self.io_error(e))?;
        debug!("saved snapshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(number: u64, commits: Option<u32>, comments: Option<u32>) -> PullRequestRecord {
        PullRequestRecord {
            number,
            updated_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 15).unwrap(),
            commits,
            comments,
            author: "alice".to_string(),
            title: format!("PR {number}"),
            url: format!("https://github.com/org/repo/pull/{number}"),
            labels: vec!["wip".to_string()],
        }
    }

    #[test]
    fn test_missing_file_is_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("prs.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_zero_length_file_is_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prs.json");
        fs::write(&path, "").unwrap();
        assert!(SnapshotStore::new(&path).load().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load_keeps_tracked_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("prs.json"));
        let records = vec![
            record(1, Some(2), Some(0)),
            record(2, None, Some(5)),
            record(3, Some(1), None),
            record(4, None, None),
        ];
        store.save(&records).unwrap();

        let loaded = store.load().unwrap();
        let expected: Vec<PullRequestSnapshot> =
            records.iter().map(PullRequestRecord::snapshot).collect();
        assert_eq!(loaded, expected);
    }

    #[test]
    fn test_save_replaces_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("prs.json"));
        store.save(&[record(1, None, None), record(2, None, None)]).unwrap();
        store.save(&[record(3, None, None)]).unwrap();

        let numbers: Vec<u64> = store.load().unwrap().iter().map(|s| s.number).collect();
        assert_eq!(numbers, vec![3]);
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("state").join("prs.json"));
        store.save(&[record(1, None, None)]).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn test_file_is_versioned_json() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("prs.json"));
        store.save(&[record(1, Some(2), None)]).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["version"], 1);
        assert_eq!(raw["pull_requests"][0]["number"], 1);
        assert_eq!(raw["pull_requests"][0]["commits"], 2);
        assert!(raw["pull_requests"][0]["comments"].is_null());
        assert!(raw["pull_requests"][0].get("title").is_none());
    }

    #[test]
    fn test_corrupted_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prs.json");
        fs::write(&path, "not json").unwrap();
        let err = SnapshotStore::new(&path).load().unwrap_err();
        assert!(matches!(err, SnapshotError::Malformed { .. }));
    }

    #[test]
    fn test_unknown_version_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prs.json");
        fs::write(&path, r#"{"version": 99, "pull_requests": []}"#).unwrap();
        let err = SnapshotStore::new(&path).load().unwrap_err();
        assert!(matches!(err, SnapshotError::UnsupportedVersion { found: 99, .. }));
    }
}
