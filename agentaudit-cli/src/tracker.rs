//! Change tracking between runs
//!
//! The snapshot of agent, test and core-module names is persisted through a
//! [`SnapshotStore`]. Loading falls back to an empty baseline and saving
//! only logs on failure, so drift tracking never blocks a report.

use crate::models::{ChangeSet, ScanResult, Snapshot};
use chrono::Utc;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write snapshot {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid snapshot {path}: {source}")]
    Format {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("snapshot store unavailable: {0}")]
    Unavailable(String),
}

/// Swappable persistence for snapshots
pub trait SnapshotStore: Send + Sync {
    /// `Ok(None)` when nothing was stored yet
    fn load(&self) -> Result<Option<Snapshot>, SnapshotError>;

    /// Overwrite the stored snapshot
    fn save(&self, snapshot: &Snapshot) -> Result<(), SnapshotError>;
}

/// Snapshot stored as a JSON document on disk
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self) -> Result<Option<Snapshot>, SnapshotError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path).map_err(|source| SnapshotError::Read {
            path: self.path.clone(),
            source,
        })?;
        let snapshot = serde_json::from_str(&content).map_err(|source| SnapshotError::Format {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let write_err = |source| SnapshotError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(snapshot).map_err(|source| SnapshotError::Format {
            path: self.path.clone(),
            source,
        })?;
        std::fs::write(&self.path, json).map_err(write_err)
    }
}

/// Snapshot kept in memory, for embedding and tests
#[derive(Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<Snapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
        }
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> Result<Option<Snapshot>, SnapshotError> {
        self.snapshot
            .lock()
            .map(|guard| guard.clone())
            .map_err(|e| SnapshotError::Unavailable(e.to_string()))
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let mut guard = self
            .snapshot
            .lock()
            .map_err(|e| SnapshotError::Unavailable(e.to_string()))?;
        *guard = Some(snapshot.clone());
        Ok(())
    }
}

/// Previous snapshot plus whether it is an empty first-run baseline
#[derive(Debug, Clone, Default)]
pub struct Baseline {
    pub snapshot: Snapshot,
    pub first_run: bool,
}

pub struct ChangeTracker {
    store: Box<dyn SnapshotStore>,
}

impl ChangeTracker {
    pub fn new(store: Box<dyn SnapshotStore>) -> Self {
        Self { store }
    }

    /// Tracker persisting to a JSON file
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        Self::new(Box::new(JsonFileStore::new(path)))
    }

    /// Build a snapshot from the live scan
    pub fn get_current_state(&self, scan: &ScanResult) -> Snapshot {
        Snapshot {
            agent_names: scan.agents.keys().cloned().collect(),
            test_names: scan.tests.keys().cloned().collect(),
            core_module_names: scan.core_modules.keys().cloned().collect(),
            timestamp: Some(Utc::now()),
        }
    }

    /// Last persisted snapshot, or an empty baseline on any failure
    pub fn load_previous_state(&self) -> Baseline {
        match self.store.load() {
            Ok(Some(snapshot)) => {
                debug!(
                    "Loaded previous snapshot with {} agents",
                    snapshot.agent_names.len()
                );
                Baseline {
                    snapshot,
                    first_run: false,
                }
            }
            Ok(None) => {
                info!("No previous snapshot, treating this as the first run");
                Baseline {
                    snapshot: Snapshot::default(),
                    first_run: true,
                }
            }
            Err(e) => {
                warn!("Ignoring unreadable snapshot: {}", e);
                Baseline {
                    snapshot: Snapshot::default(),
                    first_run: true,
                }
            }
        }
    }

    /// Overwrite the persisted snapshot; failures are logged only
    pub fn save_state(&self, snapshot: &Snapshot) -> bool {
        match self.store.save(snapshot) {
            Ok(()) => {
                debug!("Saved snapshot with {} agents", snapshot.agent_names.len());
                true
            }
            Err(e) => {
                warn!("Failed to save snapshot: {}", e);
                false
            }
        }
    }
}

/// Pure set difference between two snapshots
pub fn get_changes(current: &Snapshot, previous: &Snapshot) -> ChangeSet {
    ChangeSet {
        new_agents: difference(&current.agent_names, &previous.agent_names),
        removed_agents: difference(&previous.agent_names, &current.agent_names),
        unchanged_agents: current
            .agent_names
            .intersection(&previous.agent_names)
            .cloned()
            .collect(),
        new_tests: difference(&current.test_names, &previous.test_names),
        removed_tests: difference(&previous.test_names, &current.test_names),
        new_core_systems: difference(&current.core_module_names, &previous.core_module_names),
        removed_core_systems: difference(&previous.core_module_names, &current.core_module_names),
        first_run: false,
    }
}

fn difference(a: &BTreeSet<String>, b: &BTreeSet<String>) -> Vec<String> {
    a.difference(b).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(agents: &[&str], tests: &[&str]) -> Snapshot {
        Snapshot {
            agent_names: agents.iter().map(|s| s.to_string()).collect(),
            test_names: tests.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_agent_detected() {
        let previous = snapshot(&["a", "b"], &[]);
        let current = snapshot(&["a", "b", "c"], &[]);
        let changes = get_changes(&current, &previous);
        assert_eq!(changes.new_agents, vec!["c"]);
        assert!(changes.removed_agents.is_empty());
        assert_eq!(changes.unchanged_agents, vec!["a", "b"]);
        assert!(changes.has_changes());
    }

    #[test]
    fn test_removed_entries() {
        let previous = snapshot(&["a", "b"], &["test_a", "test_b"]);
        let current = snapshot(&["a"], &["test_a"]);
        let changes = get_changes(&current, &previous);
        assert_eq!(changes.removed_agents, vec!["b"]);
        assert_eq!(changes.removed_tests, vec!["test_b"]);
        assert!(changes.new_tests.is_empty());
    }

    #[test]
    fn test_identical_snapshots_have_no_changes() {
        let s = snapshot(&["a"], &["test_a"]);
        let changes = get_changes(&s, &s);
        assert!(!changes.has_changes());
        assert_eq!(changes, get_changes(&s, &s));
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileStore::new(dir.path().join(".agentaudit").join("snapshot.json"));
        assert!(store.load().expect("load").is_none());

        let mut original = snapshot(&["a", "b"], &["test_a"]);
        original.timestamp = Some(Utc::now());
        store.save(&original).expect("save");

        let loaded = store.load().expect("load").expect("snapshot");
        assert_eq!(loaded.agent_names, original.agent_names);
        assert_eq!(loaded.test_names, original.test_names);
    }

    #[test]
    fn test_corrupt_snapshot_falls_back_to_baseline() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("snapshot.json");
        std::fs::write(&path, "{not json").expect("write");

        let tracker = ChangeTracker::with_file(&path);
        let baseline = tracker.load_previous_state();
        assert!(baseline.first_run);
        assert!(baseline.snapshot.is_empty());
    }

    #[test]
    fn test_persisted_schema_uses_legacy_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("snapshot.json");
        std::fs::write(
            &path,
            r#"{"agents": ["a", "b"], "tests": [], "core_systems": ["config"], "timestamp": "2024-05-01T10:00:00Z"}"#,
        )
        .expect("write");

        let loaded = JsonFileStore::new(&path).load().expect("load").expect("snapshot");
        assert_eq!(loaded.agent_names.len(), 2);
        assert!(loaded.core_module_names.contains("config"));
    }

    #[test]
    fn test_naive_or_garbled_timestamp_keeps_names() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("snapshot.json");

        std::fs::write(
            &path,
            r#"{"agents": ["a", "b"], "tests": ["test_a"], "core_systems": [], "timestamp": "2025-01-10T12:34:56.789012"}"#,
        )
        .expect("write");
        let tracker = ChangeTracker::with_file(&path);
        let baseline = tracker.load_previous_state();
        assert!(!baseline.first_run);
        assert_eq!(baseline.snapshot.agent_names.len(), 2);
        let stamp = baseline.snapshot.timestamp.expect("naive timestamp read as UTC");
        assert_eq!(stamp.to_rfc3339(), "2025-01-10T12:34:56.789012+00:00");

        std::fs::write(&path, r#"{"agents": ["a"], "timestamp": "last tuesday"}"#).expect("write");
        let baseline = tracker.load_previous_state();
        assert!(!baseline.first_run);
        assert!(baseline.snapshot.agent_names.contains("a"));
        assert!(baseline.snapshot.timestamp.is_none());
    }

    #[test]
    fn test_save_failure_is_not_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        // A directory where the file should go
        let path = dir.path().join("blocked");
        std::fs::create_dir_all(&path).expect("mkdir");

        let tracker = ChangeTracker::with_file(&path);
        assert!(!tracker.save_state(&Snapshot::default()));
    }

    #[test]
    fn test_memory_store() {
        let tracker = ChangeTracker::new(Box::new(MemoryStore::with_snapshot(snapshot(&["a"], &[]))));
        let baseline = tracker.load_previous_state();
        assert!(!baseline.first_run);

        assert!(tracker.save_state(&snapshot(&["a", "b"], &[])));
        assert_eq!(tracker.load_previous_state().snapshot.agent_names.len(), 2);
    }
}
