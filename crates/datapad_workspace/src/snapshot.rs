//! Best-effort namespace persistence for restart recovery.
//!
//! Snapshots are a cache, never the source of truth while the process is
//! alive: they are written after every successful execution and read once,
//! lazily, on the first access to a namespace after a restart.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use datapad_core::{NotebookId, Value};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::WorkspaceResult;
use crate::namespace::Namespace;

/// A binding excluded from a snapshot, with the reason.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkippedBinding {
    pub name: String,
    pub reason: String,
}

/// Serialized subset of a namespace plus the skip manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Notebook this snapshot belongs to
    #[serde(rename = "notebookId")]
    pub notebook_id: NotebookId,
    /// When the snapshot was written
    #[serde(rename = "savedAt")]
    pub saved_at: DateTime<Utc>,
    /// Serializable bindings
    pub bindings: Vec<(String, Value)>,
    /// Bindings that could not be serialized, with reasons
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedBinding>,
}

/// Filesystem snapshot store, one JSON blob per notebook.
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Create a store rooted at `dir`. The directory is created on first
    /// write, not here.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the snapshot blob for a notebook.
    pub fn path_for(&self, notebook_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", notebook_id))
    }

    /// Serialize a namespace and write it, returning the snapshot (including
    /// the skip manifest) that was persisted.
    pub fn save(&self, notebook_id: &str, namespace: &Namespace) -> WorkspaceResult<Snapshot> {
        let mut bindings = Vec::new();
        let mut skipped = Vec::new();

        for (name, value) in namespace.iter() {
            if value.is_snapshotable() {
                bindings.push((name.clone(), value.clone()));
            } else {
                skipped.push(SkippedBinding {
                    name: name.clone(),
                    reason: skip_reason(value),
                });
            }
        }

        let snapshot = Snapshot {
            notebook_id: notebook_id.to_string(),
            saved_at: Utc::now(),
            bindings,
            skipped,
        };

        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(notebook_id);
        let json = serde_json::to_string_pretty(&snapshot)?;
        fs::write(&path, json)?;
        debug!(notebook = notebook_id, path = %path.display(), "saved namespace snapshot");
        Ok(snapshot)
    }

    /// Load the snapshot for a notebook, if one exists.
    pub fn load(&self, notebook_id: &str) -> WorkspaceResult<Option<Snapshot>> {
        let path = self.path_for(notebook_id);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        let snapshot: Snapshot = serde_json::from_str(&content)?;
        Ok(Some(snapshot))
    }

    /// Delete a notebook's snapshot, if present.
    pub fn delete(&self, notebook_id: &str) -> WorkspaceResult<()> {
        let path = self.path_for(notebook_id);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// Root directory of the store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Snapshot {
    /// Rebuild a namespace from this snapshot's bindings.
    pub fn restore(&self) -> Namespace {
        let mut ns = Namespace::new();
        for (name, value) in &self.bindings {
            ns.set(name.clone(), value.clone());
        }
        ns
    }
}

fn skip_reason(value: &Value) -> String {
    match value {
        Value::Callable(_) => "callable binding".to_string(),
        Value::Module(_) => "module binding".to_string(),
        Value::Figure(_) => "open figure handle".to_string(),
        other => format!("non-serializable {}", other.type_name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datapad_core::{Figure, FigureKind, Table};
    use tempfile::TempDir;

    fn sample_namespace() -> Namespace {
        let mut ns = Namespace::new();
        ns.set("n", Value::Int(7));
        ns.set(
            "df",
            Value::Table(Table::new(
                vec!["a".to_string()],
                vec![vec![Value::Int(1)]],
            )),
        );
        ns.set("stats", Value::Module("stats".to_string()));
        ns.set("mean_fn", Value::Callable("mean".to_string()));
        ns.set("fig", Value::Figure(Figure::new("trend", FigureKind::Static)));
        ns
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        let ns = sample_namespace();

        let saved = store.save("nb-1", &ns).unwrap();
        assert_eq!(saved.bindings.len(), 2);

        let loaded = store.load("nb-1").unwrap().unwrap();
        let restored = loaded.restore();
        assert_eq!(restored.get("n"), Some(&Value::Int(7)));
        assert!(restored.contains("df"));
        assert!(!restored.contains("stats"));
        assert!(!restored.contains("fig"));
    }

    #[test]
    fn test_skip_manifest_names_every_excluded_binding() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        let saved = store.save("nb-1", &sample_namespace()).unwrap();

        let mut skipped: Vec<(&str, &str)> = saved
            .skipped
            .iter()
            .map(|s| (s.name.as_str(), s.reason.as_str()))
            .collect();
        skipped.sort();
        assert_eq!(
            skipped,
            vec![
                ("fig", "open figure handle"),
                ("mean_fn", "callable binding"),
                ("stats", "module binding"),
            ]
        );
    }

    #[test]
    fn test_load_missing_returns_none() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        assert!(store.load("nope").unwrap().is_none());
    }

    #[test]
    fn test_delete_removes_blob() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        store.save("nb-1", &sample_namespace()).unwrap();
        store.delete("nb-1").unwrap();
        assert!(store.load("nb-1").unwrap().is_none());
    }

    #[test]
    fn test_corrupt_snapshot_is_an_error_not_a_panic() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        fs::create_dir_all(dir.path()).unwrap();
        fs::write(store.path_for("nb-1"), "{not json").unwrap();
        assert!(store.load("nb-1").is_err());
    }
}
