//! Per-notebook namespace lifecycle: create, restore, clear, evict, rebuild.

use std::collections::HashMap;
use std::sync::Arc;

use datapad_core::{Cell, NotebookId};
use tracing::{debug, info, warn};

use crate::error::{WorkspaceError, WorkspaceResult};
use crate::evaluator::{EvalOutcome, Evaluator};
use crate::namespace::Namespace;
use crate::snapshot::SnapshotStore;

/// One full evaluation pass through a notebook's namespace.
#[derive(Debug)]
pub struct ExecutionPass {
    /// Copy of the namespace as it was before execution (capture diffs
    /// against this)
    pub before: Namespace,
    /// The evaluation outcome
    pub outcome: EvalOutcome,
    /// Non-fatal warnings raised while preparing the namespace
    pub warnings: Vec<String>,
}

/// Owns every notebook's namespace, keyed strictly by notebook identity.
///
/// An explicit map with create/evict lifecycle hooks; nothing is shared
/// across notebooks. A namespace lives for the process lifetime (or until
/// cleared) and is lazily restored from its snapshot on first access after
/// a restart.
pub struct WorkspaceManager {
    evaluator: Arc<dyn Evaluator>,
    snapshots: SnapshotStore,
    namespaces: HashMap<NotebookId, Namespace>,
}

impl WorkspaceManager {
    /// Create a manager with the given evaluator and snapshot store.
    pub fn new(evaluator: Arc<dyn Evaluator>, snapshots: SnapshotStore) -> Self {
        Self {
            evaluator,
            snapshots,
            namespaces: HashMap::new(),
        }
    }

    /// Get the namespace for a notebook, creating it if needed.
    ///
    /// On first access the snapshot store is consulted; a load failure is
    /// non-fatal (the namespace starts empty and a warning is returned).
    pub fn get_or_create(&mut self, notebook_id: &str) -> (&mut Namespace, Vec<String>) {
        let mut warnings = Vec::new();

        if !self.namespaces.contains_key(notebook_id) {
            let namespace = match self.snapshots.load(notebook_id) {
                Ok(Some(snapshot)) => {
                    debug!(
                        notebook = notebook_id,
                        bindings = snapshot.bindings.len(),
                        "restored namespace from snapshot"
                    );
                    snapshot.restore()
                }
                Ok(None) => Namespace::new(),
                Err(e) => {
                    warn!(notebook = notebook_id, error = %e, "snapshot load failed; starting empty");
                    warnings.push(format!("snapshot load failed: {}", e));
                    Namespace::new()
                }
            };
            self.namespaces.insert(notebook_id.to_string(), namespace);
        }

        (
            self.namespaces
                .get_mut(notebook_id)
                .expect("namespace inserted above"),
            warnings,
        )
    }

    /// Execute `code` against the notebook's namespace, returning the
    /// outcome alongside a pre-execution copy for capture diffing.
    pub async fn run(&mut self, notebook_id: &str, code: &str) -> ExecutionPass {
        let evaluator = Arc::clone(&self.evaluator);
        let (namespace, warnings) = self.get_or_create(notebook_id);
        let before = namespace.clone();
        let outcome = evaluator.execute(code, namespace).await;
        ExecutionPass {
            before,
            outcome,
            warnings,
        }
    }

    /// Persist the current namespace. Failures are absorbed and logged; the
    /// snapshot store is a cache, never the source of truth.
    pub fn save_snapshot(&self, notebook_id: &str) {
        let Some(namespace) = self.namespaces.get(notebook_id) else {
            return;
        };
        if let Err(e) = self.snapshots.save(notebook_id, namespace) {
            warn!(notebook = notebook_id, error = %e, "snapshot write failed");
        }
    }

    /// Clear a notebook's bindings, optionally deleting its snapshot too.
    pub fn clear(&mut self, notebook_id: &str, clear_snapshot: bool) {
        if let Some(namespace) = self.namespaces.get_mut(notebook_id) {
            namespace.clear();
        }
        if clear_snapshot {
            if let Err(e) = self.snapshots.delete(notebook_id) {
                warn!(notebook = notebook_id, error = %e, "snapshot delete failed");
            }
        }
        info!(notebook = notebook_id, clear_snapshot, "cleared namespace");
    }

    /// Evict a notebook's in-memory namespace. The snapshot (if any) stays,
    /// so the next access restores from it.
    pub fn evict(&mut self, notebook_id: &str) {
        self.namespaces.remove(notebook_id);
        debug!(notebook = notebook_id, "evicted namespace");
    }

    /// Replay the given upstream cells into a fresh namespace and, only if
    /// every one succeeds, replace the notebook's live namespace with it.
    ///
    /// Captures nothing and persists nothing. On any replay failure the
    /// rebuild aborts, reporting which cell failed, and the prior namespace
    /// is left untouched.
    pub async fn rebuild_from_upstream(
        &mut self,
        notebook_id: &str,
        upstream: &[&Cell],
    ) -> WorkspaceResult<()> {
        let mut fresh = Namespace::new();

        for (index, cell) in upstream.iter().enumerate() {
            let outcome = self.evaluator.execute(&cell.code, &mut fresh).await;
            if let Some(error) = outcome.error {
                return Err(WorkspaceError::RebuildFailed {
                    cell_index: index,
                    cell_id: cell.id.clone(),
                    error,
                });
            }
        }

        info!(
            notebook = notebook_id,
            cells = upstream.len(),
            bindings = fresh.len(),
            "rebuilt namespace from upstream cells"
        );
        self.namespaces.insert(notebook_id.to_string(), fresh);
        Ok(())
    }

    /// Read-only view of a namespace, if it exists in memory.
    pub fn namespace(&self, notebook_id: &str) -> Option<&Namespace> {
        self.namespaces.get(notebook_id)
    }

    /// The underlying snapshot store.
    pub fn snapshot_store(&self) -> &SnapshotStore {
        &self.snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::ScriptEvaluator;
    use datapad_core::Value;
    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> WorkspaceManager {
        WorkspaceManager::new(
            Arc::new(ScriptEvaluator::new()),
            SnapshotStore::new(dir.path()),
        )
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated_per_notebook() {
        let dir = TempDir::new().unwrap();
        let mut mgr = manager(&dir);

        let pass = mgr.run("nb-a", "secret = 42").await;
        assert!(pass.outcome.is_success());

        let (ns_b, _) = mgr.get_or_create("nb-b");
        assert!(!ns_b.contains("secret"));
        assert!(mgr.namespace("nb-a").unwrap().contains("secret"));
    }

    #[tokio::test]
    async fn test_lazy_restore_after_eviction() {
        let dir = TempDir::new().unwrap();
        let mut mgr = manager(&dir);

        mgr.run("nb-1", "x = 10").await;
        mgr.save_snapshot("nb-1");
        mgr.evict("nb-1");
        assert!(mgr.namespace("nb-1").is_none());

        let (ns, warnings) = mgr.get_or_create("nb-1");
        assert!(warnings.is_empty());
        assert_eq!(ns.get("x"), Some(&Value::Int(10)));
    }

    #[tokio::test]
    async fn test_snapshot_load_failure_is_nonfatal() {
        let dir = TempDir::new().unwrap();
        let mut mgr = manager(&dir);
        std::fs::write(mgr.snapshot_store().path_for("nb-1"), "{broken").unwrap();

        let (ns, warnings) = mgr.get_or_create("nb-1");
        assert!(ns.is_empty());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("snapshot load failed"));
    }

    #[tokio::test]
    async fn test_rebuild_replays_only_upstream() {
        let dir = TempDir::new().unwrap();
        let mut mgr = manager(&dir);

        // Simulate stale downstream state from a prior run.
        mgr.run("nb-1", "upstream = 1\nstale_downstream = 99").await;

        let cells = vec![Cell::from_code("upstream = 1")];
        let refs: Vec<&Cell> = cells.iter().collect();
        mgr.rebuild_from_upstream("nb-1", &refs).await.unwrap();

        let ns = mgr.namespace("nb-1").unwrap();
        assert!(ns.contains("upstream"));
        assert!(!ns.contains("stale_downstream"));
    }

    #[tokio::test]
    async fn test_rebuild_failure_leaves_prior_namespace_untouched() {
        let dir = TempDir::new().unwrap();
        let mut mgr = manager(&dir);

        mgr.run("nb-1", "keep = 1").await;

        let cells = vec![Cell::from_code("ok = 1"), Cell::from_code("boom = nope")];
        let refs: Vec<&Cell> = cells.iter().collect();
        let err = mgr.rebuild_from_upstream("nb-1", &refs).await.unwrap_err();

        match err {
            WorkspaceError::RebuildFailed {
                cell_index, error, ..
            } => {
                assert_eq!(cell_index, 1);
                assert_eq!(error.error_type, "NameError");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let ns = mgr.namespace("nb-1").unwrap();
        assert!(ns.contains("keep"));
        assert!(!ns.contains("ok"));
    }

    #[tokio::test]
    async fn test_rebuild_does_not_write_snapshot() {
        let dir = TempDir::new().unwrap();
        let mut mgr = manager(&dir);

        let cells = vec![Cell::from_code("a = 1")];
        let refs: Vec<&Cell> = cells.iter().collect();
        mgr.rebuild_from_upstream("nb-1", &refs).await.unwrap();

        assert!(!mgr.snapshot_store().path_for("nb-1").exists());
    }

    #[tokio::test]
    async fn test_clear_keeps_snapshot_unless_asked() {
        let dir = TempDir::new().unwrap();
        let mut mgr = manager(&dir);

        mgr.run("nb-1", "x = 1").await;
        mgr.save_snapshot("nb-1");

        mgr.clear("nb-1", false);
        assert!(mgr.namespace("nb-1").unwrap().is_empty());
        assert!(mgr.snapshot_store().load("nb-1").unwrap().is_some());

        mgr.clear("nb-1", true);
        assert!(mgr.snapshot_store().load("nb-1").unwrap().is_none());
    }
}
