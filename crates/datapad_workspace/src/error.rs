//! Error types for workspace operations.

use datapad_core::ExecutionError;
use thiserror::Error;

/// Result type alias for workspace operations.
pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

/// Errors that can occur managing namespaces and snapshots.
#[derive(Error, Debug)]
pub enum WorkspaceError {
    /// An upstream cell failed while rebuilding a clean namespace. The live
    /// namespace is left untouched.
    #[error("Rebuild failed at cell {cell_index} ({cell_id}): {error}")]
    RebuildFailed {
        cell_index: usize,
        cell_id: String,
        error: ExecutionError,
    },

    #[error("Snapshot I/O error: {0}")]
    SnapshotIo(#[from] std::io::Error),

    #[error("Snapshot serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for WorkspaceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
