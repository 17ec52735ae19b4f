//! # datapad_workspace
//!
//! Per-notebook workspace namespaces for the datapad execution engine.
//!
//! This crate owns the mutable evaluation environment each notebook's code
//! runs against:
//!
//! - **Namespace**: the binding environment itself, one per notebook, never
//!   shared across notebooks
//! - **Evaluator**: the pluggable execution capability; the shipped variant
//!   is a trusted in-process interpreter for the datapad analysis script
//!   language (sandboxed-subprocess and remote-worker variants are
//!   extension points)
//! - **WorkspaceManager**: creation, clearing, eviction, and clean rebuild
//!   from upstream cells
//! - **SnapshotStore**: best-effort JSON persistence for restart recovery,
//!   with a manifest of skipped bindings

pub mod error;
pub mod evaluator;
pub mod manager;
pub mod namespace;
pub mod snapshot;

pub use error::{WorkspaceError, WorkspaceResult};
pub use evaluator::{DisplayCall, EvalOutcome, Evaluator, ScriptEvaluator};
pub use manager::WorkspaceManager;
pub use namespace::Namespace;
pub use snapshot::{SkippedBinding, Snapshot, SnapshotStore};
