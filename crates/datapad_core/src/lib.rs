//! # datapad_core
//!
//! Shared data model for the datapad execution engine.
//!
//! This crate defines the vocabulary the rest of the workspace speaks:
//! notebooks and cells, the interpreter value model, execution results and
//! artifacts, and the correction/validation history that explains how a
//! cell's final code version came to be.
//!
//! # Architecture
//!
//! - **Notebook/Cell**: ordered cells, each carrying its prompt, current
//!   code, and the first-ever generated code (retained separately so repair
//!   always sees the original, never an interim mutated attempt)
//! - **Value**: the dynamic value model executed code operates on (tables,
//!   figures, timestamps, scalars) with per-allocation object identity
//! - **ExecutionResult/Artifact**: what a run produced, with provenance and
//!   sequential labels
//! - **History**: `CorrectionAttempt` and `ValidationRecord` entries for
//!   observability

pub mod types;
pub mod value;

pub use types::{
    Artifact, ArtifactKind, Cell, CellId, CellOutcome, CorrectionAttempt, CorrectionTrigger,
    ExecutionError, ExecutionResult, ExecutionSuccess, Finding, LabelCounters, Notebook,
    NotebookId, Provenance, Severity, ValidationRecord, ValidationStage,
};
pub use value::{Figure, FigureKind, Table, Value};
