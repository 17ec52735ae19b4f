//! # datapad_engine
//!
//! The self-correcting execution engine for datapad notebooks.
//!
//! A cell's lifecycle: build context → generate (or reuse) code → execute
//! in the notebook's namespace → capture outputs → on runtime failure, the
//! bounded error-correction loop repairs against the cell's *original*
//! code → on success, the logic-validation loop checks semantic
//! correctness (cheap heuristics first, then one external judgment call)
//! and may request a rewrite, which re-enters the error loop.
//!
//! # Architecture
//!
//! - **ContextBuilder**: complete, untruncated description of current state
//!   (every bound variable with every column name, full prior cell text)
//! - **ErrorCorrectionLoop**: Generated → Executing → Failed → Repairing →
//!   Succeeded | Exhausted, bounded by `max_repair_attempts`
//! - **LogicValidationLoop**: Validating → Passed | FailedHigh | FailedLow
//!   | Correcting | Unresolved, independently bounded, severity-gated
//! - **ExecutionEngine**: per-notebook serialization; collaborator calls
//!   are await points that never block other notebooks

pub mod config;
pub mod context;
pub mod correction;
pub mod engine;
pub mod error;
pub mod validation;

pub use config::EngineConfig;
pub use context::{build_context, ContextMode};
pub use correction::{CorrectionState, ErrorCorrectionLoop};
pub use engine::{CellReport, ExecutionEngine};
pub use error::{EngineError, EngineResult};
pub use validation::{heuristic_findings, verify_findings, LogicValidationLoop, ValidationState};
