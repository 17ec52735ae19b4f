//! Error types for the execution engine.

use thiserror::Error;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while running cells.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Cell not found: {0}")]
    CellNotFound(String),

    #[error("Cell {0} has no code and no prompt to generate from")]
    NothingToRun(String),

    /// The collaborator is unavailable or returned unusable output. The
    /// engine reports this state explicitly; it never substitutes
    /// fabricated code or verdicts.
    #[error("Collaborator error: {0}")]
    Llm(#[from] datapad_llm::LlmError),

    #[error("Workspace error: {0}")]
    Workspace(#[from] datapad_workspace::WorkspaceError),

    #[error("Configuration error: {0}")]
    Config(String),
}
