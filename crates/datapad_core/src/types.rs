//! Core types for notebooks, cells, execution results, and history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Unique identifier for a notebook.
pub type NotebookId = String;

/// Unique identifier for a cell.
pub type CellId = String;

/// Kind of captured artifact.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ArtifactKind {
    Table,
    Figure,
    InteractiveFigure,
}

impl ArtifactKind {
    /// Label family this kind draws sequence numbers from.
    ///
    /// Static and interactive figures share the "Figure" sequence; tables
    /// have their own.
    pub fn label_family(&self) -> &'static str {
        match self {
            Self::Table => "Table",
            Self::Figure | Self::InteractiveFigure => "Figure",
        }
    }
}

/// How an artifact came to be captured.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Registered by executed code via an explicit display call
    Explicit,
    /// Detected via namespace delta after execution
    Implicit,
    /// Parsed out of console text as a last resort
    Console,
}

/// A captured, displayable result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Artifact {
    /// Table, figure, or interactive figure
    pub kind: ArtifactKind,
    /// Sequential label, e.g. "Table 3"
    pub label: String,
    /// Explicit, implicit, or console
    pub provenance: Provenance,
    /// The captured value
    pub payload: Value,
}

/// Per-notebook label counters, scoped separately per label family.
///
/// Counters only ever increase; labels never restart per cell.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LabelCounters {
    tables: u32,
    figures: u32,
}

impl LabelCounters {
    /// Produce the next label for an artifact kind, e.g. "Table 3".
    pub fn next(&mut self, kind: ArtifactKind) -> String {
        let n = match kind {
            ArtifactKind::Table => {
                self.tables += 1;
                self.tables
            }
            ArtifactKind::Figure | ArtifactKind::InteractiveFigure => {
                self.figures += 1;
                self.figures
            }
        };
        format!("{} {}", kind.label_family(), n)
    }
}

/// A runtime failure from executing cell code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionError {
    /// Error class, e.g. "NameError", "KeyError", "SyntaxError"
    #[serde(rename = "errorType")]
    pub error_type: String,
    /// Human-readable message
    pub message: String,
    /// Traceback text including the offending line
    pub traceback: String,
}

impl ExecutionError {
    pub fn new(
        error_type: impl Into<String>,
        message: impl Into<String>,
        traceback: impl Into<String>,
    ) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
            traceback: traceback.into(),
        }
    }
}

impl std::fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_type, self.message)
    }
}

/// A successful execution: console text plus captured artifacts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExecutionSuccess {
    /// Raw console text, whitespace preserved
    #[serde(rename = "consoleText")]
    pub console_text: String,
    /// Captured artifacts in capture order
    pub artifacts: Vec<Artifact>,
    /// Non-fatal warnings (snapshot load failures, skipped bindings, ...)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Result of executing one cell, replaced (not appended) each run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ExecutionResult {
    Success(ExecutionSuccess),
    Error(ExecutionError),
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The error payload, if this result is a failure.
    pub fn error(&self) -> Option<&ExecutionError> {
        match self {
            Self::Error(e) => Some(e),
            Self::Success(_) => None,
        }
    }

    /// The success payload, if any.
    pub fn success(&self) -> Option<&ExecutionSuccess> {
        match self {
            Self::Success(s) => Some(s),
            Self::Error(_) => None,
        }
    }
}

/// User-visible outcome for a cell: exactly one of these per run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CellOutcome {
    /// Executed and validated clean
    Success,
    /// Executed, but logic concerns remain unresolved
    SuccessWithConcerns,
    /// Failed; carries the real last error in `last_result`
    Failed,
}

/// What triggered a correction attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CorrectionTrigger {
    /// Exception or parse failure at execution time
    Runtime,
    /// Semantic/logical failure found after a successful run
    Logic,
}

/// One repair attempt, recorded for observability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionAttempt {
    /// 1-based attempt number within its loop
    pub attempt: u32,
    /// Runtime or logic failure
    pub trigger: CorrectionTrigger,
    /// The code supplied to the collaborator (always the cell's original)
    #[serde(rename = "inputCode")]
    pub input_code: String,
    /// The failure that triggered this attempt, if a runtime error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionError>,
    /// The candidate code the collaborator returned
    #[serde(rename = "candidateCode")]
    pub candidate_code: String,
    /// Whether the candidate executed successfully
    pub succeeded: bool,
    /// When the attempt completed
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Severity of a logic finding.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// One-level downgrade; Low stays Low.
    pub fn downgrade(self) -> Self {
        match self {
            Self::High => Self::Medium,
            Self::Medium | Self::Low => Self::Low,
        }
    }
}

/// A single logic finding from validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Finding {
    pub severity: Severity,
    pub description: String,
    /// Literal excerpt from the supplied code or output, or "none"
    pub evidence: String,
    /// Set when unverifiable evidence forced a severity downgrade
    #[serde(default)]
    pub downgraded: bool,
}

/// Which validation stage produced a record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStage {
    /// Deterministic heuristics, no external call
    Heuristic,
    /// External semantic-judgment call
    Judgment,
}

/// One validation pass over a successful execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub stage: ValidationStage,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<Finding>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// A single notebook cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    /// Unique cell ID (UUID)
    pub id: CellId,
    /// Natural-language intent, when the cell was generated from one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Current executable text
    pub code: String,
    /// First-ever generated code for this cell, set once and never
    /// overwritten; this is what repair receives on every attempt
    #[serde(rename = "originalCode", skip_serializing_if = "Option::is_none")]
    pub original_code: Option<String>,
    /// Repair attempts consumed in the current run
    #[serde(rename = "retryCount", default)]
    pub retry_count: u32,
    /// Result of the most recent run (replaced, never appended)
    #[serde(rename = "lastResult", skip_serializing_if = "Option::is_none")]
    pub last_result: Option<ExecutionResult>,
    /// User-visible outcome of the most recent run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<CellOutcome>,
    /// Ordered correction attempts across both loops
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<CorrectionAttempt>,
    /// Validation passes for the most recent successful run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation: Vec<ValidationRecord>,
}

impl Cell {
    /// Create an empty cell from an intent.
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            prompt: Some(prompt.into()),
            code: String::new(),
            original_code: None,
            retry_count: 0,
            last_result: None,
            outcome: None,
            history: Vec::new(),
            validation: Vec::new(),
        }
    }

    /// Create a cell with author-written code (no prompt).
    pub fn from_code(code: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            prompt: None,
            original_code: Some(code.clone()),
            code,
            retry_count: 0,
            last_result: None,
            outcome: None,
            history: Vec::new(),
            validation: Vec::new(),
        }
    }

    /// Record freshly generated code.
    ///
    /// The first generation is retained as `original_code` for the lifetime
    /// of the cell; later generations (logic rewrites) update `code` only.
    pub fn record_generated(&mut self, code: impl Into<String>) {
        let code = code.into();
        if self.original_code.is_none() {
            self.original_code = Some(code.clone());
        }
        self.code = code;
    }

    /// The code repair must always receive: the first-ever generated
    /// version, never an interim mutated attempt.
    pub fn original(&self) -> &str {
        self.original_code.as_deref().unwrap_or(&self.code)
    }

    /// Accept a candidate fix. Called only after the candidate has
    /// successfully executed.
    pub fn accept_fix(&mut self, code: impl Into<String>) {
        self.code = code.into();
    }

    /// Reset per-run bookkeeping before a fresh run.
    pub fn begin_run(&mut self) {
        self.retry_count = 0;
        self.outcome = None;
        self.validation.clear();
    }
}

/// An ordered sequence of cells owning one workspace namespace by identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notebook {
    /// Unique notebook ID (UUID)
    pub id: NotebookId,
    /// Display name
    pub name: String,
    /// Cells in execution order
    pub cells: Vec<Cell>,
    /// Per-notebook artifact label counters
    #[serde(default)]
    pub labels: LabelCounters,
    /// When the notebook was created
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Notebook {
    /// Create an empty notebook.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            cells: Vec::new(),
            labels: LabelCounters::default(),
            created_at: Utc::now(),
        }
    }

    /// Append a cell and return its id.
    pub fn push_cell(&mut self, cell: Cell) -> CellId {
        let id = cell.id.clone();
        self.cells.push(cell);
        id
    }

    /// Position of a cell by id.
    pub fn position(&self, cell_id: &str) -> Option<usize> {
        self.cells.iter().position(|c| c.id == cell_id)
    }

    /// Borrow a cell by id.
    pub fn cell(&self, cell_id: &str) -> Option<&Cell> {
        self.cells.iter().find(|c| c.id == cell_id)
    }

    /// Mutably borrow a cell by id.
    pub fn cell_mut(&mut self, cell_id: &str) -> Option<&mut Cell> {
        self.cells.iter_mut().find(|c| c.id == cell_id)
    }

    /// Cells strictly above the given cell, in order. Never includes the
    /// cell itself or anything below it.
    pub fn upstream_of(&self, cell_id: &str) -> Vec<&Cell> {
        match self.position(cell_id) {
            Some(pos) => self.cells[..pos].iter().collect(),
            None => Vec::new(),
        }
    }
}
