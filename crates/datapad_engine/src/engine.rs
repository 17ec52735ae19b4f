//! Orchestration: cell lifecycle from intent to validated result.
//!
//! The engine owns the workspace manager behind an async mutex and holds
//! the lock only while executing code or reading the namespace for context
//! assembly, never across a collaborator call. A `&mut Notebook` is
//! required for every run, so at most one execution is in flight per
//! notebook while independent notebooks proceed concurrently.

use std::sync::Arc;

use datapad_core::{
    CellId, CellOutcome, CorrectionTrigger, ExecutionResult, Notebook, NotebookId,
};
use datapad_llm::{Collaborator, GenerateRequest};
use datapad_workspace::{ScriptEvaluator, SnapshotStore, WorkspaceManager};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::context::{build_context, ContextMode};
use crate::correction::{CorrectionState, ErrorCorrectionLoop};
use crate::error::{EngineError, EngineResult};
use crate::validation::{LogicValidationLoop, ValidationState};

/// What happened to one cell in one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellReport {
    #[serde(rename = "cellId")]
    pub cell_id: CellId,
    pub outcome: CellOutcome,
    /// Terminal state of the error-correction loop
    pub correction: CorrectionState,
    /// Terminal state of the logic-validation loop, when it ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationState>,
    /// Repair attempts consumed
    #[serde(rename = "repairAttempts")]
    pub repair_attempts: u32,
    /// The final execution result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ExecutionResult>,
}

/// The self-correcting execution engine.
pub struct ExecutionEngine {
    collaborator: Arc<dyn Collaborator>,
    workspaces: Arc<Mutex<WorkspaceManager>>,
    correction: ErrorCorrectionLoop,
    validation: LogicValidationLoop,
}

impl ExecutionEngine {
    /// Build an engine over an existing workspace manager.
    pub fn new(
        collaborator: Arc<dyn Collaborator>,
        workspaces: WorkspaceManager,
        config: EngineConfig,
    ) -> Self {
        let workspaces = Arc::new(Mutex::new(workspaces));
        let correction = ErrorCorrectionLoop::new(
            Arc::clone(&collaborator),
            Arc::clone(&workspaces),
            config.clone(),
        );
        let validation = LogicValidationLoop::new(
            Arc::clone(&collaborator),
            Arc::clone(&workspaces),
            config,
        );
        Self {
            collaborator,
            workspaces,
            correction,
            validation,
        }
    }

    /// Build an engine with the script evaluator and a snapshot store under
    /// the configured directory.
    pub fn with_defaults(collaborator: Arc<dyn Collaborator>, config: EngineConfig) -> Self {
        let manager = WorkspaceManager::new(
            Arc::new(ScriptEvaluator::new()),
            SnapshotStore::new(&config.snapshot_dir),
        );
        Self::new(collaborator, manager, config)
    }

    /// Run one cell end to end: generate code if the cell has none, execute
    /// with bounded runtime repair, then validate logic when the run
    /// succeeded and the cell has an intent.
    pub async fn run_cell(
        &self,
        notebook: &mut Notebook,
        cell_id: &str,
    ) -> EngineResult<CellReport> {
        {
            let cell = notebook
                .cell_mut(cell_id)
                .ok_or_else(|| EngineError::CellNotFound(cell_id.to_string()))?;
            cell.begin_run();
        }

        if self.needs_generation(notebook, cell_id)? {
            self.generate_code(notebook, cell_id).await?;
        }

        let correction_state = self
            .correction
            .run(notebook, cell_id, CorrectionTrigger::Runtime)
            .await?;

        let (outcome, validation_state) = match correction_state {
            CorrectionState::Succeeded => {
                let vstate = self
                    .validation
                    .run(notebook, cell_id, &self.correction)
                    .await?;
                let outcome = match vstate {
                    ValidationState::Passed => CellOutcome::Success,
                    _ => CellOutcome::SuccessWithConcerns,
                };
                (outcome, Some(vstate))
            }
            _ => {
                warn!(cell = cell_id, "cell failed after exhausting repairs");
                (CellOutcome::Failed, None)
            }
        };

        let cell = notebook
            .cell_mut(cell_id)
            .ok_or_else(|| EngineError::CellNotFound(cell_id.to_string()))?;
        cell.outcome = Some(outcome);
        info!(cell = cell_id, outcome = ?outcome, attempts = cell.retry_count, "cell run finished");

        Ok(CellReport {
            cell_id: cell.id.clone(),
            outcome,
            correction: correction_state,
            validation: validation_state,
            repair_attempts: cell.retry_count,
            result: cell.last_result.clone(),
        })
    }

    /// Run every cell in order, stopping after the first cell that fails
    /// outright. Cells with unresolved concerns do not stop the run.
    pub async fn run_notebook(&self, notebook: &mut Notebook) -> EngineResult<Vec<CellReport>> {
        let cell_ids: Vec<CellId> = notebook.cells.iter().map(|c| c.id.clone()).collect();
        let mut reports = Vec::with_capacity(cell_ids.len());
        for cell_id in cell_ids {
            let report = self.run_cell(notebook, &cell_id).await?;
            let failed = report.outcome == CellOutcome::Failed;
            reports.push(report);
            if failed {
                break;
            }
        }
        Ok(reports)
    }

    /// Replace a cell's code with a user edit and rerun it on a namespace
    /// rebuilt from the cells above it, so stale bindings from the previous
    /// version cannot leak into the new run.
    pub async fn update_cell_code(
        &self,
        notebook: &mut Notebook,
        cell_id: &str,
        code: impl Into<String>,
    ) -> EngineResult<CellReport> {
        if notebook.cell(cell_id).is_none() {
            return Err(EngineError::CellNotFound(cell_id.to_string()));
        }

        {
            let mut workspaces = self.workspaces.lock().await;
            let upstream = notebook.upstream_of(cell_id);
            workspaces
                .rebuild_from_upstream(&notebook.id, &upstream)
                .await?;
        }

        let cell = notebook
            .cell_mut(cell_id)
            .ok_or_else(|| EngineError::CellNotFound(cell_id.to_string()))?;
        let code = code.into();
        // The edit is the cell's new baseline; history from the old version
        // no longer applies.
        cell.code = code.clone();
        cell.original_code = Some(code);
        cell.history.clear();

        self.run_cell(notebook, cell_id).await
    }

    /// Clear a notebook's namespace. Label counters are monotonic per
    /// notebook and deliberately survive a clear.
    pub async fn clear_namespace(&self, notebook_id: &NotebookId, clear_snapshot: bool) {
        let mut workspaces = self.workspaces.lock().await;
        workspaces.clear(notebook_id, clear_snapshot);
    }

    /// The shared workspace manager, for inspection.
    pub fn workspaces(&self) -> Arc<Mutex<WorkspaceManager>> {
        Arc::clone(&self.workspaces)
    }

    fn needs_generation(&self, notebook: &Notebook, cell_id: &str) -> EngineResult<bool> {
        let cell = notebook
            .cell(cell_id)
            .ok_or_else(|| EngineError::CellNotFound(cell_id.to_string()))?;
        if !cell.code.trim().is_empty() {
            return Ok(false);
        }
        if cell.prompt.is_none() {
            return Err(EngineError::NothingToRun(cell_id.to_string()));
        }
        Ok(true)
    }

    async fn generate_code(&self, notebook: &mut Notebook, cell_id: &str) -> EngineResult<()> {
        let intent = notebook
            .cell(cell_id)
            .and_then(|c| c.prompt.clone())
            .ok_or_else(|| EngineError::NothingToRun(cell_id.to_string()))?;
        let context = {
            let mut workspaces = self.workspaces.lock().await;
            let (namespace, _) = workspaces.get_or_create(&notebook.id);
            build_context(notebook, cell_id, namespace, ContextMode::Generate)
        };

        let reply = self
            .collaborator
            .generate(&GenerateRequest { intent, context })
            .await?;
        info!(cell = cell_id, trace = %reply.trace_id, "generated code for cell");

        let cell = notebook
            .cell_mut(cell_id)
            .ok_or_else(|| EngineError::CellNotFound(cell_id.to_string()))?;
        cell.record_generated(reply.code);
        Ok(())
    }
}
