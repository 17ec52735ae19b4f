//! The execution error-correction loop.
//!
//! Repairs runtime failures, bounded by `max_repair_attempts`. Every repair
//! call receives the cell's first-ever generated code, never a
//! previously-failed candidate: handing the collaborator an interim attempt
//! collapses its view to whatever that attempt touched, and the result is a
//! drift of single-line non-fixes.

use std::sync::Arc;

use chrono::Utc;
use datapad_core::{
    CorrectionAttempt, CorrectionTrigger, ExecutionResult, ExecutionSuccess, Notebook,
};
use datapad_llm::{Collaborator, RepairRequest};
use datapad_workspace::WorkspaceManager;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::context::{build_context, ContextMode};
use crate::error::{EngineError, EngineResult};

/// States of the error-correction loop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CorrectionState {
    /// Code exists but has not run yet
    Generated,
    /// Code is running
    Executing,
    /// The run failed
    Failed,
    /// Waiting on a repair candidate
    Repairing,
    /// The run (or a candidate) executed successfully
    Succeeded,
    /// The repair budget is spent; the last error stands
    Exhausted,
}

/// Bounded runtime-repair loop over one cell.
pub struct ErrorCorrectionLoop {
    collaborator: Arc<dyn Collaborator>,
    workspaces: Arc<Mutex<WorkspaceManager>>,
    config: EngineConfig,
}

impl ErrorCorrectionLoop {
    pub fn new(
        collaborator: Arc<dyn Collaborator>,
        workspaces: Arc<Mutex<WorkspaceManager>>,
        config: EngineConfig,
    ) -> Self {
        Self {
            collaborator,
            workspaces,
            config,
        }
    }

    /// Execute the cell's current code, repairing on failure until success
    /// or exhaustion. Returns `Succeeded` or `Exhausted`.
    pub async fn run(
        &self,
        notebook: &mut Notebook,
        cell_id: &str,
        trigger: CorrectionTrigger,
    ) -> EngineResult<CorrectionState> {
        let result = self.execute(notebook, cell_id, None).await?;
        self.repair_until_done(notebook, cell_id, trigger, result)
            .await
    }

    /// Execute a rewrite candidate (from the logic loop), falling into the
    /// same repair machinery if it fails to run. The candidate only becomes
    /// the cell's code once it executes successfully.
    pub async fn run_candidate(
        &self,
        notebook: &mut Notebook,
        cell_id: &str,
        candidate: String,
        trigger: CorrectionTrigger,
        attempt: u32,
    ) -> EngineResult<CorrectionState> {
        let result = self.execute(notebook, cell_id, Some(&candidate)).await?;
        let succeeded = result.is_success();

        let cell = notebook
            .cell_mut(cell_id)
            .ok_or_else(|| EngineError::CellNotFound(cell_id.to_string()))?;
        cell.history.push(CorrectionAttempt {
            attempt,
            trigger,
            input_code: cell.original().to_string(),
            error: result.error().cloned(),
            candidate_code: candidate.clone(),
            succeeded,
            created_at: Utc::now(),
        });
        cell.last_result = Some(result.clone());
        if succeeded {
            cell.accept_fix(candidate);
            return Ok(CorrectionState::Succeeded);
        }

        self.repair_until_done(notebook, cell_id, trigger, result)
            .await
    }

    async fn repair_until_done(
        &self,
        notebook: &mut Notebook,
        cell_id: &str,
        trigger: CorrectionTrigger,
        first_result: ExecutionResult,
    ) -> EngineResult<CorrectionState> {
        let mut result = first_result;

        loop {
            let cell = notebook
                .cell_mut(cell_id)
                .ok_or_else(|| EngineError::CellNotFound(cell_id.to_string()))?;
            cell.last_result = Some(result.clone());

            if result.is_success() {
                return Ok(CorrectionState::Succeeded);
            }
            let error = result
                .error()
                .cloned()
                .expect("failed result carries an error");

            if cell.retry_count >= self.config.max_repair_attempts {
                warn!(
                    cell = cell_id,
                    attempts = cell.retry_count,
                    error = %error,
                    "repair budget exhausted; surfacing the real error"
                );
                return Ok(CorrectionState::Exhausted);
            }

            let attempt = cell.retry_count + 1;
            let original_code = cell.original().to_string();
            let context = self.build_repair_context(notebook, cell_id).await;

            let request = RepairRequest {
                original_code,
                error_type: error.error_type.clone(),
                error_message: error.message.clone(),
                traceback: error.traceback.clone(),
                context,
                attempt,
            };
            // Suspension point: the workspace lock is not held here, so
            // other notebooks stay responsive while the collaborator works.
            let reply = self.collaborator.repair(&request).await?;
            info!(cell = cell_id, attempt, trace = %reply.trace_id, "repair candidate received");

            let candidate = reply.code;
            result = self.execute(notebook, cell_id, Some(&candidate)).await?;
            let succeeded = result.is_success();

            let cell = notebook
                .cell_mut(cell_id)
                .ok_or_else(|| EngineError::CellNotFound(cell_id.to_string()))?;
            cell.retry_count = attempt;
            cell.history.push(CorrectionAttempt {
                attempt,
                trigger,
                input_code: request.original_code,
                error: Some(error),
                candidate_code: candidate.clone(),
                succeeded,
                created_at: Utc::now(),
            });

            if succeeded {
                // The candidate ran; only now does it become the cell's code.
                cell.accept_fix(candidate);
                cell.last_result = Some(result);
                return Ok(CorrectionState::Succeeded);
            }
            // Failed candidates never overwrite cell code; the next attempt
            // starts from the original again, with the fresh error.
        }
    }

    /// Execute either the cell's current code or an explicit candidate,
    /// then capture outputs and refresh the snapshot on success.
    ///
    /// Execution precedes capture; capture precedes validation. The
    /// workspace lock is held only for this step, never across collaborator
    /// calls.
    pub(crate) async fn execute(
        &self,
        notebook: &mut Notebook,
        cell_id: &str,
        code_override: Option<&str>,
    ) -> EngineResult<ExecutionResult> {
        let code = match code_override {
            Some(code) => code.to_string(),
            None => notebook
                .cell(cell_id)
                .ok_or_else(|| EngineError::CellNotFound(cell_id.to_string()))?
                .code
                .clone(),
        };
        let notebook_id = notebook.id.clone();

        let mut workspaces = self.workspaces.lock().await;
        let pass = workspaces.run(&notebook_id, &code).await;

        if let Some(error) = pass.outcome.error {
            return Ok(ExecutionResult::Error(error));
        }

        let (after, _) = workspaces.get_or_create(&notebook_id);
        let captured = datapad_capture::capture(
            &pass.before,
            after,
            &pass.outcome.console_text,
            &pass.outcome.displays,
            &mut notebook.labels,
        );
        workspaces.save_snapshot(&notebook_id);

        let mut warnings = pass.warnings;
        warnings.extend(captured.warnings);
        Ok(ExecutionResult::Success(ExecutionSuccess {
            console_text: pass.outcome.console_text,
            artifacts: captured.artifacts,
            warnings,
        }))
    }

    async fn build_repair_context(&self, notebook: &Notebook, cell_id: &str) -> String {
        let mut workspaces = self.workspaces.lock().await;
        let (namespace, _) = workspaces.get_or_create(&notebook.id);
        build_context(notebook, cell_id, namespace, ContextMode::Repair)
    }
}
