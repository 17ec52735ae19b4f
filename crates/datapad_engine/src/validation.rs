//! The logic-validation loop.
//!
//! Runs after a cell executes successfully and decides whether the result
//! actually serves the user's intent. Stage one is deterministic
//! heuristics; only when they find nothing does stage two spend a judgment
//! call. Judged findings carry evidence, and evidence that cannot be
//! located verbatim in the code or console output costs the finding one
//! severity level: an unverifiable claim must not be able to trigger a
//! rewrite on its own.
//!
//! The rewrite budget is independent of the runtime-repair budget. When
//! the budget runs out with findings still open, the cell keeps its last
//! working result and the findings are surfaced, never silently dropped.

use std::sync::Arc;

use chrono::Utc;
use datapad_core::{
    ArtifactKind, CorrectionTrigger, ExecutionSuccess, Finding, Notebook, ValidationRecord,
    ValidationStage,
};
use datapad_llm::{Collaborator, JudgeRequest, RawFinding, RepairRequest, Verdict};
use datapad_workspace::WorkspaceManager;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::context::{build_context, ContextMode};
use crate::correction::{CorrectionState, ErrorCorrectionLoop};
use crate::error::{EngineError, EngineResult};

/// States of the logic-validation loop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ValidationState {
    /// A validation pass is in progress
    Validating,
    /// No findings remain
    Passed,
    /// Findings at an auto-correcting severity; a rewrite will be requested
    FailedHigh,
    /// Findings below the auto-correct threshold; recorded, not corrected
    FailedLow,
    /// A rewrite candidate is being produced and executed
    Correcting,
    /// The rewrite budget is spent with findings still open
    Unresolved,
}

/// Deterministic pre-judgment checks on a successful execution.
///
/// These never call out anywhere, and every hit is High severity: a
/// heuristic failure short-circuits straight past the judgment call to a
/// rewrite.
pub fn heuristic_findings(intent: &str, success: &ExecutionSuccess) -> Vec<Finding> {
    let mut findings = Vec::new();
    let intent_lower = intent.to_lowercase();

    let wants_figure = ["plot", "chart", "graph", "figure", "visuali"]
        .iter()
        .any(|kw| intent_lower.contains(kw));
    let figure_count = success
        .artifacts
        .iter()
        .filter(|a| a.kind != ArtifactKind::Table)
        .count();
    if wants_figure && figure_count == 0 {
        findings.push(Finding {
            severity: datapad_core::Severity::High,
            description: "the intent asks for a figure but the execution produced none"
                .to_string(),
            evidence: "none".to_string(),
            downgraded: false,
        });
    }

    let wants_table = intent_lower.contains("table");
    let table_count = success
        .artifacts
        .iter()
        .filter(|a| a.kind == ArtifactKind::Table)
        .count();
    if wants_table && table_count == 0 {
        let description = if success.console_text.trim().is_empty() {
            "the intent asks for a table but the execution produced none"
        } else {
            "tabular output appears only as console text, not as a structured display"
        };
        findings.push(Finding {
            severity: datapad_core::Severity::High,
            description: description.to_string(),
            evidence: "none".to_string(),
            downgraded: false,
        });
    }

    let wants_test = ["t-test", "t test", "significan", "hypothesis", "p-value"]
        .iter()
        .any(|kw| intent_lower.contains(kw));
    if wants_test {
        let statistic_visible = success.console_text.contains("statistic")
            || success.console_text.contains("p_value")
            || success.artifacts.iter().any(|a| match &a.payload {
                datapad_core::Value::Table(t) => t
                    .columns
                    .iter()
                    .any(|c| c == "statistic" || c == "p_value"),
                _ => false,
            });
        if !statistic_visible {
            findings.push(Finding {
                severity: datapad_core::Severity::High,
                description:
                    "a statistical test was requested but no test statistic or probability value is visible"
                        .to_string(),
                evidence: "none".to_string(),
                downgraded: false,
            });
        }
    }

    if success.artifacts.is_empty() && success.console_text.trim().is_empty() {
        findings.push(Finding {
            severity: datapad_core::Severity::High,
            description: "execution produced no artifacts and no console output".to_string(),
            evidence: "none".to_string(),
            downgraded: false,
        });
    }

    findings
}

/// Verify judged findings against what was actually supplied.
///
/// Evidence must be a literal excerpt of the code or console output. A
/// finding whose evidence is "none", blank, or not found anywhere is
/// downgraded one severity level and flagged.
pub fn verify_findings(raw: Vec<RawFinding>, code: &str, console: &str) -> Vec<Finding> {
    raw.into_iter()
        .map(|f| {
            let evidence = f.evidence.trim();
            let verifiable = !evidence.is_empty()
                && evidence != "none"
                && (code.contains(evidence) || console.contains(evidence));
            if verifiable {
                Finding {
                    severity: f.severity,
                    description: f.description,
                    evidence: f.evidence,
                    downgraded: false,
                }
            } else {
                debug!(
                    description = %f.description,
                    "finding evidence not found verbatim; downgrading"
                );
                Finding {
                    severity: f.severity.downgrade(),
                    description: f.description,
                    evidence: f.evidence,
                    downgraded: true,
                }
            }
        })
        .collect()
}

/// Bounded semantic-validation loop over one successfully-executed cell.
pub struct LogicValidationLoop {
    collaborator: Arc<dyn Collaborator>,
    workspaces: Arc<Mutex<WorkspaceManager>>,
    config: EngineConfig,
}

impl LogicValidationLoop {
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

    /// Validate the cell's last successful result against its intent,
    /// requesting rewrites for high-severity findings until the result
    /// passes or the rewrite budget runs out.
    ///
    /// Returns `Passed`, `FailedLow`, or `Unresolved`.
    pub async fn run(
        &self,
        notebook: &mut Notebook,
        cell_id: &str,
        correction: &ErrorCorrectionLoop,
    ) -> EngineResult<ValidationState> {
        // Author-written cells carry no intent to validate against.
        let Some(intent) = notebook.cell(cell_id).and_then(|c| c.prompt.clone()) else {
            return Ok(ValidationState::Passed);
        };

        let mut rewrites = 0u32;
        loop {
            let (code, success) = {
                let cell = notebook
                    .cell(cell_id)
                    .ok_or_else(|| EngineError::CellNotFound(cell_id.to_string()))?;
                let success = match cell.last_result.as_ref().and_then(|r| r.success()) {
                    Some(s) => s.clone(),
                    None => {
                        debug!(cell = cell_id, "no successful result to validate");
                        return Ok(ValidationState::Passed);
                    }
                };
                (cell.code.clone(), success)
            };

            debug!(cell = cell_id, state = ?ValidationState::Validating, rewrite = rewrites);
            let findings = self
                .validate_once(notebook, cell_id, &intent, &code, &success)
                .await?;
            if findings.is_empty() {
                info!(cell = cell_id, "validation passed");
                return Ok(ValidationState::Passed);
            }

            let needs_rewrite = findings.iter().any(|f| self.config.auto_corrects(f.severity));
            if !needs_rewrite {
                info!(
                    cell = cell_id,
                    findings = findings.len(),
                    "findings below auto-correct threshold; recorded only"
                );
                return Ok(ValidationState::FailedLow);
            }

            info!(cell = cell_id, state = ?ValidationState::FailedHigh, findings = findings.len());
            if rewrites >= self.config.max_validation_attempts {
                warn!(
                    cell = cell_id,
                    rewrites, "rewrite budget exhausted; keeping last working result"
                );
                return Ok(ValidationState::Unresolved);
            }
            rewrites += 1;

            debug!(cell = cell_id, state = ?ValidationState::Correcting, rewrite = rewrites);
            let working = notebook
                .cell(cell_id)
                .and_then(|c| c.last_result.clone());
            let request = self
                .rewrite_request(notebook, cell_id, &findings, rewrites)
                .await?;
            let reply = self.collaborator.repair(&request).await?;

            // The rewrite gets its own full runtime-repair budget.
            if let Some(cell) = notebook.cell_mut(cell_id) {
                cell.retry_count = 0;
            }
            let state = correction
                .run_candidate(notebook, cell_id, reply.code, CorrectionTrigger::Logic, rewrites)
                .await?;
            match state {
                CorrectionState::Succeeded => continue,
                _ => {
                    // The rewrite never ran cleanly. The user keeps the
                    // result that did run; the open findings stand.
                    if let Some(cell) = notebook.cell_mut(cell_id) {
                        cell.last_result = working;
                    }
                    return Ok(ValidationState::Unresolved);
                }
            }
        }
    }

    /// One validation pass: heuristics, then (only if they find nothing)
    /// the judgment call. Records the pass on the cell.
    async fn validate_once(
        &self,
        notebook: &mut Notebook,
        cell_id: &str,
        intent: &str,
        code: &str,
        success: &ExecutionSuccess,
    ) -> EngineResult<Vec<Finding>> {
        let heuristics = heuristic_findings(intent, success);
        let (stage, findings) = if !heuristics.is_empty() {
            debug!(cell = cell_id, hits = heuristics.len(), "heuristics short-circuit the judge");
            (ValidationStage::Heuristic, heuristics)
        } else {
            let table_count = success
                .artifacts
                .iter()
                .filter(|a| a.kind == ArtifactKind::Table)
                .count();
            let request = JudgeRequest {
                intent: intent.to_string(),
                code: code.to_string(),
                console_text: success.console_text.clone(),
                table_count,
                figure_count: success.artifacts.len() - table_count,
            };
            let judgment = self.collaborator.judge(&request).await?;
            match judgment.verdict {
                Verdict::Pass => (ValidationStage::Judgment, Vec::new()),
                Verdict::Fail { findings: raw } => (
                    ValidationStage::Judgment,
                    verify_findings(raw, code, &success.console_text),
                ),
            }
        };

        let cell = notebook
            .cell_mut(cell_id)
            .ok_or_else(|| EngineError::CellNotFound(cell_id.to_string()))?;
        cell.validation.push(ValidationRecord {
            stage,
            passed: findings.is_empty(),
            findings: findings.clone(),
            created_at: Utc::now(),
        });
        Ok(findings)
    }

    async fn rewrite_request(
        &self,
        notebook: &Notebook,
        cell_id: &str,
        findings: &[Finding],
        attempt: u32,
    ) -> EngineResult<RepairRequest> {
        let cell = notebook
            .cell(cell_id)
            .ok_or_else(|| EngineError::CellNotFound(cell_id.to_string()))?;
        let message = findings
            .iter()
            .map(|f| f.description.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        let detail = findings
            .iter()
            .map(|f| format!("- [{:?}] {}: {}", f.severity, f.description, f.evidence))
            .collect::<Vec<_>>()
            .join("\n");
        let context = {
            let mut workspaces = self.workspaces.lock().await;
            let (namespace, _) = workspaces.get_or_create(&notebook.id);
            build_context(notebook, cell_id, namespace, ContextMode::Validate)
        };
        Ok(RepairRequest {
            original_code: cell.original().to_string(),
            error_type: "LogicError".to_string(),
            error_message: message,
            traceback: detail,
            context,
            attempt,
        })
    }
}
