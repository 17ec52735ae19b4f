//! Integration tests for the self-correcting execution engine.
//!
//! These tests drive the full cell lifecycle with a scripted collaborator,
//! so every generation, repair, and judgment reply is deterministic and
//! every call the engine makes can be asserted afterwards.

use std::sync::Arc;

use datapad_core::{Cell, CellOutcome, Notebook, Severity};
use datapad_engine::{CorrectionState, EngineConfig, EngineError, ExecutionEngine, ValidationState};
use datapad_llm::{
    CodeReply, Collaborator, CollaboratorCall, GenerateRequest, JudgeRequest, Judgment, LlmResult,
    RawFinding, RepairRequest, ScriptedCollaborator,
};
use datapad_workspace::{ScriptEvaluator, SnapshotStore, WorkspaceManager};
use tempfile::TempDir;

fn engine_with(
    collab: Arc<ScriptedCollaborator>,
    dir: &TempDir,
    config: EngineConfig,
) -> ExecutionEngine {
    let manager = WorkspaceManager::new(
        Arc::new(ScriptEvaluator::new()),
        SnapshotStore::new(dir.path()),
    );
    ExecutionEngine::new(collab, manager, config)
}

/// Every repair call must receive the first-ever generated code, with
/// 1-based attempt numbers, and the loop must stop exactly at the budget.
#[tokio::test]
async fn test_repair_always_receives_original_code_and_stops_at_budget() {
    let dir = TempDir::new().unwrap();
    let collab = Arc::new(ScriptedCollaborator::new());
    collab.push_generation("x = nope");
    collab.push_repair("y = still_nope");
    collab.push_repair("y = still_nope");
    collab.push_repair("y = still_nope");

    let config = EngineConfig {
        max_repair_attempts: 3,
        ..EngineConfig::default()
    };
    let engine = engine_with(collab.clone(), &dir, config);

    let mut nb = Notebook::new("t");
    let cell_id = nb.push_cell(Cell::from_prompt("compute totals"));

    let report = engine.run_cell(&mut nb, &cell_id).await.unwrap();
    assert_eq!(report.outcome, CellOutcome::Failed);
    assert_eq!(report.correction, CorrectionState::Exhausted);
    assert_eq!(report.repair_attempts, 3);
    assert_eq!(collab.repair_call_count(), 3);

    let mut expected_attempt = 1;
    for call in collab.calls() {
        if let CollaboratorCall::Repair {
            original_code,
            attempt,
            ..
        } = call
        {
            assert_eq!(original_code, "x = nope");
            assert_eq!(attempt, expected_attempt);
            expected_attempt += 1;
        }
    }

    // The surfaced error is the real last failure, not a synthesized one.
    let cell = nb.cell(&cell_id).unwrap();
    let err = cell.last_result.as_ref().unwrap().error().unwrap();
    assert_eq!(err.error_type, "NameError");
    assert!(err.message.contains("still_nope"));
    // Failed candidates never became the cell's code.
    assert_eq!(cell.code, "x = nope");
}

/// A missing-column failure repairs on the first attempt, and the repair
/// context enumerates the table's actual columns.
#[tokio::test]
async fn test_key_error_repair_sees_actual_columns() {
    let dir = TempDir::new().unwrap();
    let collab = Arc::new(ScriptedCollaborator::new());
    collab.push_repair("x = col(df, \"B\")");

    let engine = engine_with(collab.clone(), &dir, EngineConfig::default());

    let mut nb = Notebook::new("t");
    nb.push_cell(Cell::from_code("df = table([\"A\", \"B\"], [[1, 2]])"));
    let broken = nb.push_cell(Cell::from_code("x = col(df, \"C\")"));

    let reports = engine.run_notebook(&mut nb).await.unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[1].outcome, CellOutcome::Success);
    assert_eq!(reports[1].repair_attempts, 1);

    let calls = collab.calls();
    let repair = calls
        .iter()
        .find_map(|c| match c {
            CollaboratorCall::Repair {
                error_type,
                context,
                ..
            } => Some((error_type.clone(), context.clone())),
            _ => None,
        })
        .expect("a repair call was made");
    assert_eq!(repair.0, "KeyError");
    assert!(repair.1.contains("columns [A, B]"));

    let cell = nb.cell(&broken).unwrap();
    assert_eq!(cell.code, "x = col(df, \"B\")");
    assert_eq!(cell.original(), "x = col(df, \"C\")");
}

/// Generation, execution, and a passing judgment produce a clean success
/// with a labeled artifact.
#[tokio::test]
async fn test_generated_cell_passes_validation() {
    let dir = TempDir::new().unwrap();
    let collab = Arc::new(ScriptedCollaborator::new());
    collab.push_generation("summary = table([\"mean_a\"], [[2.0]])\nprint(\"done\")");
    collab.push_judgment(Judgment::pass("t1"));

    let engine = engine_with(collab.clone(), &dir, EngineConfig::default());

    let mut nb = Notebook::new("t");
    let cell_id = nb.push_cell(Cell::from_prompt("mean of column a as a table"));

    let report = engine.run_cell(&mut nb, &cell_id).await.unwrap();
    assert_eq!(report.outcome, CellOutcome::Success);
    assert_eq!(report.validation, Some(ValidationState::Passed));

    let success = report.result.as_ref().unwrap().success().unwrap();
    assert_eq!(success.artifacts.len(), 1);
    assert_eq!(success.artifacts[0].label, "Table 1");
    assert_eq!(success.console_text, "done\n");
}

/// Artifact labels are sequential across cells within a notebook, never
/// restarting per cell.
#[tokio::test]
async fn test_labels_are_sequential_across_cells() {
    let dir = TempDir::new().unwrap();
    let collab = Arc::new(ScriptedCollaborator::new());
    let engine = engine_with(collab, &dir, EngineConfig::default());

    let mut nb = Notebook::new("t");
    nb.push_cell(Cell::from_code("t1 = table([\"a\"], [[1]])"));
    nb.push_cell(Cell::from_code("t2 = table([\"b\"], [[2]])"));
    nb.push_cell(Cell::from_code("t3 = table([\"c\"], [[3]])"));

    let reports = engine.run_notebook(&mut nb).await.unwrap();
    let labels: Vec<String> = reports
        .iter()
        .map(|r| {
            r.result.as_ref().unwrap().success().unwrap().artifacts[0]
                .label
                .clone()
        })
        .collect();
    assert_eq!(labels, vec!["Table 1", "Table 2", "Table 3"]);
}

/// Editing a cell rebuilds the namespace from upstream cells only, so
/// bindings from the replaced version cannot leak into the new run.
#[tokio::test]
async fn test_update_cell_code_rebuilds_without_stale_bindings() {
    let dir = TempDir::new().unwrap();
    let collab = Arc::new(ScriptedCollaborator::new());
    let engine = engine_with(collab, &dir, EngineConfig::default());

    let mut nb = Notebook::new("t");
    nb.push_cell(Cell::from_code("a = 1"));
    let edited = nb.push_cell(Cell::from_code("stale = 9"));
    engine.run_notebook(&mut nb).await.unwrap();

    let report = engine
        .update_cell_code(&mut nb, &edited, "b = a + 1")
        .await
        .unwrap();
    assert_eq!(report.outcome, CellOutcome::Success);

    let workspaces = engine.workspaces();
    let guard = workspaces.lock().await;
    let ns = guard.namespace(&nb.id).unwrap();
    assert!(ns.contains("a"));
    assert!(ns.contains("b"));
    assert!(!ns.contains("stale"));
}

/// A heuristic miss (intent wants a figure, none produced) triggers a
/// rewrite without spending a judgment call; the judge only runs once the
/// heuristics are quiet.
#[tokio::test]
async fn test_heuristic_failure_short_circuits_the_judge() {
    let dir = TempDir::new().unwrap();
    let collab = Arc::new(ScriptedCollaborator::new());
    collab.push_generation("sales = table([\"m\"], [[1]])");
    collab.push_repair("f = figure(\"sales by month\")\nshow(f)");
    collab.push_judgment(Judgment::pass("t1"));

    let engine = engine_with(collab.clone(), &dir, EngineConfig::default());

    let mut nb = Notebook::new("t");
    let cell_id = nb.push_cell(Cell::from_prompt("plot sales by month"));

    let report = engine.run_cell(&mut nb, &cell_id).await.unwrap();
    assert_eq!(report.outcome, CellOutcome::Success);
    assert_eq!(report.validation, Some(ValidationState::Passed));

    // Exactly one rewrite and one judge call, in that order.
    let kinds: Vec<&'static str> = collab
        .calls()
        .iter()
        .map(|c| match c {
            CollaboratorCall::Generate { .. } => "generate",
            CollaboratorCall::Repair { .. } => "repair",
            CollaboratorCall::Judge { .. } => "judge",
        })
        .collect();
    assert_eq!(kinds, vec!["generate", "repair", "judge"]);

    let rewrite_error_type = collab
        .calls()
        .iter()
        .find_map(|c| match c {
            CollaboratorCall::Repair { error_type, .. } => Some(error_type.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(rewrite_error_type, "LogicError");

    // Two validation passes were recorded: the heuristic miss and the
    // post-rewrite judgment.
    let cell = nb.cell(&cell_id).unwrap();
    assert_eq!(cell.validation.len(), 2);
    assert!(!cell.validation[0].passed);
    assert!(cell.validation[1].passed);
}

/// Findings whose evidence cannot be located verbatim are downgraded and
/// recorded without triggering a rewrite.
#[tokio::test]
async fn test_unverifiable_finding_downgrades_to_recorded_only() {
    let dir = TempDir::new().unwrap();
    let collab = Arc::new(ScriptedCollaborator::new());
    collab.push_generation("total = 41\nprint(total)");
    collab.push_judgment(Judgment::fail(
        vec![RawFinding {
            severity: Severity::High,
            description: "total looks off by one".to_string(),
            evidence: "this text appears nowhere".to_string(),
        }],
        "t1",
    ));

    let engine = engine_with(collab.clone(), &dir, EngineConfig::default());

    let mut nb = Notebook::new("t");
    let cell_id = nb.push_cell(Cell::from_prompt("summarize totals"));

    let report = engine.run_cell(&mut nb, &cell_id).await.unwrap();
    assert_eq!(report.outcome, CellOutcome::SuccessWithConcerns);
    assert_eq!(report.validation, Some(ValidationState::FailedLow));
    assert_eq!(collab.repair_call_count(), 0);

    let cell = nb.cell(&cell_id).unwrap();
    let finding = &cell.validation[0].findings[0];
    assert_eq!(finding.severity, Severity::Medium);
    assert!(finding.downgraded);
}

/// When a rewrite never executes cleanly, the cell keeps the result that
/// did run and surfaces the open findings instead of losing the output.
#[tokio::test]
async fn test_unresolved_validation_keeps_working_result() {
    let dir = TempDir::new().unwrap();
    let collab = Arc::new(ScriptedCollaborator::new());
    collab.push_generation("x = 1\nprint(x)");
    collab.push_judgment(Judgment::fail(
        vec![RawFinding {
            severity: Severity::High,
            description: "prints the wrong variable".to_string(),
            evidence: "print(x)".to_string(),
        }],
        "t1",
    ));
    collab.push_repair("z = nope");

    let config = EngineConfig {
        max_repair_attempts: 0,
        max_validation_attempts: 1,
        ..EngineConfig::default()
    };
    let engine = engine_with(collab.clone(), &dir, config);

    let mut nb = Notebook::new("t");
    let cell_id = nb.push_cell(Cell::from_prompt("analyze"));

    let report = engine.run_cell(&mut nb, &cell_id).await.unwrap();
    assert_eq!(report.outcome, CellOutcome::SuccessWithConcerns);
    assert_eq!(report.validation, Some(ValidationState::Unresolved));

    let cell = nb.cell(&cell_id).unwrap();
    let success = cell.last_result.as_ref().unwrap().success().unwrap();
    assert_eq!(success.console_text, "1\n");
    // The broken rewrite never became the cell's code.
    assert_eq!(cell.code, "x = 1\nprint(x)");
}

/// A failing cell stops the notebook run; later cells are not executed.
#[tokio::test]
async fn test_run_notebook_stops_after_a_failed_cell() {
    let dir = TempDir::new().unwrap();
    let collab = Arc::new(ScriptedCollaborator::new());
    collab.push_repair("still = nope");

    let config = EngineConfig {
        max_repair_attempts: 1,
        ..EngineConfig::default()
    };
    let engine = engine_with(collab, &dir, config);

    let mut nb = Notebook::new("t");
    nb.push_cell(Cell::from_code("a = 1"));
    nb.push_cell(Cell::from_code("b = nope"));
    nb.push_cell(Cell::from_code("c = 3"));

    let reports = engine.run_notebook(&mut nb).await.unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].outcome, CellOutcome::Success);
    assert_eq!(reports[1].outcome, CellOutcome::Failed);
}

/// Collaborator unavailability surfaces as an error; the engine never
/// fabricates a fix on its behalf.
#[tokio::test]
async fn test_collaborator_failure_propagates() {
    let dir = TempDir::new().unwrap();
    // Nothing queued: the first repair call fails.
    let collab = Arc::new(ScriptedCollaborator::new());
    let engine = engine_with(collab, &dir, EngineConfig::default());

    let mut nb = Notebook::new("t");
    let cell_id = nb.push_cell(Cell::from_code("x = nope"));

    let err = engine.run_cell(&mut nb, &cell_id).await.unwrap_err();
    assert!(matches!(err, EngineError::Llm(_)));
}

/// A cell with neither code nor a prompt has nothing to run.
#[tokio::test]
async fn test_empty_cell_without_prompt_is_an_error() {
    let dir = TempDir::new().unwrap();
    let collab = Arc::new(ScriptedCollaborator::new());
    let engine = engine_with(collab, &dir, EngineConfig::default());

    let mut nb = Notebook::new("t");
    let cell_id = nb.push_cell(Cell::from_code(""));

    let err = engine.run_cell(&mut nb, &cell_id).await.unwrap_err();
    assert!(matches!(err, EngineError::NothingToRun(_)));
}

mod mocked {
    use super::*;

    mockall::mock! {
        pub Collab {}

        #[async_trait::async_trait]
        impl Collaborator for Collab {
            async fn generate(&self, req: &GenerateRequest) -> LlmResult<CodeReply>;
            async fn repair(&self, req: &RepairRequest) -> LlmResult<CodeReply>;
            async fn judge(&self, req: &JudgeRequest) -> LlmResult<Judgment>;
        }
    }

    /// With the rewrite budget at zero, a heuristic failure goes straight
    /// to unresolved: no judge call, no repair call.
    #[tokio::test]
    async fn test_zero_rewrite_budget_never_calls_judge_or_repair() {
        let dir = TempDir::new().unwrap();

        let mut collab = MockCollab::new();
        collab.expect_generate().times(1).returning(|_| {
            Ok(CodeReply {
                code: "sales = table([\"m\"], [[1]])".to_string(),
                trace_id: "g1".to_string(),
            })
        });
        collab.expect_judge().times(0);
        collab.expect_repair().times(0);

        let config = EngineConfig {
            max_validation_attempts: 0,
            ..EngineConfig::default()
        };
        let manager = WorkspaceManager::new(
            Arc::new(ScriptEvaluator::new()),
            SnapshotStore::new(dir.path()),
        );
        let engine = ExecutionEngine::new(Arc::new(collab), manager, config);

        let mut nb = Notebook::new("t");
        let cell_id = nb.push_cell(Cell::from_prompt("plot sales"));

        let report = engine.run_cell(&mut nb, &cell_id).await.unwrap();
        assert_eq!(report.outcome, CellOutcome::SuccessWithConcerns);
        assert_eq!(report.validation, Some(ValidationState::Unresolved));
    }
}
