//! The capture pipeline: explicit registrations, namespace diff, console
//! fallback.

use std::collections::HashSet;

use datapad_core::{Artifact, ArtifactKind, FigureKind, LabelCounters, Provenance, Value};
use datapad_workspace::{DisplayCall, Namespace};
use tracing::debug;

use crate::change::{ChangeDetector, FigureChangeDetector, TableChangeDetector};
use crate::console::parse_console_table;

/// Captured artifacts plus non-fatal warnings.
#[derive(Debug, Default)]
pub struct CaptureOutcome {
    pub artifacts: Vec<Artifact>,
    pub warnings: Vec<String>,
}

fn figure_artifact_kind(kind: FigureKind) -> ArtifactKind {
    match kind {
        FigureKind::Static => ArtifactKind::Figure,
        FigureKind::Interactive => ArtifactKind::InteractiveFigure,
    }
}

/// Capture all artifacts produced by one execution.
///
/// `before` is the namespace as it was before the cell ran; `after` is the
/// live namespace (mutated here: captured figures are closed). `displays`
/// are the explicit registrations made during execution, in order. Labels
/// are drawn from the notebook's counters and never restart per cell.
pub fn capture(
    before: &Namespace,
    after: &mut Namespace,
    console_text: &str,
    displays: &[DisplayCall],
    labels: &mut LabelCounters,
) -> CaptureOutcome {
    let mut out = CaptureOutcome::default();
    let mut claimed: HashSet<u64> = HashSet::new();

    // (a) Explicit registrations, in registration order.
    for display in displays {
        let kind = match &display.value {
            Value::Table(t) => {
                claimed.insert(t.object_id);
                ArtifactKind::Table
            }
            Value::Figure(f) => {
                claimed.insert(f.object_id);
                figure_artifact_kind(f.kind)
            }
            other => {
                out.warnings.push(format!(
                    "show() of {} value is not displayable; ignored",
                    other.type_name()
                ));
                continue;
            }
        };
        let label = display
            .label
            .clone()
            .unwrap_or_else(|| labels.next(kind));
        out.artifacts.push(Artifact {
            kind,
            label,
            provenance: Provenance::Explicit,
            payload: display.value.clone(),
        });
    }

    // Close explicitly shown figures so later sweeps cannot re-capture them.
    for (_, value) in after.iter_mut() {
        if let Value::Figure(f) = value {
            if claimed.contains(&f.object_id) {
                f.open = false;
            }
        }
    }

    // (b) Implicit capture via namespace diff: tables first (name order),
    // then the open-figure sweep.
    let table_detector = TableChangeDetector;
    let mut implicit_tables = Vec::new();
    for (name, value) in after.iter() {
        let Value::Table(t) = value else { continue };
        if claimed.contains(&t.object_id) {
            continue;
        }
        if table_detector.changed(before.get(name), value) {
            implicit_tables.push(value.clone());
        }
    }
    for value in implicit_tables {
        out.artifacts.push(Artifact {
            kind: ArtifactKind::Table,
            label: labels.next(ArtifactKind::Table),
            provenance: Provenance::Implicit,
            payload: value,
        });
    }

    let figure_detector = FigureChangeDetector;
    for (name, value) in after.iter_mut() {
        let is_capturable = {
            let current: &Value = value;
            matches!(current, Value::Figure(f) if !claimed.contains(&f.object_id))
                && figure_detector.changed(before.get(name), current)
        };
        if !is_capturable {
            continue;
        }
        if let Value::Figure(f) = value {
            out.artifacts.push(Artifact {
                kind: figure_artifact_kind(f.kind),
                label: labels.next(figure_artifact_kind(f.kind)),
                provenance: Provenance::Implicit,
                payload: Value::Figure(f.clone()),
            });
            // Release immediately so a later broader sweep can't re-capture.
            f.open = false;
        }
    }

    // (c) Console fallback, only when nothing else applied.
    if out.artifacts.is_empty() && !console_text.trim().is_empty() {
        if let Some(table) = parse_console_table(console_text) {
            debug!("captured table from console text fallback");
            out.artifacts.push(Artifact {
                kind: ArtifactKind::Table,
                label: labels.next(ArtifactKind::Table),
                provenance: Provenance::Console,
                payload: Value::Table(table),
            });
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use datapad_core::{Figure, Table};

    fn table_value(cols: &[&str], rows: Vec<Vec<Value>>) -> Value {
        Value::Table(Table::new(
            cols.iter().map(|c| c.to_string()).collect(),
            rows,
        ))
    }

    #[test]
    fn test_explicit_artifact_is_never_also_implicit() {
        let before = Namespace::new();
        let mut after = Namespace::new();
        let df = table_value(&["a"], vec![vec![Value::Int(1)]]);
        after.set("df", df.clone());

        let displays = vec![DisplayCall {
            value: df,
            label: None,
        }];
        let mut labels = LabelCounters::default();
        let out = capture(&before, &mut after, "", &displays, &mut labels);

        assert_eq!(out.artifacts.len(), 1);
        assert_eq!(out.artifacts[0].provenance, Provenance::Explicit);
        assert_eq!(out.artifacts[0].label, "Table 1");
    }

    #[test]
    fn test_implicit_table_capture_on_new_binding() {
        let before = Namespace::new();
        let mut after = Namespace::new();
        after.set("df", table_value(&["a"], vec![vec![Value::Int(1)]]));

        let mut labels = LabelCounters::default();
        let out = capture(&before, &mut after, "", &[], &mut labels);

        assert_eq!(out.artifacts.len(), 1);
        assert_eq!(out.artifacts[0].kind, ArtifactKind::Table);
        assert_eq!(out.artifacts[0].provenance, Provenance::Implicit);
    }

    #[test]
    fn test_unchanged_table_is_not_recaptured() {
        let df = table_value(&["a"], vec![vec![Value::Int(1)]]);
        let mut before = Namespace::new();
        before.set("df", df.clone());
        let mut after = Namespace::new();
        after.set("df", df); // same object id, same contents

        let mut labels = LabelCounters::default();
        let out = capture(&before, &mut after, "", &[], &mut labels);
        assert!(out.artifacts.is_empty());
    }

    #[test]
    fn test_new_object_same_name_same_contents_is_captured() {
        let mut before = Namespace::new();
        before.set("df", table_value(&["a"], vec![vec![Value::Int(1)]]));
        let mut after = Namespace::new();
        after.set("df", table_value(&["a"], vec![vec![Value::Int(1)]]));

        let mut labels = LabelCounters::default();
        let out = capture(&before, &mut after, "", &[], &mut labels);
        assert_eq!(out.artifacts.len(), 1);
    }

    #[test]
    fn test_figures_are_closed_after_capture_and_not_reswept() {
        let before = Namespace::new();
        let mut after = Namespace::new();
        after.set("fig", Value::Figure(Figure::new("trend", FigureKind::Static)));

        let mut labels = LabelCounters::default();
        let out = capture(&before, &mut after, "", &[], &mut labels);
        assert_eq!(out.artifacts.len(), 1);
        assert_eq!(out.artifacts[0].kind, ArtifactKind::Figure);
        assert_eq!(out.artifacts[0].label, "Figure 1");

        // The figure is now closed in the namespace; a second capture pass
        // (e.g. the next cell) must not see it again.
        let before_next = after.clone();
        let out2 = capture(&before_next, &mut after, "", &[], &mut labels);
        assert!(out2.artifacts.is_empty());
    }

    #[test]
    fn test_interactive_figures_share_the_figure_sequence() {
        let before = Namespace::new();
        let mut after = Namespace::new();
        after.set("a", Value::Figure(Figure::new("s", FigureKind::Static)));
        after.set(
            "b",
            Value::Figure(Figure::new("i", FigureKind::Interactive)),
        );

        let mut labels = LabelCounters::default();
        let out = capture(&before, &mut after, "", &[], &mut labels);
        let labels_seen: Vec<&str> = out.artifacts.iter().map(|a| a.label.as_str()).collect();
        assert_eq!(labels_seen, vec!["Figure 1", "Figure 2"]);
        assert_eq!(out.artifacts[1].kind, ArtifactKind::InteractiveFigure);
    }

    #[test]
    fn test_console_fallback_only_when_nothing_else_applies() {
        let before = Namespace::new();
        let mut after = Namespace::new();
        let console = "region  revenue\nnorth  120\n";

        let mut labels = LabelCounters::default();
        let out = capture(&before, &mut after, console, &[], &mut labels);
        assert_eq!(out.artifacts.len(), 1);
        assert_eq!(out.artifacts[0].provenance, Provenance::Console);

        // With an implicit table present, console text is not parsed.
        let mut after2 = Namespace::new();
        after2.set("df", table_value(&["a"], vec![vec![Value::Int(1)]]));
        let out2 = capture(&before, &mut after2, console, &[], &mut labels);
        assert_eq!(out2.artifacts.len(), 1);
        assert_eq!(out2.artifacts[0].provenance, Provenance::Implicit);
    }

    #[test]
    fn test_labels_continue_across_captures() {
        let mut labels = LabelCounters::default();
        let before = Namespace::new();

        for i in 0..3i64 {
            let mut after = Namespace::new();
            after.set(
                format!("df{}", i),
                table_value(&["a"], vec![vec![Value::Int(i)]]),
            );
            let out = capture(&before, &mut after, "", &[], &mut labels);
            assert_eq!(out.artifacts[0].label, format!("Table {}", i + 1));
        }
    }

    #[test]
    fn test_non_displayable_explicit_value_warns() {
        let before = Namespace::new();
        let mut after = Namespace::new();
        let displays = vec![DisplayCall {
            value: Value::Int(42),
            label: None,
        }];
        let mut labels = LabelCounters::default();
        let out = capture(&before, &mut after, "", &displays, &mut labels);
        assert!(out.artifacts.is_empty());
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn test_author_label_is_respected_and_counter_not_consumed() {
        let before = Namespace::new();
        let mut after = Namespace::new();
        let df = table_value(&["a"], vec![vec![Value::Int(1)]]);
        let displays = vec![
            DisplayCall {
                value: df.clone(),
                label: Some("Sales overview".to_string()),
            },
            DisplayCall {
                value: table_value(&["b"], vec![]),
                label: None,
            },
        ];
        let mut labels = LabelCounters::default();
        let out = capture(&before, &mut after, "", &displays, &mut labels);
        assert_eq!(out.artifacts[0].label, "Sales overview");
        assert_eq!(out.artifacts[1].label, "Table 1");
    }
}
