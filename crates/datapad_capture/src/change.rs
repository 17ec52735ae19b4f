//! Change detection per artifact kind.
//!
//! One explicit detector per kind, unit-tested independently of capture,
//! instead of ad-hoc "did this change" checks scattered through the diff.

use datapad_core::Value;

/// Decides whether a binding's current value counts as changed relative to
/// its pre-execution state.
pub trait ChangeDetector {
    /// `before` is the value bound to the same name before execution, if
    /// any; `after` is the current value.
    fn changed(&self, before: Option<&Value>, after: &Value) -> bool;
}

/// Change detection for tabular bindings.
///
/// A table counts as changed when it is newly bound, materially changed in
/// value, or when a *new object* was bound to the same name, even if its
/// contents are identical to the old one. A plain reassignment of the same
/// object with identical contents does not count.
#[derive(Debug, Default)]
pub struct TableChangeDetector;

impl ChangeDetector for TableChangeDetector {
    fn changed(&self, before: Option<&Value>, after: &Value) -> bool {
        let Value::Table(after_table) = after else {
            return false;
        };
        match before {
            None => true,
            Some(Value::Table(before_table)) => {
                before_table != after_table || before_table.object_id != after_table.object_id
            }
            // The name used to hold something that wasn't a table.
            Some(_) => true,
        }
    }
}

/// Change detection for figure bindings.
///
/// Figures are closed immediately after every capture, so any figure still
/// open when the sweep runs was produced by the execution being captured.
#[derive(Debug, Default)]
pub struct FigureChangeDetector;

impl ChangeDetector for FigureChangeDetector {
    fn changed(&self, _before: Option<&Value>, after: &Value) -> bool {
        matches!(after, Value::Figure(f) if f.open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datapad_core::{Figure, FigureKind, Table};

    fn table(cols: &[&str], rows: Vec<Vec<Value>>) -> Table {
        Table::new(cols.iter().map(|c| c.to_string()).collect(), rows)
    }

    #[test]
    fn test_new_binding_is_changed() {
        let t = Value::Table(table(&["a"], vec![vec![Value::Int(1)]]));
        assert!(TableChangeDetector.changed(None, &t));
    }

    #[test]
    fn test_same_object_unchanged_contents_is_not_changed() {
        let t = Value::Table(table(&["a"], vec![vec![Value::Int(1)]]));
        let same = t.clone(); // clone keeps the object id
        assert!(!TableChangeDetector.changed(Some(&t), &same));
    }

    #[test]
    fn test_new_object_with_identical_contents_is_changed() {
        let before = Value::Table(table(&["a"], vec![vec![Value::Int(1)]]));
        let after = Value::Table(table(&["a"], vec![vec![Value::Int(1)]]));
        assert!(TableChangeDetector.changed(Some(&before), &after));
    }

    #[test]
    fn test_value_change_is_changed() {
        let before = Value::Table(table(&["a"], vec![vec![Value::Int(1)]]));
        let mut after_table = match &before {
            Value::Table(t) => t.clone(),
            _ => unreachable!(),
        };
        after_table.rows.push(vec![Value::Int(2)]);
        assert!(TableChangeDetector.changed(Some(&before), &Value::Table(after_table)));
    }

    #[test]
    fn test_rebinding_from_non_table_is_changed() {
        let after = Value::Table(table(&["a"], vec![]));
        assert!(TableChangeDetector.changed(Some(&Value::Int(3)), &after));
    }

    #[test]
    fn test_open_figure_is_changed_closed_is_not() {
        let open = Value::Figure(Figure::new("f", FigureKind::Static));
        assert!(FigureChangeDetector.changed(None, &open));

        let mut closed_fig = Figure::new("f", FigureKind::Static);
        closed_fig.open = false;
        assert!(!FigureChangeDetector.changed(None, &Value::Figure(closed_fig)));
    }
}
