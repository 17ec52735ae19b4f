//! Dynamic value model for executed analysis code.
//!
//! Values live in a notebook's namespace and are what the capture subsystem
//! diffs. Tables and figures carry a per-allocation object id so that a *new
//! object* bound to an existing name is detectable even when its contents are
//! identical to the previous value.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a fresh object identity.
///
/// Ids are process-local and monotonically increasing; they are never
/// persisted, so a snapshot round-trip yields a new identity (a restored
/// binding counts as a new object, which is the conservative choice for
/// change detection).
pub fn next_object_id() -> u64 {
    NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Kind of figure produced by executed code.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FigureKind {
    /// Rendered once, static image semantics
    Static,
    /// Interactive widget semantics
    Interactive,
}

/// A figure object held in a namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    /// Per-allocation identity (not persisted)
    #[serde(skip, default = "next_object_id")]
    pub object_id: u64,
    /// Figure title
    pub title: String,
    /// Static or interactive
    pub kind: FigureKind,
    /// Whether the figure is still open (eligible for the implicit sweep)
    pub open: bool,
}

impl Figure {
    /// Create a new open figure.
    pub fn new(title: impl Into<String>, kind: FigureKind) -> Self {
        Self {
            object_id: next_object_id(),
            title: title.into(),
            kind,
            open: true,
        }
    }
}

impl PartialEq for Figure {
    fn eq(&self, other: &Self) -> bool {
        // Value equality ignores object identity and open state.
        self.title == other.title && self.kind == other.kind
    }
}

/// A tabular value: named columns over row-major cells.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    /// Per-allocation identity (not persisted)
    #[serde(skip, default = "next_object_id")]
    pub object_id: u64,
    /// Column names, in order
    pub columns: Vec<String>,
    /// Row-major cells; every row has `columns.len()` entries
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Create a new table from columns and rows.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            object_id: next_object_id(),
            columns,
            rows,
        }
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Index of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Human-readable shape, e.g. `"3 rows x 2 cols"`.
    pub fn shape(&self) -> String {
        format!("{} rows x {} cols", self.row_count(), self.column_count())
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        // Value equality ignores object identity.
        self.columns == other.columns && self.rows == other.rows
    }
}

/// A value bound in a notebook namespace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Temporal value; `None` is a missing/undefined timestamp and renders
    /// as `null`, never as an error.
    Timestamp(Option<DateTime<Utc>>),
    List(Vec<Value>),
    Table(Table),
    Figure(Figure),
    /// A builtin function bound by name; never snapshotted.
    Callable(String),
    /// An imported module marker; never snapshotted.
    Module(String),
}

impl Value {
    /// Type name as shown in execution context listings.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Timestamp(_) => "timestamp",
            Self::List(_) => "list",
            Self::Table(_) => "table",
            Self::Figure(_) => "figure",
            Self::Callable(_) => "callable",
            Self::Module(_) => "module",
        }
    }

    /// Shape description for context listings; empty for scalars.
    pub fn shape(&self) -> String {
        match self {
            Self::List(items) => format!("len {}", items.len()),
            Self::Table(t) => t.shape(),
            _ => String::new(),
        }
    }

    /// Column names for tabular values.
    pub fn columns(&self) -> Option<&[String]> {
        match self {
            Self::Table(t) => Some(&t.columns),
            _ => None,
        }
    }

    /// Whether this value can be written to a snapshot.
    ///
    /// Modules, callables, and open figures (live handles) are excluded.
    pub fn is_snapshotable(&self) -> bool {
        !matches!(
            self,
            Self::Callable(_) | Self::Module(_) | Self::Figure(Figure { open: true, .. })
        )
    }

    /// Object identity for change detection; `None` for plain values.
    pub fn object_id(&self) -> Option<u64> {
        match self {
            Self::Table(t) => Some(t.object_id),
            Self::Figure(f) => Some(f.object_id),
            _ => None,
        }
    }

    /// Render this value as console/cell text.
    ///
    /// Temporal values render via RFC 3339; missing temporal values render
    /// as `null`.
    pub fn render(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => {
                if f.fract() == 0.0 && f.is_finite() {
                    format!("{:.1}", f)
                } else {
                    f.to_string()
                }
            }
            Self::Str(s) => s.clone(),
            Self::Timestamp(Some(t)) => t.to_rfc3339(),
            Self::Timestamp(None) => "null".to_string(),
            Self::List(items) => {
                let rendered: Vec<String> = items.iter().map(|v| v.render()).collect();
                format!("[{}]", rendered.join(", "))
            }
            Self::Table(t) => format!("<table {}>", t.shape()),
            Self::Figure(f) => format!("<figure '{}'>", f.title),
            Self::Callable(name) => format!("<callable {}>", name),
            Self::Module(name) => format!("<module {}>", name),
        }
    }

    /// Truthiness used by filters and conditions.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null | Self::Timestamp(None) => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::List(items) => !items.is_empty(),
            Self::Table(t) => !t.rows.is_empty(),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_new_object_same_value_differs_by_identity() {
        let a = Table::new(vec!["x".to_string()], vec![vec![Value::Int(1)]]);
        let b = Table::new(vec!["x".to_string()], vec![vec![Value::Int(1)]]);
        assert_eq!(a, b);
        assert_ne!(a.object_id, b.object_id);
    }

    #[test]
    fn test_missing_timestamp_renders_null() {
        assert_eq!(Value::Timestamp(None).render(), "null");
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(Value::Timestamp(Some(t)).render(), "2024-03-01T12:00:00+00:00");
    }

    #[test]
    fn test_snapshotability() {
        assert!(Value::Int(3).is_snapshotable());
        assert!(Value::Timestamp(None).is_snapshotable());
        assert!(!Value::Callable("mean".to_string()).is_snapshotable());
        assert!(!Value::Module("stats".to_string()).is_snapshotable());
        let open = Figure::new("f", FigureKind::Static);
        assert!(!Value::Figure(open).is_snapshotable());
        let mut closed = Figure::new("f", FigureKind::Static);
        closed.open = false;
        assert!(Value::Figure(closed).is_snapshotable());
    }

    #[test]
    fn test_table_shape_and_columns() {
        let t = Table::new(
            vec!["a".to_string(), "b".to_string()],
            vec![vec![Value::Int(1), Value::Int(2)]],
        );
        assert_eq!(t.shape(), "1 rows x 2 cols");
        let v = Value::Table(t);
        assert_eq!(v.columns().unwrap(), &["a".to_string(), "b".to_string()]);
        assert_eq!(v.type_name(), "table");
    }

    #[test]
    fn test_snapshot_roundtrip_assigns_fresh_identity() {
        let t = Table::new(vec!["x".to_string()], vec![vec![Value::Int(1)]]);
        let before = t.object_id;
        let json = serde_json::to_string(&Value::Table(t)).unwrap();
        let restored: Value = serde_json::from_str(&json).unwrap();
        assert_ne!(restored.object_id(), Some(before));
    }
}
