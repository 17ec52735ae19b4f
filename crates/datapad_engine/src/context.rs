//! Execution-context assembly for generation, repair, and validation.
//!
//! The context is always complete: every bound variable's name, type, and
//! shape, and for tabular variables every column name, with no capped
//! previews. A collaborator working from partial context cannot see what
//! already exists, so it invents or mismatches state and corrections stop
//! converging.

use datapad_core::Notebook;
use datapad_workspace::Namespace;

/// Which consumer the context is being built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextMode {
    /// Fresh code generation
    Generate,
    /// Runtime repair or clean rebuild: sees upstream cells only
    Repair,
    /// Semantic validation
    Validate,
}

/// Build the full context string for a cell.
///
/// Includes every bound variable (all columns listed for tables) and the
/// complete text of other cells' prompts and code, uncapped. In `Repair`
/// mode only cells above the target are included; a repair must never see
/// downstream state it cannot depend on.
pub fn build_context(
    notebook: &Notebook,
    cell_id: &str,
    namespace: &Namespace,
    mode: ContextMode,
) -> String {
    let mut out = String::new();

    out.push_str("## Variables\n");
    if namespace.is_empty() {
        out.push_str("(none)\n");
    }
    for (name, value) in namespace.iter() {
        let shape = value.shape();
        if shape.is_empty() {
            out.push_str(&format!("- {}: {}\n", name, value.type_name()));
        } else {
            out.push_str(&format!("- {}: {} ({})", name, value.type_name(), shape));
            if let Some(columns) = value.columns() {
                out.push_str(&format!(", columns [{}]", columns.join(", ")));
            }
            out.push('\n');
        }
    }

    out.push_str("\n## Cells\n");
    let target_pos = notebook.position(cell_id);
    for (pos, cell) in notebook.cells.iter().enumerate() {
        if cell.id == cell_id {
            continue;
        }
        // Repair and clean rebuild never look below the target cell.
        if mode == ContextMode::Repair {
            if let Some(target) = target_pos {
                if pos >= target {
                    continue;
                }
            }
        }
        out.push_str(&format!("### Cell {}\n", pos + 1));
        if let Some(prompt) = &cell.prompt {
            out.push_str(&format!("Intent: {}\n", prompt));
        }
        if !cell.code.is_empty() {
            out.push_str(&format!("```\n{}\n```\n", cell.code));
        }
    }

    out
}
