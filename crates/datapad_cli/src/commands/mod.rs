//! CLI command definitions.
//!
//! This module defines the command structure for the datapad CLI. Notebooks
//! live as JSON files; every command loads one, acts on it, and writes it
//! back so code versions, outcomes, and history survive across invocations.

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use datapad_core::{Cell, CellOutcome, Notebook};
use datapad_engine::{CellReport, EngineConfig};

pub mod add;
pub mod clear;
pub mod edit;
pub mod new;
pub mod run;
pub mod show;

/// datapad - self-correcting analysis notebooks
#[derive(Parser)]
#[command(name = "datapad")]
#[command(version, about = "datapad - self-correcting analysis notebooks")]
#[command(long_about = r#"
datapad runs analysis notebooks whose cells are written by hand or generated
from natural-language intents. Failed cells are repaired automatically
against their original code, and successful cells are validated against the
intent before being accepted.

WORKFLOWS:
  new     → Create an empty notebook file
  add     → Append a cell (from a prompt or from code)
  run     → Run the whole notebook, or one cell
  edit    → Replace a cell's code and rerun it on a rebuilt namespace
  show    → Show cells, outcomes, artifacts, and findings
  clear   → Delete the notebook's saved workspace snapshot

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Cell failure
  4 - Collaborator not configured or unreachable
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create an empty notebook file
    New(new::NewArgs),

    /// Append a cell to a notebook
    Add(add::AddArgs),

    /// Run the notebook, or a single cell
    Run(run::RunArgs),

    /// Replace a cell's code and rerun it on a rebuilt namespace
    Edit(edit::EditArgs),

    /// Show cells, outcomes, artifacts, and findings
    Show(show::ShowArgs),

    /// Delete the notebook's saved workspace snapshot
    Clear(clear::ClearArgs),
}

/// Load a notebook from its JSON file.
pub fn load_notebook(path: &Path) -> Result<Notebook> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("notebook not found: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("invalid notebook file: {}", path.display()))
}

/// Write a notebook back to its JSON file.
pub fn save_notebook(path: &Path, notebook: &Notebook) -> Result<()> {
    let json = serde_json::to_string_pretty(notebook)?;
    std::fs::write(path, json).with_context(|| format!("cannot write {}", path.display()))?;
    Ok(())
}

/// Load the engine configuration, or defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(p) => Ok(EngineConfig::load(p)?),
        None => Ok(EngineConfig::default()),
    }
}

/// Resolve a cell reference: a 1-based position, or a cell id prefix.
pub fn resolve_cell(notebook: &Notebook, reference: &str) -> Result<String> {
    if let Ok(position) = reference.parse::<usize>() {
        return notebook
            .cells
            .get(position.checked_sub(1).unwrap_or(usize::MAX))
            .map(|c| c.id.clone())
            .with_context(|| format!("no cell at position {}", position));
    }
    let matches: Vec<&Cell> = notebook
        .cells
        .iter()
        .filter(|c| c.id.starts_with(reference))
        .collect();
    match matches.as_slice() {
        [cell] => Ok(cell.id.clone()),
        [] => anyhow::bail!("no cell matches '{}'", reference),
        _ => anyhow::bail!("cell reference '{}' is ambiguous", reference),
    }
}

/// Print one cell's run report.
pub fn print_report(notebook: &Notebook, report: &CellReport) {
    let position = notebook
        .position(&report.cell_id)
        .map(|p| (p + 1).to_string())
        .unwrap_or_else(|| "?".to_string());
    let marker = match report.outcome {
        CellOutcome::Success => "✅",
        CellOutcome::SuccessWithConcerns => "⚠️ ",
        CellOutcome::Failed => "❌",
    };
    println!("{} Cell {} ({:?})", marker, position, report.outcome);
    if report.repair_attempts > 0 {
        println!("   repaired after {} attempt(s)", report.repair_attempts);
    }

    match report.result.as_ref() {
        Some(result) => {
            if let Some(success) = result.success() {
                for artifact in &success.artifacts {
                    println!("   {}: {:?}", artifact.label, artifact.kind);
                }
                for line in success.console_text.lines() {
                    println!("   | {}", line);
                }
                for warning in &success.warnings {
                    println!("   ⚠️  {}", warning);
                }
            }
            if let Some(error) = result.error() {
                println!("   {}: {}", error.error_type, error.message);
            }
        }
        None => println!("   (no result)"),
    }

    if let Some(cell) = notebook.cell(&report.cell_id) {
        for record in &cell.validation {
            for finding in &record.findings {
                let tag = if finding.downgraded {
                    " (downgraded)"
                } else {
                    ""
                };
                println!(
                    "   finding [{:?}{}]: {}",
                    finding.severity, tag, finding.description
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_cell_by_position_and_prefix() {
        let mut nb = Notebook::new("t");
        let a = nb.push_cell(Cell::from_code("a = 1"));
        let b = nb.push_cell(Cell::from_code("b = 2"));

        assert_eq!(resolve_cell(&nb, "1").unwrap(), a);
        assert_eq!(resolve_cell(&nb, "2").unwrap(), b);
        assert_eq!(resolve_cell(&nb, &a[..8]).unwrap(), a);
        assert!(resolve_cell(&nb, "3").is_err());
        assert!(resolve_cell(&nb, "zz").is_err());
    }

    #[test]
    fn test_notebook_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nb.json");

        let mut nb = Notebook::new("roundtrip");
        nb.push_cell(Cell::from_prompt("plot sales"));
        save_notebook(&path, &nb).unwrap();

        let loaded = load_notebook(&path).unwrap();
        assert_eq!(loaded.id, nb.id);
        assert_eq!(loaded.cells.len(), 1);
        assert_eq!(loaded.cells[0].prompt.as_deref(), Some("plot sales"));
    }
}
