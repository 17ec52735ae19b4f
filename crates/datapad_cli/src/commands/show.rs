//! Show command - Inspect a notebook's cells, outcomes, and findings.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use datapad_core::CellOutcome;

use super::load_notebook;

#[derive(Args)]
pub struct ShowArgs {
    /// Notebook file
    pub notebook: PathBuf,

    /// Also print each cell's code
    #[arg(long)]
    pub code: bool,
}

pub async fn execute(args: ShowArgs) -> Result<()> {
    let notebook = load_notebook(&args.notebook)?;

    println!("📓 {} ({})", notebook.name, notebook.id);
    println!(
        "   created {}",
        notebook.created_at.format("%Y-%m-%d %H:%M UTC")
    );

    for (position, cell) in notebook.cells.iter().enumerate() {
        let marker = match cell.outcome {
            Some(CellOutcome::Success) => "✅",
            Some(CellOutcome::SuccessWithConcerns) => "⚠️ ",
            Some(CellOutcome::Failed) => "❌",
            None => "•",
        };
        println!("\n{} Cell {} [{}]", marker, position + 1, &cell.id[..8]);
        if let Some(prompt) = &cell.prompt {
            println!("   intent: {}", prompt);
        }
        if args.code && !cell.code.is_empty() {
            for line in cell.code.lines() {
                println!("   | {}", line);
            }
        }
        if let Some(result) = &cell.last_result {
            if let Some(success) = result.success() {
                for artifact in &success.artifacts {
                    println!("   {}: {:?}", artifact.label, artifact.kind);
                }
            }
            if let Some(error) = result.error() {
                println!("   {}: {}", error.error_type, error.message);
            }
        }
        if !cell.history.is_empty() {
            println!("   {} correction attempt(s)", cell.history.len());
        }
        for record in &cell.validation {
            for finding in &record.findings {
                println!("   finding [{:?}]: {}", finding.severity, finding.description);
            }
        }
    }
    Ok(())
}
