//! Run command - Run a notebook end to end, or one cell.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use datapad_core::CellOutcome;
use datapad_engine::ExecutionEngine;
use datapad_llm::LiveCollaborator;
use tracing::info;

use super::{load_config, load_notebook, print_report, resolve_cell, save_notebook};

#[derive(Args)]
pub struct RunArgs {
    /// Notebook file
    pub notebook: PathBuf,

    /// Run only this cell (1-based position or id prefix)
    #[arg(short, long)]
    pub cell: Option<String>,

    /// Engine configuration file (JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub async fn execute(args: RunArgs) -> Result<()> {
    let mut notebook = load_notebook(&args.notebook)?;
    let config = load_config(args.config.as_deref())?;
    let collaborator = Arc::new(LiveCollaborator::from_env()?);
    let engine = ExecutionEngine::with_defaults(collaborator, config);

    info!("Running notebook: {}", notebook.name);

    let reports = match &args.cell {
        Some(reference) => {
            let cell_id = resolve_cell(&notebook, reference)?;
            vec![engine.run_cell(&mut notebook, &cell_id).await?]
        }
        None => engine.run_notebook(&mut notebook).await?,
    };

    // Persist before reporting failure: repaired code and history must
    // survive even when the run ends badly.
    save_notebook(&args.notebook, &notebook)?;

    for report in &reports {
        print_report(&notebook, report);
    }

    let failed = reports
        .iter()
        .filter(|r| r.outcome == CellOutcome::Failed)
        .count();
    if failed > 0 {
        anyhow::bail!("cell failure: {} cell(s) failed", failed);
    }
    Ok(())
}
