//! Edit command - Replace a cell's code and rerun it.
//!
//! The rerun happens on a namespace rebuilt from the cells above the
//! edited one, so bindings from the replaced version cannot leak in.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use datapad_core::CellOutcome;
use datapad_engine::ExecutionEngine;
use datapad_llm::LiveCollaborator;

use super::{load_config, load_notebook, print_report, resolve_cell, save_notebook};

#[derive(Args)]
pub struct EditArgs {
    /// Notebook file
    pub notebook: PathBuf,

    /// Cell to edit (1-based position or id prefix)
    pub cell: String,

    /// The replacement code
    #[arg(short, long)]
    pub code: String,

    /// Engine configuration file (JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub async fn execute(args: EditArgs) -> Result<()> {
    let mut notebook = load_notebook(&args.notebook)?;
    let cell_id = resolve_cell(&notebook, &args.cell)?;
    let config = load_config(args.config.as_deref())?;
    let collaborator = Arc::new(LiveCollaborator::from_env()?);
    let engine = ExecutionEngine::with_defaults(collaborator, config);

    let report = engine
        .update_cell_code(&mut notebook, &cell_id, args.code)
        .await?;
    save_notebook(&args.notebook, &notebook)?;
    print_report(&notebook, &report);

    if report.outcome == CellOutcome::Failed {
        anyhow::bail!("cell failure: edited cell failed");
    }
    Ok(())
}
