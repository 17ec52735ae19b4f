//! Add command - Append a cell to a notebook.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use datapad_core::Cell;

use super::{load_notebook, save_notebook};

#[derive(Args)]
pub struct AddArgs {
    /// Notebook file
    pub notebook: PathBuf,

    /// Natural-language intent; code is generated on the first run
    #[arg(short, long, conflicts_with = "code")]
    pub prompt: Option<String>,

    /// Literal cell code
    #[arg(short, long)]
    pub code: Option<String>,
}

pub async fn execute(args: AddArgs) -> Result<()> {
    let mut notebook = load_notebook(&args.notebook)?;

    let cell = match (args.prompt, args.code) {
        (Some(prompt), None) => Cell::from_prompt(prompt),
        (None, Some(code)) => Cell::from_code(code),
        _ => anyhow::bail!("exactly one of --prompt or --code is required"),
    };
    let cell_id = notebook.push_cell(cell);
    save_notebook(&args.notebook, &notebook)?;

    println!(
        "➕ Added cell {} at position {}",
        &cell_id[..8],
        notebook.cells.len()
    );
    Ok(())
}
