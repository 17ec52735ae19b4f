//! New command - Create an empty notebook file.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use datapad_core::Notebook;

use super::save_notebook;

#[derive(Args)]
pub struct NewArgs {
    /// Display name for the notebook
    pub name: String,

    /// Output file (defaults to <name>.json)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub async fn execute(args: NewArgs) -> Result<()> {
    let path = args
        .output
        .unwrap_or_else(|| PathBuf::from(format!("{}.json", args.name.replace(' ', "_"))));
    if path.exists() {
        anyhow::bail!("refusing to overwrite existing file: {}", path.display());
    }

    let notebook = Notebook::new(&args.name);
    save_notebook(&path, &notebook)?;
    println!("📓 Created notebook '{}' at {}", args.name, path.display());
    println!("   id: {}", notebook.id);
    Ok(())
}
