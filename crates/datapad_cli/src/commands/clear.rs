//! Clear command - Delete a notebook's saved workspace snapshot.
//!
//! The next run starts from an empty namespace instead of restoring the
//! persisted bindings. Cells, code, and history are untouched.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use datapad_workspace::SnapshotStore;

use super::{load_config, load_notebook};

#[derive(Args)]
pub struct ClearArgs {
    /// Notebook file
    pub notebook: PathBuf,

    /// Engine configuration file (JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub async fn execute(args: ClearArgs) -> Result<()> {
    let notebook = load_notebook(&args.notebook)?;
    let config = load_config(args.config.as_deref())?;

    let store = SnapshotStore::new(&config.snapshot_dir);
    store.delete(&notebook.id)?;
    println!("🧹 Cleared workspace snapshot for '{}'", notebook.name);
    Ok(())
}
