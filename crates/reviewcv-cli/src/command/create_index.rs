use std::path::PathBuf;

use anyhow::Context;
use reviewcv_data::store::{ReviewStore as _, SqliteStore};

use crate::logging;

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct CreateIndexArg {
    /// SQLite database holding the review documents
    #[arg(long, default_value = "reviews.db")]
    db_path: PathBuf,
}

pub(crate) fn run(arg: &CreateIndexArg) -> anyhow::Result<()> {
    let CreateIndexArg { db_path } = arg;
    logging::init_stderr()?;

    let store = SqliteStore::open(db_path)
        .with_context(|| format!("Failed to open datastore: {}", db_path.display()))?;
    if store.has_id_index()? {
        tracing::info!(db = %db_path.display(), "review ID index already exists");
        return Ok(());
    }
    store
        .ensure_id_index()
        .context("Failed to create the review ID index")?;
    tracing::info!(db = %db_path.display(), "created review ID index");
    Ok(())
}
