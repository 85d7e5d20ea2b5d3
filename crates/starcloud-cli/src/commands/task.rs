use std::path::Path;

use anyhow::{Context, Result};
use starcloud::{LocalIndex, Orchestrator, SilentProgress};
use tracing::info;

use super::cluster_chunk_size;
use crate::config::AppConfig;
use crate::env::TaskEnv;

/// Cluster array-task entry point.
///
/// Login and manifest failures end the task with an error; individual
/// file failures are logged and skipped.
pub async fn run(config: &AppConfig, env_file: &Path) -> Result<()> {
    let task = TaskEnv::from_env()?;
    info!(
        tile = %task.pair.tile,
        year = task.pair.year,
        slice = %task.slice,
        root = %task.root.display(),
        "starting array task"
    );

    let index = if task.create_index {
        let index = LocalIndex::build(&task.root, config.extension()).with_context(|| {
            format!("failed to index existing files in {}", task.root.display())
        })?;
        info!(files = index.len(), "indexed existing files");
        Some(index)
    } else {
        None
    };

    let client = super::build_client(config)?;
    let session = super::login(&client, env_file).await?;
    let transfer = client.transfer();

    let orchestrator = Orchestrator::new(
        &client,
        &transfer,
        &session,
        &SilentProgress,
        config.run_options(cluster_chunk_size(config.chunk_size), true),
    );
    let pair = orchestrator
        .run_pair(
            &task.pair.tile,
            task.pair.year,
            &task.root,
            index.as_ref(),
            Some(task.slice),
        )
        .await
        .with_context(|| format!("task for {} failed", task.pair))?;

    if pair.pending == 0 {
        info!("slice is empty, nothing to do");
    }
    super::print_tally(&pair.tally);
    Ok(())
}
