use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use starcloud::{LocalIndex, Orchestrator, ProgressSink, SilentProgress};
use tracing::info;

use crate::config::AppConfig;
use crate::progress::BarProgress;

pub struct DownloadArgs {
    pub tile: String,
    pub start_year: i32,
    pub end_year: i32,
    pub output: PathBuf,
    pub chunk_size: Option<usize>,
    pub env_file: PathBuf,
    pub no_progress: bool,
    pub force: bool,
}

/// Inclusive year range, rejecting a start after the end.
pub fn year_range(start: i32, end: i32) -> Result<Vec<i32>> {
    if start > end {
        bail!("--start-year ({start}) must not be larger than --end-year ({end})");
    }
    Ok((start..=end).collect())
}

pub async fn run(config: &AppConfig, args: DownloadArgs) -> Result<()> {
    let years = year_range(args.start_year, args.end_year)?;
    let chunk_size = args.chunk_size.unwrap_or(config.chunk_size).max(1);

    let index = if args.force {
        None
    } else {
        let index = LocalIndex::build(&args.output, config.extension()).with_context(|| {
            format!("failed to index existing files in {}", args.output.display())
        })?;
        info!(files = index.len(), root = %args.output.display(), "indexed existing files");
        Some(index)
    };

    let client = super::build_client(config)?;
    let session = super::login(&client, &args.env_file).await?;
    let transfer = client.transfer();

    let bars = BarProgress::new();
    let progress: &dyn ProgressSink = if args.no_progress {
        &SilentProgress
    } else {
        &bars
    };

    let orchestrator = Orchestrator::new(
        &client,
        &transfer,
        &session,
        progress,
        config.run_options(chunk_size, false),
    );
    let summary = orchestrator
        .run(&args.tile, &years, &args.output, index.as_ref(), None)
        .await?;

    super::print_summary(&summary);

    let totals = summary.totals();
    if totals.attempted > 0 && totals.succeeded == 0 {
        bail!("all {} attempted downloads failed", totals.attempted);
    }
    if summary.skipped_pairs() == summary.pairs.len() && !summary.pairs.is_empty() {
        bail!("no file list could be fetched for {}", args.tile);
    }
    Ok(())
}
