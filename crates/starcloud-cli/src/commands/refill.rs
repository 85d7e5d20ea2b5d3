use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use starcloud::validate::validate;
use starcloud::{Orchestrator, ProgressSink, SilentProgress};
use tracing::warn;

use super::cluster_chunk_size;
use crate::config::AppConfig;
use crate::env;
use crate::progress::BarProgress;

pub struct RefillArgs {
    pub years: Vec<String>,
    pub root: Option<PathBuf>,
    pub check: bool,
    pub env_file: PathBuf,
    pub no_progress: bool,
}

/// Expand year arguments. A single `A-B` argument means the half-open
/// range `A..B`; otherwise every argument is one year.
pub fn parse_years(args: &[String]) -> Result<Vec<i32>> {
    if let [single] = args
        && let Some((start, end)) = single.split_once('-')
    {
        let start: i32 = start
            .trim()
            .parse()
            .with_context(|| format!("invalid year range {single:?}"))?;
        let end: i32 = end
            .trim()
            .parse()
            .with_context(|| format!("invalid year range {single:?}"))?;
        if start >= end {
            bail!("year range {single:?} is empty");
        }
        return Ok((start..end).collect());
    }

    args.iter()
        .map(|y| {
            y.trim()
                .parse()
                .with_context(|| format!("invalid year {y:?}"))
        })
        .collect()
}

pub async fn run(config: &AppConfig, args: RefillArgs) -> Result<()> {
    let years = parse_years(&args.years)?;
    if years.is_empty() {
        bail!("at least one year is required");
    }

    env::load_env_file(&args.env_file);
    let root = match args.root {
        Some(root) => root,
        None => std::env::var_os("S_ROOT_DIR")
            .map(PathBuf::from)
            .context("pass --root or set S_ROOT_DIR")?,
    };

    let client = super::build_client(config)?;
    let report = validate(
        &client,
        &root,
        &config.tiles,
        &years,
        &config.validate_options(),
    )
    .await;
    for (pair, reason) in &report.errors {
        warn!(%pair, %reason, "pair not checked");
    }

    let pending = report.pending_units();
    let tiles: BTreeSet<&str> = pending.iter().map(|u| u.tile.as_str()).collect();
    println!(
        "Missing files for {} years ({} different tiles): {}",
        years.len(),
        tiles.len(),
        pending.len()
    );

    if args.check {
        return Ok(());
    }
    if pending.is_empty() {
        println!("No missing files, nothing to do");
        return Ok(());
    }

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
        config.run_options(cluster_chunk_size(config.chunk_size), false),
    );
    let tally = orchestrator.fetch_units(&root, &pending).await?;
    super::print_tally(&tally);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_owned()).collect()
    }

    #[test]
    fn explicit_years() {
        assert_eq!(
            parse_years(&args(&["2018", "2020"])).unwrap(),
            vec![2018, 2020]
        );
    }

    #[test]
    fn dash_range_is_half_open() {
        assert_eq!(
            parse_years(&args(&["2019-2022"])).unwrap(),
            vec![2019, 2020, 2021]
        );
    }

    #[test]
    fn empty_or_reversed_range_is_rejected() {
        assert!(parse_years(&args(&["2020-2020"])).is_err());
        assert!(parse_years(&args(&["2022-2019"])).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_years(&args(&["twenty"])).is_err());
        assert!(parse_years(&args(&["2019-x"])).is_err());
    }
}
