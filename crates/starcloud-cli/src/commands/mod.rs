pub mod download;
pub mod refill;
pub mod task;
pub mod validate;

use std::path::Path;

use anyhow::{Context, Result};
use starcloud::{AuthSession, RunSummary, TransferTally};
use starcloud_client::StarCloudClient;

use crate::config::AppConfig;
use crate::env;

/// Chunk size multiplier for batch runs on cluster file systems.
pub const CLUSTER_CHUNK_FACTOR: usize = 4;

/// Write chunk size for batch runs, saturating on absurd configured values.
pub fn cluster_chunk_size(chunk_size: usize) -> usize {
    chunk_size.saturating_mul(CLUSTER_CHUNK_FACTOR)
}

pub fn build_client(config: &AppConfig) -> Result<StarCloudClient> {
    StarCloudClient::new(config.client_config()).context("failed to build HTTP client")
}

/// Read credentials from `env_file` and log in once for the whole run.
pub async fn login(client: &StarCloudClient, env_file: &Path) -> Result<AuthSession> {
    let credentials = env::load_credentials(env_file)?;
    client
        .login(&credentials)
        .await
        .context("could not authenticate with StarCloud")
}

pub fn print_tally(tally: &TransferTally) {
    println!(
        "Downloaded {} of {} files ({} failed, {} bytes)",
        tally.succeeded, tally.attempted, tally.failed, tally.bytes
    );
    for failure in &tally.failures {
        println!("  failed: {} ({})", failure.unit, failure.reason);
    }
}

pub fn print_summary(summary: &RunSummary) {
    for pair in &summary.pairs {
        match &pair.skip_reason {
            Some(reason) => println!("{}: skipped, {reason}", pair.pair),
            None => println!(
                "{}: {} files listed, {} pending, {} downloaded, {} failed in {:.1}s",
                pair.pair,
                pair.manifest_files,
                pair.pending,
                pair.tally.succeeded,
                pair.tally.failed,
                pair.elapsed.as_secs_f64()
            ),
        }
    }
    print_tally(&summary.totals());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_chunk_size_scales_and_saturates() {
        assert_eq!(cluster_chunk_size(1024), 4096);
        assert_eq!(cluster_chunk_size(usize::MAX), usize::MAX);
        assert_eq!(cluster_chunk_size(usize::MAX / 2), usize::MAX);
    }
}
