use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::cache;
use crate::diff::diff;
use crate::index::LocalIndex;
use crate::layout::pair_dir;
use crate::partition::PartitionSlice;
use crate::progress::ProgressSink;
use crate::record::{FileRecord, TileYear, WorkUnit};
use crate::remote::{Archive, AuthSession, LinkError, ManifestError, SignedLink};
use crate::transfer::{Transfer, TransferError};

/// 1 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Knobs for one orchestration run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub chunk_size: usize,
    /// Read and write `expected_files_*.json` snapshots next to the payload.
    pub manifest_cache: bool,
    /// Abort the run on a manifest failure instead of skipping the pair.
    pub strict: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            manifest_cache: false,
            strict: false,
        }
    }
}

/// Failures that end a run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("session expired: {0}")]
    SessionExpired(LinkError),

    #[error("could not create {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why a single file could not be downloaded.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error(transparent)]
    Link(LinkError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("wrote {written} bytes but {expected} were declared")]
    SizeMismatch { expected: u64, written: u64 },
}

/// A file that was attempted and failed. It stays pending on disk.
#[derive(Debug, Clone)]
pub struct FileFailure {
    pub unit: WorkUnit,
    pub reason: String,
}

/// Outcome counts of a batch of file transfers.
#[derive(Debug, Clone, Default)]
pub struct TransferTally {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub bytes: u64,
    pub failures: Vec<FileFailure>,
}

impl TransferTally {
    fn absorb(&mut self, other: TransferTally) {
        self.attempted += other.attempted;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.bytes += other.bytes;
        self.failures.extend(other.failures);
    }
}

/// Outcome of one (tile, year) pass.
#[derive(Debug, Clone)]
pub struct PairSummary {
    pub pair: TileYear,
    pub manifest_files: usize,
    pub pending: usize,
    pub tally: TransferTally,
    pub elapsed: Duration,
    /// Set when the pair was skipped, either because its folder could not be
    /// created or its file list could not be fetched.
    pub skip_reason: Option<String>,
}

impl PairSummary {
    fn skipped(pair: TileYear, reason: String, elapsed: Duration) -> Self {
        Self {
            pair,
            manifest_files: 0,
            pending: 0,
            tally: TransferTally::default(),
            elapsed,
            skip_reason: Some(reason),
        }
    }
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub pairs: Vec<PairSummary>,
}

impl RunSummary {
    pub fn totals(&self) -> TransferTally {
        let mut total = TransferTally::default();
        for pair in &self.pairs {
            total.absorb(pair.tally.clone());
        }
        total
    }

    pub fn skipped_pairs(&self) -> usize {
        self.pairs
            .iter()
            .filter(|p| p.skip_reason.is_some())
            .count()
    }
}

/// Drives manifest lookup, diffing and transfers for one authenticated run.
///
/// Built once per process and passed by reference; holds no mutable state.
pub struct Orchestrator<'a> {
    archive: &'a dyn Archive,
    transfer: &'a dyn Transfer,
    session: &'a AuthSession,
    progress: &'a dyn ProgressSink,
    options: RunOptions,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        archive: &'a dyn Archive,
        transfer: &'a dyn Transfer,
        session: &'a AuthSession,
        progress: &'a dyn ProgressSink,
        options: RunOptions,
    ) -> Self {
        Self {
            archive,
            transfer,
            session,
            progress,
            options,
        }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Download every pending file of `tile` for each of `years` under `root`.
    ///
    /// With an `index`, files already complete on disk are skipped; without
    /// one, everything in the manifest is fetched. With a `slice`, only that
    /// part of each pair's pending list is handled.
    pub async fn run(
        &self,
        tile: &str,
        years: &[i32],
        root: &Path,
        index: Option<&LocalIndex>,
        slice: Option<PartitionSlice>,
    ) -> Result<RunSummary, RunError> {
        let mut summary = RunSummary::default();
        for &year in years {
            let pair = self.run_pair(tile, year, root, index, slice).await?;
            summary.pairs.push(pair);
        }
        Ok(summary)
    }

    /// One (tile, year) pass.
    pub async fn run_pair(
        &self,
        tile: &str,
        year: i32,
        root: &Path,
        index: Option<&LocalIndex>,
        slice: Option<PartitionSlice>,
    ) -> Result<PairSummary, RunError> {
        let span = info_span!("pair", tile, year);
        self.run_pair_inner(tile, year, root, index, slice)
            .instrument(span)
            .await
    }

    async fn run_pair_inner(
        &self,
        tile: &str,
        year: i32,
        root: &Path,
        index: Option<&LocalIndex>,
        slice: Option<PartitionSlice>,
    ) -> Result<PairSummary, RunError> {
        let started = Instant::now();
        let pair = TileYear::new(tile, year);

        let target = pair_dir(root, tile, year);
        if let Err(e) = ensure_dir(&target) {
            if self.options.strict {
                return Err(e);
            }
            error!(error = %e, "skipping pair, folder unavailable");
            return Ok(PairSummary::skipped(pair, e.to_string(), started.elapsed()));
        }

        let manifest = match self.manifest(tile, year, root).await {
            Ok(manifest) => manifest,
            Err(e) if self.options.strict => return Err(e.into()),
            Err(e) => {
                error!(error = %e, "skipping pair, file list unavailable");
                return Ok(PairSummary::skipped(pair, e.to_string(), started.elapsed()));
            }
        };

        let mut pending = diff(tile, year, &manifest, index);
        if index.is_some() {
            info!(
                files = manifest.len(),
                pending = pending.len(),
                "compared file list against local index"
            );
        } else {
            info!(files = manifest.len(), "found files, downloading all");
        }

        if let Some(slice) = slice {
            pending = slice.select(&pending).to_vec();
            info!(%slice, files = pending.len(), "restricted to slice");
        }

        let pending_count = pending.len();
        let tally = if pending.is_empty() {
            info!("nothing to download");
            TransferTally::default()
        } else {
            self.fetch_units(root, &pending).await?
        };

        let elapsed = started.elapsed();
        info!(
            attempted = tally.attempted,
            succeeded = tally.succeeded,
            failed = tally.failed,
            elapsed_secs = elapsed.as_secs_f64(),
            "pair finished"
        );

        Ok(PairSummary {
            pair,
            manifest_files: manifest.len(),
            pending: pending_count,
            tally,
            elapsed,
            skip_reason: None,
        })
    }

    /// Download a list of work units, continuing past per-file failures.
    ///
    /// Only an expired session stops the batch early.
    pub async fn fetch_units(
        &self,
        root: &Path,
        units: &[WorkUnit],
    ) -> Result<TransferTally, RunError> {
        let mut tally = TransferTally::default();
        let count = units.len();

        for (i, unit) in units.iter().enumerate() {
            tally.attempted += 1;
            match self.fetch_unit(root, unit, i + 1, count).await {
                Ok(bytes) => {
                    tally.succeeded += 1;
                    tally.bytes += bytes;
                }
                Err(FileError::Link(e)) if e.is_session_expired() => {
                    return Err(RunError::SessionExpired(e));
                }
                Err(e) => {
                    warn!(
                        tile = %unit.tile,
                        year = unit.year,
                        file = %unit.filename,
                        error = %e,
                        "download failed, leaving for next run"
                    );
                    tally.failed += 1;
                    tally.failures.push(FileFailure {
                        unit: unit.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(tally)
    }

    async fn fetch_unit(
        &self,
        root: &Path,
        unit: &WorkUnit,
        position: usize,
        count: usize,
    ) -> Result<u64, FileError> {
        let target = pair_dir(root, &unit.tile, unit.year);
        create_dir(&target).map_err(|source| TransferError::io(&target, source))?;

        let link = self.resolve(unit).await?;
        debug!(file = %link.filename, size = link.size, "resolved signed link");
        self.progress.begin_file(position, count, &unit.filename);

        if link.filename != unit.filename {
            debug!(
                listed = %unit.filename,
                resolved = %link.filename,
                "ignoring resolved file name"
            );
        }

        // Always written under the listed name so the next diff finds it.
        let dest = target.join(&unit.filename);
        let mut declared = link.size;
        let mut result = self.download(&link.url, &dest).await;

        if let Err(TransferError::LinkExpired { status }) = result {
            warn!(file = %unit.filename, status, "signed link expired, resolving again");
            match self.resolve(unit).await {
                Ok(fresh) => {
                    declared = fresh.size;
                    result = self.download(&fresh.url, &dest).await;
                }
                Err(e) => {
                    self.progress.end_file(false);
                    return Err(e);
                }
            }
        }

        let outcome = match result {
            Ok(written) if written != declared => Err(FileError::SizeMismatch {
                expected: declared,
                written,
            }),
            Ok(written) => Ok(written),
            Err(e) => Err(e.into()),
        };

        self.progress.end_file(outcome.is_ok());
        if outcome.is_ok() {
            debug!(file = %dest.display(), "download complete");
        }
        outcome
    }

    async fn resolve(&self, unit: &WorkUnit) -> Result<SignedLink, FileError> {
        self.archive
            .resolve_link(&unit.filename, &unit.tile, unit.year, self.session)
            .await
            .map_err(FileError::Link)
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64, TransferError> {
        self.transfer
            .download(url, dest, self.options.chunk_size, self.progress)
            .await
    }

    async fn manifest(
        &self,
        tile: &str,
        year: i32,
        root: &Path,
    ) -> Result<Vec<FileRecord>, ManifestError> {
        if self.options.manifest_cache {
            match cache::load(root, tile, year) {
                Ok(Some(files)) => {
                    debug!(files = files.len(), "using cached file list");
                    return Ok(files);
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "ignoring unreadable file list snapshot"),
            }
        }

        let files = self.archive.list_files(tile, year).await?;

        if self.options.manifest_cache
            && let Err(e) = cache::store(root, tile, year, &files)
        {
            warn!(error = %e, "could not write file list snapshot");
        }

        Ok(files)
    }
}

fn ensure_dir(path: &Path) -> Result<(), RunError> {
    create_dir(path).map_err(|source| RunError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn create_dir(path: &Path) -> std::io::Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    std::fs::create_dir_all(path)?;
    debug!(dir = %path.display(), "created folder");
    Ok(())
}
