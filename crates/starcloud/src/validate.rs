use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, error};

use crate::cache;
use crate::diff::classify;
use crate::index::LocalIndex;
use crate::layout::pair_dir;
use crate::record::{FileRecord, FileStatus, TileYear, WorkUnit};
use crate::remote::{Archive, ManifestError};

/// Failures validating one (tile, year).
#[derive(Debug, thiserror::Error)]
pub enum ValidateError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("could not index {}: {source}", path.display())]
    Index {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where validation reads its inputs from.
#[derive(Debug, Clone)]
pub struct ValidateOptions {
    /// Only files with this extension count as payload.
    pub extension: Option<String>,
    /// Prefer an existing manifest snapshot over a remote listing.
    pub manifest_cache: bool,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            extension: Some("tif".to_owned()),
            manifest_cache: false,
        }
    }
}

/// Status of one manifest file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub tile: String,
    pub year: i32,
    pub filename: String,
    pub expected_size: u64,
    pub on_disk: Option<u64>,
    pub status: FileStatus,
}

/// Files per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub complete: usize,
    pub incomplete: usize,
    pub missing: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.complete + self.incomplete + self.missing
    }

    pub fn get(&self, status: FileStatus) -> usize {
        match status {
            FileStatus::Complete => self.complete,
            FileStatus::Incomplete => self.incomplete,
            FileStatus::Missing => self.missing,
        }
    }

    /// Share of files with `status`, 0-100. An empty manifest is 100% complete.
    pub fn percent(&self, status: FileStatus) -> f64 {
        let total = self.total();
        if total == 0 {
            return if status == FileStatus::Complete { 100.0 } else { 0.0 };
        }
        self.get(status) as f64 / total as f64 * 100.0
    }

    pub fn is_complete(&self) -> bool {
        self.incomplete == 0 && self.missing == 0
    }

    fn add(&mut self, status: FileStatus) {
        match status {
            FileStatus::Complete => self.complete += 1,
            FileStatus::Incomplete => self.incomplete += 1,
            FileStatus::Missing => self.missing += 1,
        }
    }

    fn merge(&mut self, other: StatusCounts) {
        self.complete += other.complete;
        self.incomplete += other.incomplete;
        self.missing += other.missing;
    }
}

/// Completeness of one (tile, year).
#[derive(Debug, Clone)]
pub struct PairReport {
    pub pair: TileYear,
    pub files: Vec<FileReport>,
}

impl PairReport {
    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for file in &self.files {
            counts.add(file.status);
        }
        counts
    }
}

/// Completeness across many pairs, including the pairs that could not be checked.
#[derive(Debug, Clone, Default)]
pub struct CompletenessReport {
    pub pairs: Vec<PairReport>,
    pub errors: Vec<(TileYear, String)>,
}

impl CompletenessReport {
    pub fn totals(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for pair in &self.pairs {
            counts.merge(pair.counts());
        }
        counts
    }

    /// Tiles with at least one file not complete, sorted and deduplicated.
    pub fn incomplete_tiles(&self) -> Vec<String> {
        self.pairs
            .iter()
            .filter(|p| !p.counts().is_complete())
            .map(|p| p.pair.tile.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Every file that still needs downloading, in report order.
    pub fn pending_units(&self) -> Vec<WorkUnit> {
        self.pairs
            .iter()
            .flat_map(|p| p.files.iter())
            .filter(|f| f.status.is_pending())
            .map(|f| WorkUnit {
                tile: f.tile.clone(),
                year: f.year,
                filename: f.filename.clone(),
                expected_size: f.expected_size,
                status: f.status,
            })
            .collect()
    }

    pub fn files(&self) -> impl Iterator<Item = &FileReport> {
        self.pairs.iter().flat_map(|p| p.files.iter())
    }
}

/// Compare the manifest of one (tile, year) with `{root}/{year}/{tile}`.
///
/// Read-only: nothing is downloaded and no snapshot is written.
pub async fn validate_pair(
    archive: &dyn Archive,
    root: &Path,
    tile: &str,
    year: i32,
    options: &ValidateOptions,
) -> Result<PairReport, ValidateError> {
    let manifest = expected_files(archive, root, tile, year, options).await?;

    let dir = pair_dir(root, tile, year);
    let index = LocalIndex::build(&dir, options.extension.as_deref())
        .map_err(|source| ValidateError::Index { path: dir, source })?;

    let files = manifest
        .iter()
        .map(|record| FileReport {
            tile: tile.to_owned(),
            year,
            filename: record.filename.clone(),
            expected_size: record.expected_size,
            on_disk: index.get(&record.filename),
            status: classify(record, Some(&index)),
        })
        .collect();

    let report = PairReport {
        pair: TileYear::new(tile, year),
        files,
    };
    let counts = report.counts();
    debug!(
        tile,
        year,
        complete = counts.complete,
        incomplete = counts.incomplete,
        missing = counts.missing,
        "validated pair"
    );
    Ok(report)
}

/// Validate every (tile, year) combination, continuing past failed pairs.
pub async fn validate(
    archive: &dyn Archive,
    root: &Path,
    tiles: &[String],
    years: &[i32],
    options: &ValidateOptions,
) -> CompletenessReport {
    let mut report = CompletenessReport::default();

    for &year in years {
        for tile in tiles {
            match validate_pair(archive, root, tile, year, options).await {
                Ok(pair) => report.pairs.push(pair),
                Err(e) => {
                    error!(tile = %tile, year, error = %e, "could not validate");
                    report
                        .errors
                        .push((TileYear::new(tile.clone(), year), e.to_string()));
                }
            }
        }
    }

    report
}

async fn expected_files(
    archive: &dyn Archive,
    root: &Path,
    tile: &str,
    year: i32,
    options: &ValidateOptions,
) -> Result<Vec<FileRecord>, ManifestError> {
    if options.manifest_cache
        && let Ok(Some(files)) = cache::load(root, tile, year)
    {
        return Ok(files);
    }
    archive.list_files(tile, year).await
}
