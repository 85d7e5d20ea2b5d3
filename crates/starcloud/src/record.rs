use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies one (tile, year) cell of the archive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileYear {
    pub tile: String,
    pub year: i32,
}

impl TileYear {
    pub fn new(tile: impl Into<String>, year: i32) -> Self {
        Self {
            tile: tile.into(),
            year,
        }
    }

    /// Row-major product of tiles and years, in the order every cluster
    /// task computes it.
    pub fn product(tiles: &[String], years: &[i32]) -> Vec<TileYear> {
        tiles
            .iter()
            .flat_map(|tile| years.iter().map(move |&year| TileYear::new(tile.clone(), year)))
            .collect()
    }
}

impl fmt::Display for TileYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tile, self.year)
    }
}

/// One file the remote manifest claims exists for a (tile, year).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub filename: String,
    pub expected_size: u64,
}

impl FileRecord {
    pub fn new(filename: impl Into<String>, expected_size: u64) -> Self {
        Self {
            filename: filename.into(),
            expected_size,
        }
    }
}

/// Local state of a manifest file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FileStatus {
    Missing,
    Incomplete,
    Complete,
}

impl FileStatus {
    pub fn is_pending(&self) -> bool {
        !matches!(self, Self::Complete)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Incomplete => "incomplete",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pending download: a manifest file that is missing or incomplete on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    pub tile: String,
    pub year: i32,
    pub filename: String,
    pub expected_size: u64,
    pub status: FileStatus,
}

impl WorkUnit {
    pub fn tile_year(&self) -> TileYear {
        TileYear::new(self.tile.clone(), self.year)
    }
}

impl fmt::Display for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.tile, self.year, self.filename)
    }
}
