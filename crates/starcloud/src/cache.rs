use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::layout::manifest_cache_path;
use crate::record::FileRecord;

/// Errors reading or writing a manifest snapshot.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed manifest snapshot {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    tile: String,
    year: i32,
    files: Vec<FileRecord>,
}

/// Read the cached manifest of a (tile, year), if one was written.
pub fn load(root: &Path, tile: &str, year: i32) -> Result<Option<Vec<FileRecord>>, CacheError> {
    let path = manifest_cache_path(root, tile, year);

    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(CacheError::Io { path, source }),
    };

    let snapshot: Snapshot =
        serde_json::from_str(&contents).map_err(|source| CacheError::Json {
            path: path.clone(),
            source,
        })?;

    Ok(Some(snapshot.files))
}

/// Write the manifest snapshot of a (tile, year). Returns the file written.
///
/// The snapshot is written to a temporary sibling and renamed into place so
/// a reader never sees a half-written file.
pub fn store(
    root: &Path,
    tile: &str,
    year: i32,
    files: &[FileRecord],
) -> Result<PathBuf, CacheError> {
    let path = manifest_cache_path(root, tile, year);
    let io_err = |source| CacheError::Io {
        path: path.clone(),
        source,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let snapshot = Snapshot {
        tile: tile.to_owned(),
        year,
        files: files.to_vec(),
    };
    let json = serde_json::to_string_pretty(&snapshot).map_err(|source| CacheError::Json {
        path: path.clone(),
        source,
    })?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(io_err)?;
    std::fs::rename(&tmp, &path).map_err(io_err)?;

    Ok(path)
}
