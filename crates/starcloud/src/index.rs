use std::collections::HashMap;
use std::io;
use std::path::Path;

use tracing::{debug, warn};
use walkdir::WalkDir;

/// Map from base filename to on-disk byte size for already downloaded files.
///
/// Basenames are assumed unique within a scanned tree: when two
/// subdirectories hold files with the same name, the later entry wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalIndex {
    sizes: HashMap<String, u64>,
}

impl LocalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recursively index regular files under `root`.
    ///
    /// Only files whose extension matches `extension` (case-insensitive) are
    /// counted; `None` accepts every file. A missing `root` yields an empty
    /// index, since nothing has been downloaded there yet.
    pub fn build(root: &Path, extension: Option<&str>) -> io::Result<Self> {
        let mut index = Self::new();
        index.scan(root, extension)?;
        Ok(index)
    }

    /// Index several roots into one map.
    pub fn build_all<P: AsRef<Path>>(roots: &[P], extension: Option<&str>) -> io::Result<Self> {
        let mut index = Self::new();
        for root in roots {
            index.scan(root.as_ref(), extension)?;
        }
        Ok(index)
    }

    /// Add the files under `root` to this index. Returns how many were added.
    pub fn scan(&mut self, root: &Path, extension: Option<&str>) -> io::Result<usize> {
        if !root.exists() {
            debug!(root = %root.display(), "index root does not exist yet");
            return Ok(0);
        }

        let mut added = 0usize;

        for entry in WalkDir::new(root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let denied = err
                        .io_error()
                        .is_some_and(|e| e.kind() == io::ErrorKind::PermissionDenied);
                    if denied {
                        warn!(error = %err, "skipping unreadable path while indexing");
                        continue;
                    }
                    return Err(err
                        .into_io_error()
                        .unwrap_or_else(|| io::Error::other("directory walk failed")));
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if !has_extension(path, extension) {
                continue;
            }

            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            let size = entry.metadata().map_err(io::Error::other)?.len();
            self.sizes.insert(name.to_owned(), size);
            added += 1;
        }

        debug!(root = %root.display(), files = added, "indexed downloaded files");
        Ok(added)
    }

    pub fn insert(&mut self, filename: impl Into<String>, size: u64) {
        self.sizes.insert(filename.into(), size);
    }

    /// On-disk size of `filename`, if it has been seen.
    pub fn get(&self, filename: &str) -> Option<u64> {
        self.sizes.get(filename).copied()
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }
}

impl FromIterator<(String, u64)> for LocalIndex {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        Self {
            sizes: iter.into_iter().collect(),
        }
    }
}

fn has_extension(path: &Path, extension: Option<&str>) -> bool {
    let Some(wanted) = extension else {
        return true;
    };
    let wanted = wanted.trim_start_matches('.');
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(wanted))
}
