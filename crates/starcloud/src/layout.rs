use std::path::{Path, PathBuf};

/// Directory holding the payload of one (tile, year): `{root}/{year}/{tile}`.
pub fn pair_dir(root: &Path, tile: &str, year: i32) -> PathBuf {
    root.join(year.to_string()).join(tile)
}

/// Manifest snapshot location: `{root}/{year}/{tile}/expected_files_{year}_{tile}.json`.
pub fn manifest_cache_path(root: &Path, tile: &str, year: i32) -> PathBuf {
    pair_dir(root, tile, year).join(format!("expected_files_{year}_{tile}.json"))
}
