use crate::index::LocalIndex;
use crate::record::{FileRecord, FileStatus, WorkUnit};

/// Classify one manifest entry against the local index.
///
/// Without an index every file is `Missing`.
pub fn classify(record: &FileRecord, index: Option<&LocalIndex>) -> FileStatus {
    match index.and_then(|idx| idx.get(&record.filename)) {
        None => FileStatus::Missing,
        Some(size) if size == record.expected_size => FileStatus::Complete,
        Some(_) => FileStatus::Incomplete,
    }
}

/// Classify every manifest entry, keeping manifest order.
pub fn classify_all<'a>(
    manifest: &'a [FileRecord],
    index: Option<&LocalIndex>,
) -> Vec<(&'a FileRecord, FileStatus)> {
    manifest
        .iter()
        .map(|record| (record, classify(record, index)))
        .collect()
}

/// Work units for every manifest entry that is not complete on disk.
///
/// Output preserves manifest order so repeated invocations over the same
/// manifest partition identically.
pub fn diff(
    tile: &str,
    year: i32,
    manifest: &[FileRecord],
    index: Option<&LocalIndex>,
) -> Vec<WorkUnit> {
    manifest
        .iter()
        .filter_map(|record| {
            let status = classify(record, index);
            status.is_pending().then(|| WorkUnit {
                tile: tile.to_owned(),
                year,
                filename: record.filename.clone(),
                expected_size: record.expected_size,
                status,
            })
        })
        .collect()
}
