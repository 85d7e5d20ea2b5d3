/// Receives download progress.
///
/// The CLI renders this with progress bars; batch runs use [`SilentProgress`].
/// Every method defaults to a no-op.
pub trait ProgressSink: Send + Sync {
    /// A file transfer is about to start. `position` is 1-based.
    fn begin_file(&self, _position: usize, _count: usize, _filename: &str) {}

    /// The total size became known (`None` when the server sent no length).
    fn on_length(&self, _total: Option<u64>) {}

    /// Cumulative bytes written so far.
    fn on_bytes(&self, _downloaded: u64, _total: Option<u64>) {}

    fn end_file(&self, _succeeded: bool) {}
}

/// Discards all progress.
pub struct SilentProgress;

impl ProgressSink for SilentProgress {}

/// Percentage of `total` covered by `downloaded`, or `None` when the total
/// is unknown.
pub fn percent(downloaded: u64, total: Option<u64>) -> Option<f64> {
    match total {
        Some(total) if total > 0 => Some(downloaded as f64 / total as f64 * 100.0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_of_known_total() {
        assert_eq!(percent(50, Some(200)), Some(25.0));
        assert_eq!(percent(200, Some(200)), Some(100.0));
    }

    #[test]
    fn percent_is_indeterminate_without_total() {
        assert_eq!(percent(10, None), None);
        assert_eq!(percent(10, Some(0)), None);
    }
}
