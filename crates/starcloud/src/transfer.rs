use std::path::{Path, PathBuf};

use crate::progress::ProgressSink;

/// Status codes the transport retries with backoff.
pub const RETRYABLE_STATUSES: [u16; 4] = [500, 502, 503, 504];

/// Failures streaming a signed URL to disk.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("download server returned HTTP {status}")]
    Status { status: u16 },

    /// The signed URL was refused; a fresh link has to be resolved.
    #[error("signed URL refused with HTTP {status}")]
    LinkExpired { status: u16 },

    /// The request could not be built, e.g. a malformed URL.
    #[error("invalid download request: {0}")]
    Request(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("download timed out: {0}")]
    Timeout(String),

    #[error("stream interrupted: {0}")]
    Stream(String),

    #[error("could not write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        last: Box<TransferError>,
    },
}

impl TransferError {
    /// True when the transport may retry the request unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status } => RETRYABLE_STATUSES.contains(status),
            Self::Connect(_) | Self::Timeout(_) | Self::Stream(_) => true,
            Self::LinkExpired { .. }
            | Self::Request(_)
            | Self::Io { .. }
            | Self::Exhausted { .. } => false,
        }
    }

    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Streams a signed URL to a local file.
#[async_trait::async_trait]
pub trait Transfer: Send + Sync {
    /// Download `url` into `dest` in chunks of `chunk_size` bytes, truncating
    /// any existing file. Returns the number of bytes written.
    async fn download(
        &self,
        url: &str,
        dest: &Path,
        chunk_size: usize,
        progress: &dyn ProgressSink,
    ) -> Result<u64, TransferError>;
}
