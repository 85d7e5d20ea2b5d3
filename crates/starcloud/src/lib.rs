pub mod cache;
pub mod diff;
pub mod index;
pub mod layout;
pub mod orchestrator;
pub mod partition;
pub mod progress;
pub mod record;
pub mod remote;
pub mod transfer;
pub mod validate;

pub use cache::CacheError;
pub use diff::{classify, diff};
pub use index::LocalIndex;
pub use orchestrator::{
    DEFAULT_CHUNK_SIZE, FileFailure, Orchestrator, PairSummary, RunError, RunOptions, RunSummary,
    TransferTally,
};
pub use partition::{PartitionError, PartitionSlice, partition};
pub use progress::{ProgressSink, SilentProgress, percent};
pub use record::{FileRecord, FileStatus, TileYear, WorkUnit};
pub use remote::{
    Archive, AuthError, AuthSession, LinkError, ManifestError, ProtocolError, SignedLink, UserId,
};
pub use transfer::{RETRYABLE_STATUSES, Transfer, TransferError};
pub use validate::{
    CompletenessReport, FileReport, PairReport, StatusCounts, ValidateError, ValidateOptions,
};

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
