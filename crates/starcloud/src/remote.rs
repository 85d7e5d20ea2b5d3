use std::fmt;

use serde::{Deserialize, Serialize};

use crate::record::FileRecord;

/// Account identifier as issued by the login endpoint.
///
/// The service has been observed returning both numeric and string ids;
/// the original JSON form is echoed back on link requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Numeric(u64),
    Text(String),
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

/// Bearer session obtained once per run. Never refreshed.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub user_id: UserId,
    pub user_name: String,
    pub token: String,
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("user_id", &self.user_id)
            .field("user_name", &self.user_name)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Short-lived download location for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedLink {
    pub filename: String,
    pub url: String,
    pub size: u64,
}

/// A response did not have the shape the client expects.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unexpected response: {0}")]
pub struct ProtocolError(pub String);

impl ProtocolError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Login failures. Always fatal for the run.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("login rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("login request failed: {0}")]
    Network(String),

    #[error("could not encrypt credentials: {0}")]
    Encryption(String),

    #[error("login {0}")]
    Protocol(#[from] ProtocolError),
}

/// Failures fetching the file list of one (tile, year).
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("file list for {tile}/{year} returned HTTP {status}: {body}")]
    Status {
        tile: String,
        year: i32,
        status: u16,
        body: String,
    },

    #[error("file list request for {tile}/{year} failed: {message}")]
    Network {
        tile: String,
        year: i32,
        message: String,
    },

    #[error("file list for {tile}/{year}: {source}")]
    Protocol {
        tile: String,
        year: i32,
        #[source]
        source: ProtocolError,
    },
}

/// Failures exchanging a filename for a signed URL.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("link for {filename} returned HTTP {status}: {body}")]
    Status {
        filename: String,
        status: u16,
        body: String,
    },

    /// The bearer token was refused; the session has expired.
    #[error("session rejected while resolving {filename} (HTTP {status})")]
    Unauthorized { filename: String, status: u16 },

    #[error("link request for {filename} failed: {message}")]
    Network { filename: String, message: String },

    #[error("link for {filename}: {source}")]
    Protocol {
        filename: String,
        #[source]
        source: ProtocolError,
    },
}

impl LinkError {
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}

/// The remote archive: file manifests and signed download links.
#[async_trait::async_trait]
pub trait Archive: Send + Sync {
    /// Every file the archive lists for a (tile, year), in archive order.
    async fn list_files(&self, tile: &str, year: i32) -> Result<Vec<FileRecord>, ManifestError>;

    /// Exchange a filename for a short-lived signed URL and its declared size.
    async fn resolve_link(
        &self,
        filename: &str,
        tile: &str,
        year: i32,
        session: &AuthSession,
    ) -> Result<SignedLink, LinkError>;
}

#[async_trait::async_trait]
impl<T: Archive + ?Sized> Archive for std::sync::Arc<T> {
    async fn list_files(&self, tile: &str, year: i32) -> Result<Vec<FileRecord>, ManifestError> {
        (**self).list_files(tile, year).await
    }

    async fn resolve_link(
        &self,
        filename: &str,
        tile: &str,
        year: i32,
        session: &AuthSession,
    ) -> Result<SignedLink, LinkError> {
        (**self).resolve_link(filename, tile, year, session).await
    }
}
