use std::fmt;
use std::time::Duration;

use starcloud::{
    Archive, AuthError, AuthSession, FileRecord, LinkError, ManifestError, ProtocolError,
    RETRYABLE_STATUSES, SignedLink,
};
use tracing::{debug, info, warn};

use crate::crypto::CredentialCipher;
use crate::retry::RetryPolicy;
use crate::transfer::HttpTransfer;
use crate::wire::{
    FileListParams, FileListRequest, FileListResponse, LinkRequest, LinkResponse, LoginRequest,
    LoginResponse,
};

pub const DEFAULT_BASE_URL: &str = "https://data-starcloud.pcl.ac.cn";

/// Records per manifest page. A shorter page ends the listing.
pub const PAGE_SIZE: usize = 100;

/// Upper bound on manifest pages for one (tile, year).
pub const MAX_PAGES: usize = 10_000;

const USER_AGENT: &str = "starcloud-fetcher";
const MANIFEST_TABLE: &str = "rs_csdc30";
const DATASET_PATH: &str = "CSDC_samples/SDC_V003";
const OBJECT_PREFIX: &str = "shared-dataset/CSDC_samples/CSDC_samples/SDC_V003";
const RESOURCE_ID: u32 = 26;
const RESOURCE_TYPE: &str = "REMOTE_SENSING";
const COUNTRY: &str = "Germany";

/// Account credentials for [`StarCloudClient::login`].
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Connection settings shared by the API client and the download transport.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Overrides [`DEFAULT_BASE_URL`]; used to point tests at a mock server.
    pub base_url: Option<String>,
    pub login_timeout: Duration,
    /// Maximum idle time between body reads.
    pub read_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            login_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }
}

/// HTTP client for the StarCloud data API.
///
/// Login and link resolution are never retried. Manifest pages are plain
/// reads and follow the configured [`RetryPolicy`].
pub struct StarCloudClient {
    client: reqwest::Client,
    api_base_url: Option<String>,
    login_timeout: Duration,
    retry: RetryPolicy,
}

impl StarCloudClient {
    pub fn new(config: ClientConfig) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .read_timeout(config.read_timeout)
            .build()?;

        Ok(Self {
            client,
            api_base_url: config.base_url,
            login_timeout: config.login_timeout,
            retry: config.retry,
        })
    }

    fn api_base(&self) -> &str {
        self.api_base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    /// A download transport sharing this client's connection pool.
    pub fn transfer(&self) -> HttpTransfer {
        HttpTransfer::with_client(self.client.clone(), self.retry)
    }

    /// Authenticate with the production public key.
    pub async fn login(&self, credentials: &Credentials) -> Result<AuthSession, AuthError> {
        let cipher = CredentialCipher::starcloud()?;
        self.login_with(&cipher, credentials).await
    }

    pub async fn login_with(
        &self,
        cipher: &CredentialCipher,
        credentials: &Credentials,
    ) -> Result<AuthSession, AuthError> {
        let key = cipher.encrypt(&credentials.email, &credentials.password)?;
        let url = format!("{}/starcloud/api/user/authenticate", self.api_base());

        let response = self
            .client
            .post(&url)
            .timeout(self.login_timeout)
            .json(&LoginRequest { key })
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;
        let parsed: LoginResponse = serde_json::from_str(&body)
            .map_err(|e| ProtocolError::new(format!("login body is not valid JSON: {e}")))?;
        let session = parsed.into_session()?;

        info!(user = %session.user_name, "login successful");
        Ok(session)
    }

    /// Every record of a (tile, year), fetching pages until a short one.
    ///
    /// A page that starts with the same file as the one before it means the
    /// server is ignoring the page number; that is reported as a protocol
    /// error, as is running past [`MAX_PAGES`].
    pub async fn list_all(&self, tile: &str, year: i32) -> Result<Vec<FileRecord>, ManifestError> {
        let mut records = Vec::new();
        let mut previous_first: Option<String> = None;
        let mut page = 1;

        loop {
            let batch = self.fetch_page(tile, year, page).await?;
            let first = batch.first().map(|record| record.filename.clone());
            if first.is_some() && first == previous_first {
                return Err(pagination_error(
                    tile,
                    year,
                    format!("page {page} repeats the previous page"),
                ));
            }

            let short = batch.len() < PAGE_SIZE;
            records.extend(batch);
            if short {
                break;
            }
            if page >= MAX_PAGES {
                return Err(pagination_error(
                    tile,
                    year,
                    format!("listing did not end within {MAX_PAGES} pages"),
                ));
            }
            previous_first = first;
            page += 1;
        }

        debug!(tile, year, pages = page, files = records.len(), "file list fetched");
        Ok(records)
    }

    async fn fetch_page(
        &self,
        tile: &str,
        year: i32,
        page: usize,
    ) -> Result<Vec<FileRecord>, ManifestError> {
        let mut retry = 0;
        loop {
            match self.try_fetch_page(tile, year, page).await {
                Err(err) if manifest_retryable(&err) && retry < self.retry.max_retries => {
                    retry += 1;
                    warn!(tile, year, page, retry, error = %err, "retrying file list page");
                    self.retry.pause(retry).await;
                }
                result => return result,
            }
        }
    }

    async fn try_fetch_page(
        &self,
        tile: &str,
        year: i32,
        page: usize,
    ) -> Result<Vec<FileRecord>, ManifestError> {
        let url = format!("{}/aiforearth/api/data/getFileListByPage", self.api_base());
        let request = FileListRequest {
            params: FileListParams {
                count: PAGE_SIZE,
                enable_spatial_query: false,
                page,
                path: format!("{DATASET_PATH}/{tile}/{year}"),
                table: MANIFEST_TABLE.to_owned(),
            },
        };

        let network = |e: reqwest::Error| ManifestError::Network {
            tile: tile.to_owned(),
            year,
            message: e.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(network)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ManifestError::Status {
                tile: tile.to_owned(),
                year,
                status: status.as_u16(),
                body,
            });
        }

        let protocol = |source: ProtocolError| ManifestError::Protocol {
            tile: tile.to_owned(),
            year,
            source,
        };

        let body = response.text().await.map_err(network)?;
        let parsed: FileListResponse = serde_json::from_str(&body)
            .map_err(|e| protocol(ProtocolError::new(format!("invalid JSON: {e}"))))?;
        parsed.into_records().map_err(protocol)
    }

    pub async fn signed_link(
        &self,
        filename: &str,
        tile: &str,
        year: i32,
        session: &AuthSession,
    ) -> Result<SignedLink, LinkError> {
        let url = format!("{}/starcloud/api/file/downloadResource", self.api_base());
        let request = LinkRequest {
            country: COUNTRY,
            object_key: format!("{OBJECT_PREFIX}/{tile}/{year}/{filename}"),
            resource_id: RESOURCE_ID,
            resource_type: RESOURCE_TYPE,
            user_account: &session.user_name,
            user_id: &session.user_id,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&session.token)
            .json(&request)
            .send()
            .await
            .map_err(|e| LinkError::Network {
                filename: filename.to_owned(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(LinkError::Unauthorized {
                filename: filename.to_owned(),
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LinkError::Status {
                filename: filename.to_owned(),
                status: status.as_u16(),
                body,
            });
        }

        let protocol = |source: ProtocolError| LinkError::Protocol {
            filename: filename.to_owned(),
            source,
        };

        let body = response.text().await.map_err(|e| LinkError::Network {
            filename: filename.to_owned(),
            message: e.to_string(),
        })?;
        let parsed: LinkResponse = serde_json::from_str(&body)
            .map_err(|e| protocol(ProtocolError::new(format!("invalid JSON: {e}"))))?;
        parsed.into_link().map_err(protocol)
    }
}

fn pagination_error(tile: &str, year: i32, message: String) -> ManifestError {
    ManifestError::Protocol {
        tile: tile.to_owned(),
        year,
        source: ProtocolError::new(message),
    }
}

fn manifest_retryable(err: &ManifestError) -> bool {
    match err {
        ManifestError::Status { status, .. } => RETRYABLE_STATUSES.contains(status),
        ManifestError::Network { .. } => true,
        ManifestError::Protocol { .. } => false,
    }
}

#[async_trait::async_trait]
impl Archive for StarCloudClient {
    async fn list_files(&self, tile: &str, year: i32) -> Result<Vec<FileRecord>, ManifestError> {
        self.list_all(tile, year).await
    }

    async fn resolve_link(
        &self,
        filename: &str,
        tile: &str,
        year: i32,
        session: &AuthSession,
    ) -> Result<SignedLink, LinkError> {
        self.signed_link(filename, tile, year, session).await
    }
}
