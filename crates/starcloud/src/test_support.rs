use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::progress::ProgressSink;
use crate::record::{FileRecord, TileYear};
use crate::remote::{Archive, AuthSession, LinkError, ManifestError, SignedLink, UserId};
use crate::transfer::{Transfer, TransferError};

/// A session accepted by [`InMemoryArchive`].
pub fn test_session() -> AuthSession {
    AuthSession {
        user_id: UserId::Numeric(1),
        user_name: "tester".to_owned(),
        token: "test-token".to_owned(),
    }
}

/// In-memory archive for testing. Links resolve to `mem://{tile}/{year}/{file}`.
#[derive(Default)]
pub struct InMemoryArchive {
    manifests: HashMap<TileYear, Vec<FileRecord>>,
    payloads: HashMap<String, Vec<u8>>,
    failing: HashSet<TileYear>,
    reject_sessions: bool,
    list_requests: AtomicUsize,
    link_requests: AtomicUsize,
}

impl InMemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url_for(tile: &str, year: i32, filename: &str) -> String {
        format!("mem://{tile}/{year}/{filename}")
    }

    /// List a file and serve `bytes` for it. Its declared size is `bytes.len()`.
    pub fn add_file(&mut self, tile: &str, year: i32, filename: &str, bytes: Vec<u8>) {
        self.add_record(tile, year, FileRecord::new(filename, bytes.len() as u64));
        self.payloads
            .insert(Self::url_for(tile, year, filename), bytes);
    }

    /// List a file without serving any content for it.
    pub fn add_record(&mut self, tile: &str, year: i32, record: FileRecord) {
        self.manifests
            .entry(TileYear::new(tile, year))
            .or_default()
            .push(record);
    }

    /// Make the file list of this pair fail with HTTP 500.
    pub fn fail_manifest(&mut self, tile: &str, year: i32) {
        self.failing.insert(TileYear::new(tile, year));
    }

    /// Refuse every link request with HTTP 401.
    pub fn reject_sessions(&mut self) {
        self.reject_sessions = true;
    }

    pub fn payloads(&self) -> &HashMap<String, Vec<u8>> {
        &self.payloads
    }

    pub fn list_requests(&self) -> usize {
        self.list_requests.load(Ordering::SeqCst)
    }

    pub fn link_requests(&self) -> usize {
        self.link_requests.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Archive for InMemoryArchive {
    async fn list_files(&self, tile: &str, year: i32) -> Result<Vec<FileRecord>, ManifestError> {
        self.list_requests.fetch_add(1, Ordering::SeqCst);
        let pair = TileYear::new(tile, year);

        if self.failing.contains(&pair) {
            return Err(ManifestError::Status {
                tile: tile.to_owned(),
                year,
                status: 500,
                body: "unavailable".to_owned(),
            });
        }

        Ok(self.manifests.get(&pair).cloned().unwrap_or_default())
    }

    async fn resolve_link(
        &self,
        filename: &str,
        tile: &str,
        year: i32,
        _session: &AuthSession,
    ) -> Result<SignedLink, LinkError> {
        self.link_requests.fetch_add(1, Ordering::SeqCst);

        if self.reject_sessions {
            return Err(LinkError::Unauthorized {
                filename: filename.to_owned(),
                status: 401,
            });
        }

        self.manifests
            .get(&TileYear::new(tile, year))
            .and_then(|files| files.iter().find(|f| f.filename == filename))
            .map(|record| SignedLink {
                filename: record.filename.clone(),
                url: Self::url_for(tile, year, filename),
                size: record.expected_size,
            })
            .ok_or_else(|| LinkError::Status {
                filename: filename.to_owned(),
                status: 404,
                body: "no such object".to_owned(),
            })
    }
}

/// Transfer that copies payloads out of an [`InMemoryArchive`].
pub struct MemoryTransfer {
    payloads: HashMap<String, Vec<u8>>,
    failures: HashMap<String, u16>,
    truncated: HashMap<String, usize>,
    expire_once: Mutex<HashSet<String>>,
    downloaded: Mutex<Vec<String>>,
}

impl MemoryTransfer {
    pub fn new(archive: &InMemoryArchive) -> Self {
        Self {
            payloads: archive.payloads().clone(),
            failures: HashMap::new(),
            truncated: HashMap::new(),
            expire_once: Mutex::new(HashSet::new()),
            downloaded: Mutex::new(Vec::new()),
        }
    }

    /// Always answer `url` with `status`.
    pub fn fail_url(&mut self, url: &str, status: u16) {
        self.failures.insert(url.to_owned(), status);
    }

    /// Refuse `url` as expired on its first request only.
    pub fn expire_once(&mut self, url: &str) {
        self.expire_once.lock().unwrap().insert(url.to_owned());
    }

    /// Serve only the first `len` bytes of `url`.
    pub fn truncate_url(&mut self, url: &str, len: usize) {
        self.truncated.insert(url.to_owned(), len);
    }

    /// URLs whose content was written, in request order.
    pub fn downloaded_urls(&self) -> Vec<String> {
        self.downloaded.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Transfer for MemoryTransfer {
    async fn download(
        &self,
        url: &str,
        dest: &Path,
        chunk_size: usize,
        progress: &dyn ProgressSink,
    ) -> Result<u64, TransferError> {
        if let Some(&status) = self.failures.get(url) {
            return Err(TransferError::Status { status });
        }
        if self.expire_once.lock().unwrap().remove(url) {
            return Err(TransferError::LinkExpired { status: 403 });
        }

        let payload = self
            .payloads
            .get(url)
            .ok_or(TransferError::Status { status: 404 })?;
        let body = match self.truncated.get(url) {
            Some(&len) => &payload[..len.min(payload.len())],
            None => &payload[..],
        };

        let total = Some(body.len() as u64);
        progress.on_length(total);

        let mut file = std::fs::File::create(dest).map_err(|e| TransferError::io(dest, e))?;
        let mut written = 0u64;
        for chunk in body.chunks(chunk_size.max(1)) {
            file.write_all(chunk).map_err(|e| TransferError::io(dest, e))?;
            written += chunk.len() as u64;
            progress.on_bytes(written, total);
        }

        self.downloaded.lock().unwrap().push(url.to_owned());
        Ok(written)
    }
}

/// One observed progress callback.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Begin {
        position: usize,
        count: usize,
        filename: String,
    },
    Length(Option<u64>),
    Bytes {
        downloaded: u64,
        total: Option<u64>,
    },
    End(bool),
}

/// Progress sink that records every callback.
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn started_files(&self) -> Vec<(usize, usize, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::Begin {
                    position,
                    count,
                    filename,
                } => Some((position, count, filename)),
                _ => None,
            })
            .collect()
    }

    /// Cumulative byte counts in reporting order.
    pub fn byte_reports(&self) -> Vec<(u64, Option<u64>)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::Bytes { downloaded, total } => Some((downloaded, total)),
                _ => None,
            })
            .collect()
    }

    pub fn finished(&self) -> Vec<bool> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::End(ok) => Some(ok),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl ProgressSink for RecordingProgress {
    fn begin_file(&self, position: usize, count: usize, filename: &str) {
        self.push(ProgressEvent::Begin {
            position,
            count,
            filename: filename.to_owned(),
        });
    }

    fn on_length(&self, total: Option<u64>) {
        self.push(ProgressEvent::Length(total));
    }

    fn on_bytes(&self, downloaded: u64, total: Option<u64>) {
        self.push(ProgressEvent::Bytes { downloaded, total });
    }

    fn end_file(&self, succeeded: bool) {
        self.push(ProgressEvent::End(succeeded));
    }
}
