use std::path::Path;
use std::time::Duration;

use starcloud::{ProgressSink, Transfer, TransferError};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::retry::RetryPolicy;

/// Streams signed URLs to disk over HTTP, retrying transient faults.
///
/// Every attempt truncates the destination and starts from byte 0.
pub struct HttpTransfer {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpTransfer {
    pub fn new(read_timeout: Duration, retry: RetryPolicy) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .read_timeout(read_timeout)
            .build()?;
        Ok(Self::with_client(client, retry))
    }

    pub(crate) fn with_client(client: reqwest::Client, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    async fn attempt(
        &self,
        url: &str,
        dest: &Path,
        chunk_size: usize,
        progress: &dyn ProgressSink,
    ) -> Result<u64, TransferError> {
        let mut response = self.client.get(url).send().await.map_err(classify)?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(TransferError::LinkExpired {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(TransferError::Status {
                status: status.as_u16(),
            });
        }

        let total = response.content_length();
        progress.on_length(total);

        let mut file = File::create(dest)
            .await
            .map_err(|e| TransferError::io(dest, e))?;
        let chunk_size = chunk_size.max(1);
        let mut buffer: Vec<u8> = Vec::with_capacity(chunk_size);
        let mut written = 0u64;

        while let Some(bytes) = response.chunk().await.map_err(classify)? {
            buffer.extend_from_slice(&bytes);
            while buffer.len() >= chunk_size {
                let rest = buffer.split_off(chunk_size);
                written += write_chunk(&mut file, dest, &buffer).await?;
                buffer = rest;
                progress.on_bytes(written, total);
            }
        }
        if !buffer.is_empty() {
            written += write_chunk(&mut file, dest, &buffer).await?;
            progress.on_bytes(written, total);
        }

        Ok(written)
    }
}

async fn write_chunk(file: &mut File, dest: &Path, chunk: &[u8]) -> Result<u64, TransferError> {
    file.write_all(chunk)
        .await
        .map_err(|e| TransferError::io(dest, e))?;
    file.flush().await.map_err(|e| TransferError::io(dest, e))?;
    Ok(chunk.len() as u64)
}

fn classify(err: reqwest::Error) -> TransferError {
    if err.is_builder() {
        TransferError::Request(err.to_string())
    } else if err.is_timeout() {
        TransferError::Timeout(err.to_string())
    } else if err.is_connect() {
        TransferError::Connect(err.to_string())
    } else {
        TransferError::Stream(err.to_string())
    }
}

#[async_trait::async_trait]
impl Transfer for HttpTransfer {
    async fn download(
        &self,
        url: &str,
        dest: &Path,
        chunk_size: usize,
        progress: &dyn ProgressSink,
    ) -> Result<u64, TransferError> {
        let file = dest
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut retry = 0;

        loop {
            match self.attempt(url, dest, chunk_size, progress).await {
                Ok(written) => {
                    debug!(file = %file, bytes = written, "transfer complete");
                    return Ok(written);
                }
                Err(err) if err.is_retryable() => {
                    if retry >= self.retry.max_retries {
                        return Err(TransferError::Exhausted {
                            attempts: self.retry.max_attempts(),
                            last: Box::new(err),
                        });
                    }
                    retry += 1;
                    warn!(file = %file, retry, error = %err, "retrying transfer");
                    self.retry.pause(retry).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
