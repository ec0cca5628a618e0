use async_trait::async_trait;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, RANGE};
use reqwest::{Client, Response, StatusCode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use super::Blob;
use crate::error::{Error, Result};
use crate::stream::ChunkSource;
use crate::tokenizer::FileInfo;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRY: u32 = 10;

fn build_client() -> Result<Client> {
    Ok(Client::builder().timeout(REQUEST_TIMEOUT).build()?)
}

/// Client for a single long-lived body: only connecting and each idle gap
/// between reads are bounded, never the whole transfer.
fn build_stream_client(idle_timeout: Duration) -> Result<Client> {
    Ok(Client::builder()
        .connect_timeout(idle_timeout)
        .read_timeout(idle_timeout)
        .build()?)
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// HTTP Range reader for remote archives
///
/// Every [`Blob::slice`] call turns into one or more `Range` requests, so a
/// random-access tokenizer over this reader only downloads what it reads.
pub struct HttpRangeReader {
    client: Client,
    url: String,
    size: u64,
    mime_type: Option<String>,
    transferred_bytes: AtomicU64,
    max_retry: u32,
}

impl HttpRangeReader {
    /// Create a new HTTP Range reader
    ///
    /// This will send a HEAD request to verify Range support and get file size
    pub async fn new(url: String) -> Result<Self> {
        let client = build_client()?;

        let resp = client.head(&url).send().await?;

        if !resp.status().is_success() {
            return Err(Error::HttpStatus(resp.status()));
        }

        let accept_ranges = resp
            .headers()
            .get(ACCEPT_RANGES)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("none");

        if !accept_ranges.contains("bytes") {
            return Err(Error::RangeNotSupported);
        }

        let size = content_length(resp.headers()).ok_or(Error::MissingContentLength)?;
        let mime_type = content_type(resp.headers());
        debug!(%url, size, ?mime_type, "opened ranged HTTP source");

        Ok(Self {
            client,
            url,
            size,
            mime_type,
            transferred_bytes: AtomicU64::new(0),
            max_retry: MAX_RETRY,
        })
    }

    /// Get total bytes transferred from network
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Blob for HttpRangeReader {
    async fn slice(&self, start: u64, end: u64) -> Result<Vec<u8>> {
        let end = end.min(self.size);
        if start >= end {
            return Ok(Vec::new());
        }

        let expected_size = (end - start) as usize;
        let mut buf = Vec::with_capacity(expected_size);
        let mut retry_count = 0;

        while buf.len() < expected_size {
            let current_start = start + buf.len() as u64;
            let range = format!("bytes={}-{}", current_start, end - 1);

            let result = self
                .client
                .get(&self.url)
                .header(RANGE, &range)
                .send()
                .await;

            match result {
                Ok(resp) => {
                    if resp.status() != StatusCode::PARTIAL_CONTENT {
                        return Err(Error::HttpStatus(resp.status()));
                    }

                    let bytes = resp.bytes().await?;
                    if bytes.is_empty() {
                        // server gave up early; the caller sees a short slice
                        break;
                    }
                    let chunk_len = bytes.len().min(expected_size - buf.len());
                    buf.extend_from_slice(&bytes[..chunk_len]);

                    self.transferred_bytes
                        .fetch_add(chunk_len as u64, Ordering::Relaxed);
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    retry_count += 1;
                    if retry_count >= self.max_retry {
                        return Err(e.into());
                    }
                    warn!(
                        "Connection error, retry {}/{}: {}",
                        retry_count, self.max_retry, e
                    );
                    tokio::time::sleep(Duration::from_millis(500 * retry_count as u64)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(buf)
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }
}

/// Sequential body of a single HTTP GET, delivered chunk by chunk.
pub struct HttpStream {
    response: Response,
    file_info: FileInfo,
}

impl HttpStream {
    pub async fn open(url: String) -> Result<Self> {
        Self::with_idle_timeout(url, REQUEST_TIMEOUT).await
    }

    /// Open a GET that fails only when the server stalls for `idle_timeout`.
    pub async fn with_idle_timeout(url: String, idle_timeout: Duration) -> Result<Self> {
        let client = build_stream_client(idle_timeout)?;
        let response = client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(Error::HttpStatus(response.status()));
        }

        let file_info = FileInfo {
            size: content_length(response.headers()),
            path: Some(url),
            mime_type: content_type(response.headers()),
        };
        debug!(?file_info, "opened streaming HTTP source");

        Ok(Self {
            response,
            file_info,
        })
    }

    pub fn file_info(&self) -> &FileInfo {
        &self.file_info
    }
}

#[async_trait]
impl ChunkSource for HttpStream {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        let chunk = self.response.chunk().await?;
        Ok(chunk.map(|bytes| bytes.to_vec()))
    }
}
