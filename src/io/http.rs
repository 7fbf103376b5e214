use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use super::ReadAt;

const MAX_RETRY: u32 = 10;

/// HTTP Range reader for packages hosted remotely.
///
/// Only the central directory and the members being classified are
/// downloaded, not the whole package.
pub struct HttpRangeReader {
    client: Client,
    url: String,
    size: u64,
    transferred_bytes: AtomicU64,
}

impl HttpRangeReader {
    /// Create a new HTTP Range reader
    ///
    /// This will send a HEAD request to verify Range support and get file size
    pub async fn new(url: String) -> io::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(io::Error::other)?;

        let resp = client.head(&url).send().await.map_err(io::Error::other)?;

        if !resp.status().is_success() {
            return Err(io::Error::other(format!(
                "HTTP request failed with status: {}",
                resp.status()
            )));
        }

        let accept_ranges = resp
            .headers()
            .get("accept-ranges")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("none");

        if !accept_ranges.contains("bytes") {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "remote server does not support Range requests",
            ));
        }

        let size = resp
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| io::Error::other("remote server did not return Content-Length"))?;

        debug!(%url, size, "remote package supports range requests");

        Ok(Self {
            client,
            url,
            size,
            transferred_bytes: AtomicU64::new(0),
        })
    }

    /// Get total bytes transferred from network
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ReadAt for HttpRangeReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || offset >= self.size {
            return Ok(0);
        }

        let end = (offset + buf.len() as u64 - 1).min(self.size - 1);
        let expected_size = (end - offset + 1) as usize;

        let mut received = 0;
        let mut retry_count = 0;

        while received < expected_size {
            let current_start = offset + received as u64;
            let range = format!("bytes={current_start}-{end}");

            let result = self
                .client
                .get(&self.url)
                .header("Range", &range)
                .send()
                .await;

            match result {
                Ok(resp) => {
                    if resp.status() != StatusCode::PARTIAL_CONTENT {
                        return Err(io::Error::other(format!(
                            "HTTP request failed with status: {}",
                            resp.status()
                        )));
                    }

                    let bytes = resp.bytes().await.map_err(io::Error::other)?;
                    if bytes.is_empty() {
                        break;
                    }
                    let chunk_len = bytes.len().min(expected_size - received);
                    buf[received..received + chunk_len].copy_from_slice(&bytes[..chunk_len]);
                    received += chunk_len;

                    self.transferred_bytes
                        .fetch_add(chunk_len as u64, Ordering::Relaxed);
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    retry_count += 1;
                    if retry_count >= MAX_RETRY {
                        return Err(io::Error::new(
                            io::ErrorKind::TimedOut,
                            "max retries exceeded",
                        ));
                    }
                    warn!(retry = retry_count, max = MAX_RETRY, error = %e, "connection error, retrying");
                    tokio::time::sleep(Duration::from_millis(500 * u64::from(retry_count))).await;
                }
                Err(e) => return Err(io::Error::other(e)),
            }
        }

        Ok(received)
    }

    fn size(&self) -> u64 {
        self.size
    }
}
