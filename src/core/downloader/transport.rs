use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::core::error::{LauncherError, LauncherResult};

/// Byte source used by the pooled downloader.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Stream `url` into `sink`, calling `progress(received, total)` after
    /// each chunk. Returns the number of bytes written.
    async fn fetch(
        &self,
        url: &str,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
        progress: &(dyn Fn(u64, Option<u64>) + Send + Sync),
    ) -> LauncherResult<u64>;
}

/// reqwest-backed transport, one request per file.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(
        &self,
        url: &str,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
        progress: &(dyn Fn(u64, Option<u64>) + Send + Sync),
    ) -> LauncherResult<u64> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let total = response.content_length();
        let mut received = 0u64;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            sink.write_all(&chunk).await?;
            received += chunk.len() as u64;
            progress(received, total);
        }
        sink.flush().await?;

        if let Some(expected) = total {
            if expected != received {
                return Err(LauncherError::ContentLengthMismatch {
                    url: url.to_string(),
                    expected,
                    actual: received,
                });
            }
        }

        Ok(received)
    }
}
