// ─── Minimal HTTP/1.1 ───
// Just enough of the protocol to issue keep-alive GETs and read
// Content-Length delimited bodies off a long-lived stream.

use std::collections::HashMap;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use super::rate::TransferRate;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::http::APP_USER_AGENT;

const READ_CHUNK: usize = 16 * 1024;
const MAX_HEAD_BYTES: usize = 64 * 1024;
/// Bodies are buffered whole; larger declared lengths are refused unread.
pub const MAX_BODY_BYTES: u64 = 256 * 1024 * 1024;

/// Status line plus headers. Header names are stored exactly as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    pub reason: String,
    pub headers: HashMap<String, String>,
}

impl ResponseHead {
    /// Parse everything before the blank line.
    pub fn parse(raw: &[u8]) -> Result<Self, String> {
        let text = std::str::from_utf8(raw).map_err(|_| "response head is not UTF-8".to_string())?;
        let mut lines = text.split("\r\n");

        let status_line = lines.next().ok_or("empty response")?;
        let mut parts = status_line.splitn(3, ' ');
        let version = parts.next().unwrap_or_default();
        if !version.starts_with("HTTP/1.") {
            return Err(format!("unexpected status line '{}'", status_line));
        }
        let status = parts
            .next()
            .and_then(|s| s.parse::<u16>().ok())
            .ok_or_else(|| format!("bad status code in '{}'", status_line))?;
        let reason = parts.next().unwrap_or_default().to_string();

        let mut headers = HashMap::new();
        for line in lines.filter(|l| !l.is_empty()) {
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| format!("malformed header line '{}'", line))?;
            headers.insert(name.trim().to_string(), value.trim().to_string());
        }

        Ok(Self {
            status,
            reason,
            headers,
        })
    }

    /// Exact-name lookup first; servers that lowercase names still resolve.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str).or_else(|| {
            self.headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        })
    }

    pub fn content_length(&self) -> Option<u64> {
        self.header("Content-Length")?.parse().ok()
    }

    pub fn is_chunked(&self) -> bool {
        self.header("Transfer-Encoding")
            .map_or(false, |v| v.to_ascii_lowercase().contains("chunked"))
    }

    pub fn keeps_alive(&self) -> bool {
        !self
            .header("Connection")
            .map_or(false, |v| v.eq_ignore_ascii_case("close"))
    }
}

pub fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

pub fn request_bytes(host: &str, path: &str) -> Vec<u8> {
    format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nUser-Agent: {}\r\nAccept-Encoding: identity\r\nConnection: keep-alive\r\n\r\n",
        path, host, APP_USER_AGENT
    )
    .into_bytes()
}

/// One persistent connection. Bytes read past the end of a body stay
/// buffered for the next response.
pub struct HttpConnection<S> {
    host: String,
    stream: S,
    buf: Vec<u8>,
    chunk: Box<[u8]>,
    io_timeout: Duration,
}

impl<S> HttpConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(host: impl Into<String>, stream: S, io_timeout: Duration) -> Self {
        Self {
            host: host.into(),
            stream,
            buf: Vec::new(),
            chunk: vec![0u8; READ_CHUNK].into_boxed_slice(),
            io_timeout,
        }
    }

    /// Issue `GET path` and read the complete response.
    pub async fn get(
        &mut self,
        path: &str,
        rate: &TransferRate,
    ) -> LauncherResult<(ResponseHead, Vec<u8>)> {
        let request = request_bytes(&self.host, path);
        let seconds = self.io_timeout.as_secs();
        timeout(self.io_timeout, self.stream.write_all(&request))
            .await
            .map_err(|_| LauncherError::Timeout {
                action: format!("sending request to {}", self.host),
                seconds,
            })?
            .map_err(|e| self.connection_error(e))?;

        let head = loop {
            let head = self.read_head(rate).await?;
            // interim 1xx responses carry no body
            if !(100..200).contains(&head.status) {
                break head;
            }
        };

        if head.is_chunked() {
            return Err(self.malformed("chunked transfer encoding is not supported"));
        }
        let Some(length) = head.content_length() else {
            return Err(self.malformed("response has no Content-Length"));
        };
        if length > MAX_BODY_BYTES {
            return Err(self.malformed(&format!(
                "Content-Length {} exceeds the {} byte limit",
                length, MAX_BODY_BYTES
            )));
        }

        while (self.buf.len() as u64) < length {
            if self.fill(rate).await? == 0 {
                return Err(LauncherError::ContentLengthMismatch {
                    url: format!("https://{}{}", self.host, path),
                    expected: length,
                    actual: self.buf.len() as u64,
                });
            }
        }

        let body: Vec<u8> = self.buf.drain(..length as usize).collect();
        Ok((head, body))
    }

    pub async fn close(mut self) {
        let _ = timeout(self.io_timeout, self.stream.shutdown()).await;
    }

    async fn read_head(&mut self, rate: &TransferRate) -> LauncherResult<ResponseHead> {
        let end = loop {
            if let Some(pos) = find_header_end(&self.buf) {
                break pos;
            }
            if self.buf.len() > MAX_HEAD_BYTES {
                return Err(self.malformed("response head too large"));
            }
            if self.fill(rate).await? == 0 {
                return Err(self.malformed("connection closed before response head"));
            }
        };

        let head = ResponseHead::parse(&self.buf[..end]).map_err(|reason| self.malformed(&reason))?;
        self.buf.drain(..end + 4);
        Ok(head)
    }

    async fn fill(&mut self, rate: &TransferRate) -> LauncherResult<usize> {
        let seconds = self.io_timeout.as_secs();
        let n = timeout(self.io_timeout, self.stream.read(&mut self.chunk))
            .await
            .map_err(|_| LauncherError::Timeout {
                action: format!("reading from {}", self.host),
                seconds,
            })?
            .map_err(|e| self.connection_error(e))?;
        self.buf.extend_from_slice(&self.chunk[..n]);
        rate.record(n);
        Ok(n)
    }

    fn malformed(&self, reason: &str) -> LauncherError {
        LauncherError::MalformedResponse {
            host: self.host.clone(),
            reason: reason.to_string(),
        }
    }

    fn connection_error(&self, e: std::io::Error) -> LauncherError {
        LauncherError::Connection {
            host: self.host.clone(),
            reason: e.to_string(),
        }
    }
}
