// ─── Persistent-Connection Downloader ───
// Fetches many small objects from one host over a handful of reused TLS
// connections. Opening a TLS session per object dominates the cost when
// there are tens of thousands of them, so each connection stays open and
// keeps pulling work until the queue is empty.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use reqwest::Url;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tracing::{debug, info, warn};

use super::client::PartialFile;
use super::http1::HttpConnection;
use super::integrity::{sha1_bytes, sha1_file};
use super::rate::TransferRate;
use super::DownloadMonitor;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::state::NetworkSettings;

/// `(url, destination, expected hash)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRequest {
    pub url: String,
    pub dest: PathBuf,
    pub sha1: String,
}

/// Opens byte streams to a host. The production connector speaks TLS on 443.
#[async_trait]
pub trait Connector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    async fn connect(&self, host: &str) -> LauncherResult<Self::Stream>;
}

pub struct TlsConnector {
    config: Arc<ClientConfig>,
    connect_timeout: Duration,
}

impl TlsConnector {
    /// TLS 1.2+ against the bundled web PKI roots, SNI set to the host.
    pub fn new(connect_timeout: Duration) -> Self {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        Self {
            config: Arc::new(config),
            connect_timeout,
        }
    }
}

#[async_trait]
impl Connector for TlsConnector {
    type Stream = TlsStream<TcpStream>;

    async fn connect(&self, host: &str) -> LauncherResult<Self::Stream> {
        let seconds = self.connect_timeout.as_secs();
        let connection_error = |reason: String| LauncherError::Connection {
            host: host.to_string(),
            reason,
        };

        let tcp = timeout(self.connect_timeout, TcpStream::connect((host, 443)))
            .await
            .map_err(|_| LauncherError::Timeout {
                action: format!("connecting to {}", host),
                seconds,
            })?
            .map_err(|e| connection_error(e.to_string()))?;
        let _ = tcp.set_nodelay(true);

        let server_name = ServerName::try_from(host)
            .map_err(|_| LauncherError::InvalidUrl(host.to_string()))?
            .to_owned();
        let connector = tokio_rustls::TlsConnector::from(self.config.clone());
        timeout(self.connect_timeout, connector.connect(server_name, tcp))
            .await
            .map_err(|_| LauncherError::Timeout {
                action: format!("TLS handshake with {}", host),
                seconds,
            })?
            .map_err(|e| connection_error(e.to_string()))
    }
}

/// Per-item accounting. A failed object never stops the others.
#[derive(Debug, Default)]
pub struct PersistentReport {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: Vec<(String, LauncherError)>,
    /// Left in the queue because the run was cancelled.
    pub not_attempted: usize,
}

impl PersistentReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.not_attempted == 0
    }
}

enum Fetched {
    Downloaded,
    Skipped,
}

struct Job {
    url: String,
    /// Path and query sent on the request line.
    target: String,
    dest: PathBuf,
    sha1: String,
}

pub struct PersistentDownloader<C: Connector = TlsConnector> {
    connector: C,
    connections: usize,
    io_timeout: Duration,
    rate: Arc<TransferRate>,
}

impl PersistentDownloader<TlsConnector> {
    pub fn new(network: &NetworkSettings) -> Self {
        Self::with_connector(
            TlsConnector::new(Duration::from_secs(network.connect_timeout_secs)),
            network.asset_connections,
            Duration::from_secs(network.io_timeout_secs),
        )
    }
}

impl<C: Connector> PersistentDownloader<C> {
    pub fn with_connector(connector: C, connections: usize, io_timeout: Duration) -> Self {
        Self {
            connector,
            connections: connections.max(1),
            io_timeout,
            rate: Arc::new(TransferRate::default()),
        }
    }

    /// Shared accumulator for UI rate display.
    pub fn rate(&self) -> Arc<TransferRate> {
        self.rate.clone()
    }

    /// Fetch every request over at most `connections` connections.
    ///
    /// Returns when each request has been accounted for, successfully or not.
    ///
    /// # Panics
    ///
    /// Panics if the URLs do not all parse and share one host; callers build
    /// these lists from a single base URL, so anything else is a bug.
    pub async fn download(
        &self,
        requests: Vec<ObjectRequest>,
        monitor: &dyn DownloadMonitor,
    ) -> PersistentReport {
        let total = requests.len();
        if total == 0 {
            monitor.on_progress(1.0);
            return PersistentReport::default();
        }

        let (host, jobs) = plan_jobs(requests);
        let workers = self.connections.min(total);
        info!(
            "Fetching {} objects from {} over {} connections",
            total, host, workers
        );

        let queue = Mutex::new(jobs.into_iter());
        let report = Mutex::new(PersistentReport::default());
        let finished = AtomicUsize::new(0);

        join_all((0..workers).map(|worker| {
            self.connection_loop(worker, &host, &queue, &report, &finished, total, monitor)
        }))
        .await;

        let mut report = report.into_inner().unwrap_or_else(PoisonError::into_inner);
        report.not_attempted = total - finished.load(Ordering::SeqCst);
        if !report.failed.is_empty() {
            warn!("{} of {} objects failed", report.failed.len(), total);
        }
        debug!(
            "Objects done: {} downloaded, {} already valid",
            report.downloaded, report.skipped
        );
        report
    }

    #[allow(clippy::too_many_arguments)]
    async fn connection_loop(
        &self,
        worker: usize,
        host: &str,
        queue: &Mutex<std::vec::IntoIter<Job>>,
        report: &Mutex<PersistentReport>,
        finished: &AtomicUsize,
        total: usize,
        monitor: &dyn DownloadMonitor,
    ) {
        let mut connection: Option<HttpConnection<C::Stream>> = None;
        let mut served = 0usize;

        loop {
            if monitor.is_cancelled() {
                debug!("Connection {} stopping: cancelled", worker);
                break;
            }
            let next = queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .next();
            let Some(job) = next else {
                break;
            };

            let result = self.fetch_object(host, &job, &mut connection).await;
            {
                let mut report = report.lock().unwrap_or_else(PoisonError::into_inner);
                match result {
                    Ok(Fetched::Downloaded) => report.downloaded += 1,
                    Ok(Fetched::Skipped) => report.skipped += 1,
                    Err(e) => {
                        warn!("Object {} failed: {}", job.url, e);
                        report.failed.push((job.url.clone(), e));
                    }
                }
            }
            served += 1;
            let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
            monitor.on_progress(done as f64 / total as f64);
        }

        if let Some(conn) = connection.take() {
            conn.close().await;
        }
        debug!("Connection {} served {} objects", worker, served);
    }

    async fn fetch_object(
        &self,
        host: &str,
        job: &Job,
        connection: &mut Option<HttpConnection<C::Stream>>,
    ) -> LauncherResult<Fetched> {
        if tokio::fs::try_exists(&job.dest).await.unwrap_or(false) {
            match sha1_file(&job.dest).await {
                Ok(actual) if actual.eq_ignore_ascii_case(&job.sha1) => return Ok(Fetched::Skipped),
                _ => {
                    debug!("Stale object at {:?}, fetching again", job.dest);
                    tokio::fs::remove_file(&job.dest)
                        .await
                        .map_err(|e| LauncherError::io(&job.dest, e))?;
                }
            }
        }

        let mut conn = match connection.take() {
            Some(conn) => conn,
            None => {
                let stream = self.connector.connect(host).await?;
                HttpConnection::new(host, stream, self.io_timeout)
            }
        };

        // On a transport error the connection is dropped and the next job
        // opens a fresh one.
        let (head, body) = conn.get(&job.target, &self.rate).await?;
        if head.keeps_alive() {
            *connection = Some(conn);
        } else {
            conn.close().await;
        }

        if head.status != 200 {
            return Err(LauncherError::DownloadFailed {
                url: job.url.clone(),
                status: head.status,
            });
        }

        let actual = sha1_bytes(&body);
        if !actual.eq_ignore_ascii_case(&job.sha1) {
            return Err(LauncherError::Sha1Mismatch {
                path: job.dest.clone(),
                expected: job.sha1.clone(),
                actual,
            });
        }

        if let Some(parent) = job.dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }
        let mut part = PartialFile::for_destination(&job.dest);
        tokio::fs::write(&part.path, &body)
            .await
            .map_err(|e| LauncherError::io(&part.path, e))?;
        tokio::fs::rename(&part.path, &job.dest)
            .await
            .map_err(|e| LauncherError::io(&job.dest, e))?;
        part.disarm();

        Ok(Fetched::Downloaded)
    }
}

fn plan_jobs(requests: Vec<ObjectRequest>) -> (String, Vec<Job>) {
    let mut host: Option<String> = None;
    let mut jobs = Vec::with_capacity(requests.len());

    for request in requests {
        let url = Url::parse(&request.url)
            .unwrap_or_else(|e| panic!("invalid object URL {}: {}", request.url, e));
        let request_host = url
            .host_str()
            .unwrap_or_else(|| panic!("object URL {} has no host", request.url))
            .to_string();
        match &host {
            None => host = Some(request_host),
            Some(expected) => assert_eq!(
                expected, &request_host,
                "persistent downloads must share one host"
            ),
        }

        let mut target = url.path().to_string();
        if let Some(query) = url.query() {
            target.push('?');
            target.push_str(query);
        }
        jobs.push(Job {
            url: request.url,
            target,
            dest: request.dest,
            sha1: request.sha1,
        });
    }

    (host.unwrap_or_default(), jobs)
}
