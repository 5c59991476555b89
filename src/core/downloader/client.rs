use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::future::try_join_all;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::integrity::sha1_file;
use super::transport::{HttpTransport, Transport};
use super::DownloadMonitor;
use crate::core::error::{LauncherError, LauncherResult};

/// One file to fetch. Produced by the caller, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadItem {
    pub url: String,
    /// Tried with an implicit `Replace` policy when `url` fails.
    pub fallback_url: Option<String>,
    pub dest: PathBuf,
    pub sha1: Option<String>,
    pub size: Option<u64>,
}

impl DownloadItem {
    pub fn new(url: impl Into<String>, dest: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            fallback_url: None,
            dest: dest.into(),
            sha1: None,
            size: None,
        }
    }

    pub fn with_fallback(mut self, url: impl Into<String>) -> Self {
        self.fallback_url = Some(url.into());
        self
    }

    pub fn with_sha1(mut self, sha1: impl Into<String>) -> Self {
        self.sha1 = Some(sha1.into());
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }
}

/// What to do when a destination already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplacePolicy {
    /// Count the item complete without touching the network. If the item
    /// declares a hash and the file does not match, it is fetched again.
    #[default]
    Skip,
    Replace,
    FailIfExists,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub downloaded: usize,
    pub skipped: usize,
    pub bytes: u64,
}

enum ItemOutcome {
    Downloaded(u64),
    Skipped,
}

/// Bounded-concurrency downloader for independent files on arbitrary hosts.
///
/// A batch runs exactly `concurrency` workers that pull items from a shared
/// cursor; a worker takes the next item as soon as its current one finishes.
pub struct Downloader {
    transport: Arc<dyn Transport>,
    /// Maximum number of parallel downloads.
    concurrency: usize,
    /// How often aggregate progress is sampled and published.
    sample_interval: Duration,
}

impl Downloader {
    pub fn new(client: Client) -> Self {
        Self::with_transport(Arc::new(HttpTransport::new(client)))
    }

    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            concurrency: 8,
            sample_interval: Duration::from_millis(200),
        }
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn with_sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = interval;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    // ── Single file download ────────────────────────────

    /// Download a single file to `dest`, replacing whatever is there.
    pub async fn download_file(
        &self,
        url: &str,
        dest: &Path,
        sha1_expected: Option<&str>,
    ) -> LauncherResult<()> {
        self.download_file_with_progress(url, dest, sha1_expected, &())
            .await
    }

    pub async fn download_file_with_progress(
        &self,
        url: &str,
        dest: &Path,
        sha1_expected: Option<&str>,
        monitor: &dyn DownloadMonitor,
    ) -> LauncherResult<()> {
        let mut item = DownloadItem::new(url, dest);
        item.sha1 = sha1_expected.map(str::to_string);
        self.download_all(vec![item], ReplacePolicy::Replace, monitor)
            .await
            .map(|_| ())
    }

    /// Fetch a small document (metadata, manifests) into memory.
    pub async fn fetch_bytes(&self, url: &str) -> LauncherResult<Vec<u8>> {
        let mut body = Vec::new();
        self.transport
            .fetch(url, &mut body, &|_: u64, _: Option<u64>| {})
            .await?;
        Ok(body)
    }

    // ── Batch concurrent downloads ──────────────────────

    /// Download every item, honouring `policy` for existing destinations.
    ///
    /// Returns once all items are in place. The first terminal error aborts
    /// the batch; in-flight transfers are dropped and their partial files
    /// removed, so a destination that did not exist before never holds a
    /// half-written file.
    pub async fn download_all(
        &self,
        items: Vec<DownloadItem>,
        policy: ReplacePolicy,
        monitor: &dyn DownloadMonitor,
    ) -> LauncherResult<BatchSummary> {
        if items.is_empty() {
            monitor.on_progress(1.0);
            return Ok(BatchSummary::default());
        }

        let workers = self.concurrency.min(items.len());
        info!(
            "Starting batch download: {} files, concurrency={}",
            items.len(),
            workers
        );

        let state = BatchState::new(items.len());
        let cursor = AtomicUsize::new(0);

        let work = try_join_all(
            (0..workers).map(|_| self.worker(&items, &cursor, &state, policy, monitor)),
        );
        tokio::pin!(work);

        let mut ticker = tokio::time::interval(self.sample_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut published = 0.0f64;

        let result = loop {
            tokio::select! {
                res = &mut work => break res,
                _ = ticker.tick() => {
                    let fraction = state.fraction();
                    if fraction > published {
                        published = fraction;
                        monitor.on_progress(fraction);
                    }
                }
            }
        };
        result?;

        monitor.on_progress(1.0);
        let summary = state.summary();
        debug!(
            "Batch finished: {} downloaded, {} skipped, {} bytes",
            summary.downloaded, summary.skipped, summary.bytes
        );
        Ok(summary)
    }

    async fn worker(
        &self,
        items: &[DownloadItem],
        cursor: &AtomicUsize,
        state: &BatchState,
        policy: ReplacePolicy,
        monitor: &dyn DownloadMonitor,
    ) -> LauncherResult<()> {
        loop {
            if monitor.is_cancelled() {
                return Err(LauncherError::Cancelled);
            }
            let index = cursor.fetch_add(1, Ordering::SeqCst);
            let Some(item) = items.get(index) else {
                return Ok(());
            };

            match self.download_item(index, item, policy, state).await? {
                ItemOutcome::Downloaded(bytes) => state.record_download(bytes),
                ItemOutcome::Skipped => state.record_skip(),
            }
            state.set(index, 1.0);
        }
    }

    async fn download_item(
        &self,
        index: usize,
        item: &DownloadItem,
        policy: ReplacePolicy,
        state: &BatchState,
    ) -> LauncherResult<ItemOutcome> {
        if tokio::fs::try_exists(&item.dest).await.unwrap_or(false) {
            match policy {
                ReplacePolicy::FailIfExists => {
                    return Err(LauncherError::DestinationExists(item.dest.clone()));
                }
                ReplacePolicy::Skip => {
                    if existing_file_is_valid(item).await {
                        return Ok(ItemOutcome::Skipped);
                    }
                    warn!("Existing {:?} failed verification, fetching again", item.dest);
                }
                ReplacePolicy::Replace => {}
            }
        }

        let on_bytes = |received: u64, total: Option<u64>| {
            if let Some(total) = total.or(item.size).filter(|t| *t > 0) {
                state.set(index, (received as f64 / total as f64).min(0.99));
            }
        };

        match self.fetch_to(&item.url, item, &on_bytes).await {
            Ok(bytes) => Ok(ItemOutcome::Downloaded(bytes)),
            Err(primary) => {
                let Some(fallback) = &item.fallback_url else {
                    return Err(primary);
                };
                warn!(
                    "Primary URL {} failed ({}), trying fallback {}",
                    item.url, primary, fallback
                );
                state.set(index, 0.0);
                self.fetch_to(fallback, item, &on_bytes)
                    .await
                    .map(ItemOutcome::Downloaded)
            }
        }
    }

    /// Stream `url` into a sibling `.part` file, verify, then rename into place.
    async fn fetch_to(
        &self,
        url: &str,
        item: &DownloadItem,
        on_bytes: &(dyn Fn(u64, Option<u64>) + Send + Sync),
    ) -> LauncherResult<u64> {
        let dest = &item.dest;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }

        let mut part = PartialFile::for_destination(dest);
        let received = {
            let mut file = tokio::fs::File::create(&part.path)
                .await
                .map_err(|e| LauncherError::io(&part.path, e))?;
            let received = self.transport.fetch(url, &mut file, on_bytes).await?;
            file.flush()
                .await
                .map_err(|e| LauncherError::io(&part.path, e))?;
            // handle dropped here so the rename below works on Windows
            received
        };

        if let Some(expected) = &item.sha1 {
            let actual = sha1_file(&part.path).await?;
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(LauncherError::Sha1Mismatch {
                    path: dest.clone(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        tokio::fs::rename(&part.path, dest)
            .await
            .map_err(|e| LauncherError::io(dest, e))?;
        part.disarm();

        debug!("Downloaded: {} -> {:?}", url, dest);
        Ok(received)
    }
}

async fn existing_file_is_valid(item: &DownloadItem) -> bool {
    let Some(expected) = &item.sha1 else {
        return true;
    };
    match sha1_file(&item.dest).await {
        Ok(actual) => actual.eq_ignore_ascii_case(expected),
        Err(_) => false,
    }
}

/// Per-batch progress bookkeeping shared by all workers.
struct BatchState {
    total: usize,
    inner: Mutex<ProgressSum>,
    downloaded: AtomicUsize,
    skipped: AtomicUsize,
    bytes: AtomicU64,
}

struct ProgressSum {
    per_item: Vec<f64>,
    sum: f64,
}

impl BatchState {
    fn new(total: usize) -> Self {
        Self {
            total,
            inner: Mutex::new(ProgressSum {
                per_item: vec![0.0; total],
                sum: 0.0,
            }),
            downloaded: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
            bytes: AtomicU64::new(0),
        }
    }

    fn set(&self, index: usize, fraction: f64) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let fraction = fraction.clamp(0.0, 1.0);
        let old = inner.per_item[index];
        inner.per_item[index] = fraction;
        inner.sum += fraction - old;
    }

    fn fraction(&self) -> f64 {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        (inner.sum / self.total as f64).clamp(0.0, 1.0)
    }

    fn record_download(&self, bytes: u64) {
        self.downloaded.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    fn record_skip(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    fn summary(&self) -> BatchSummary {
        BatchSummary {
            downloaded: self.downloaded.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
        }
    }
}

/// `.part` file that deletes itself unless it was renamed into place.
pub(super) struct PartialFile {
    pub(super) path: PathBuf,
    armed: bool,
}

impl PartialFile {
    /// `<dest>.part`, keeping the destination's own extension.
    pub(super) fn for_destination(dest: &Path) -> Self {
        let mut name = dest.file_name().unwrap_or_default().to_os_string();
        name.push(".part");
        Self {
            path: dest.with_file_name(name),
            armed: true,
        }
    }

    pub(super) fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.armed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}
