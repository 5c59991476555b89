mod client;
mod http1;
mod integrity;
mod persistent;
mod rate;
mod transport;

pub use client::{BatchSummary, DownloadItem, Downloader, ReplacePolicy};
pub use http1::{HttpConnection, ResponseHead};
pub use integrity::{sha1_bytes, sha1_file};
pub use persistent::{Connector, ObjectRequest, PersistentDownloader, PersistentReport, TlsConnector};
pub use rate::TransferRate;
pub use transport::{HttpTransport, Transport};

/// What a download engine reports to while it works: fractional progress of
/// the whole batch and the cooperative cancellation flag.
pub trait DownloadMonitor: Send + Sync {
    fn on_progress(&self, _fraction: f64) {}

    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Silent monitor for callers that do not track progress.
impl DownloadMonitor for () {}

#[cfg(test)]
pub(crate) use transport::testing::MapTransport;
