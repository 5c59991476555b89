use std::path::PathBuf;
use std::sync::Arc;

use super::archive::ArchiveOpener;
use crate::core::cache::CacheStore;
use crate::core::downloader::{Downloader, PersistentDownloader};
use crate::core::instance::InstanceManager;
use crate::core::state::LauncherPaths;

/// Services an install task borrows from the application root.
#[derive(Clone)]
pub struct InstallContext {
    pub paths: LauncherPaths,
    pub http_client: reqwest::Client,
    pub downloader: Arc<Downloader>,
    pub objects: Arc<PersistentDownloader>,
    pub cache: Arc<CacheStore>,
    pub instances: InstanceManager,
    /// Java used for installer processors.
    pub java_bin: PathBuf,
    pub archives: Arc<dyn ArchiveOpener>,
}
