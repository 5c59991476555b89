use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Client;
use tracing::{info, warn};

use super::settings::{default_data_dir, LauncherPaths, LauncherSettings};
use crate::core::cache::CacheStore;
use crate::core::downloader::{Downloader, PersistentDownloader};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::http::build_http_client;
use crate::core::instance::{Instance, InstanceManager, InstanceState, LoaderType};
use crate::core::loaders::{
    list_loader_versions, GameInstaller, InstallContext, LoaderFlavor, ModLoaderInstaller, ZipOpener,
};
use crate::core::mods::{ModFile, ModFilesInstaller};
use crate::core::task::{GroupOutcome, InstallTask, InstallTaskGroup, TaskObserver};

/// Application root. Owns every long-lived service; tasks borrow them
/// through an [`InstallContext`].
pub struct AppState {
    pub settings: LauncherSettings,
    pub paths: LauncherPaths,
    pub http_client: Client,
    pub downloader: Arc<Downloader>,
    pub objects: Arc<PersistentDownloader>,
    pub cache: Arc<CacheStore>,
    pub instances: InstanceManager,
}

impl AppState {
    /// State rooted at the platform data dir, or wherever the bootstrap file
    /// redirects it.
    pub async fn load() -> LauncherResult<Self> {
        Self::new(default_data_dir()).await
    }

    pub async fn new(data_dir: impl Into<PathBuf>) -> LauncherResult<Self> {
        let paths = LauncherPaths::new(data_dir);
        tokio::fs::create_dir_all(&paths.data_dir)
            .await
            .map_err(|e| LauncherError::io(&paths.data_dir, e))?;
        let settings = LauncherSettings::load(&paths.data_dir);

        let http_client = build_http_client(&settings.network)?;
        let downloader = Arc::new(
            Downloader::new(http_client.clone())
                .with_concurrency(settings.network.download_concurrency),
        );
        let objects = Arc::new(PersistentDownloader::new(&settings.network));
        let cache = Arc::new(CacheStore::open(paths.cache_dir()).await);
        let instances = InstanceManager::new(paths.instances_dir());

        info!("Launcher data at {:?}", paths.data_dir);
        Ok(Self {
            settings,
            paths,
            http_client,
            downloader,
            objects,
            cache,
            instances,
        })
    }

    pub fn install_context(&self) -> InstallContext {
        InstallContext {
            paths: self.paths.clone(),
            http_client: self.http_client.clone(),
            downloader: self.downloader.clone(),
            objects: self.objects.clone(),
            cache: self.cache.clone(),
            instances: self.instances.clone(),
            java_bin: self.settings.java_binary(),
            archives: Arc::new(ZipOpener),
        }
    }

    /// Versions of `kind` available for `minecraft_version`. Empty for
    /// vanilla.
    pub async fn loader_versions(
        &self,
        kind: LoaderType,
        minecraft_version: &str,
    ) -> LauncherResult<Vec<String>> {
        match LoaderFlavor::for_loader(kind) {
            Some(flavor) => list_loader_versions(&self.downloader, &flavor, minecraft_version).await,
            None => Ok(Vec::new()),
        }
    }

    /// Run `group` for instance `id`, persisting its lifecycle: `Installing`
    /// while the group runs, then `Ready` when every task completed and
    /// `Error` otherwise.
    pub async fn run_install(
        &self,
        id: &str,
        group: &InstallTaskGroup,
    ) -> LauncherResult<GroupOutcome> {
        self.instances.set_state(id, InstanceState::Installing).await?;

        let outcome = group.run().await;
        let state = match &outcome {
            GroupOutcome::Completed => InstanceState::Ready,
            GroupOutcome::Failed { key, error } => {
                warn!("Install of {} failed at '{}': {}", id, key, error);
                InstanceState::Error
            }
            GroupOutcome::Cancelled { key } => {
                info!("Install of {} cancelled at '{}'", id, key);
                InstanceState::Error
            }
        };
        self.instances.set_state(id, state).await?;
        Ok(outcome)
    }

    /// The ordered install for one instance: `game`, then `loader` when a
    /// Forge or NeoForge version is given, then `mods` when there are any.
    pub fn install_group(
        &self,
        instance: &Instance,
        loader: Option<(LoaderType, String)>,
        mods: Vec<ModFile>,
        pack_name: &str,
        observer: Arc<dyn TaskObserver>,
    ) -> InstallTaskGroup {
        let ctx = self.install_context();
        let mut group = InstallTaskGroup::new();

        group.insert(
            "game",
            Arc::new(InstallTask::new(
                GameInstaller::new(ctx.clone(), instance.clone()),
                observer.clone(),
            )),
        );

        if let Some((kind, version)) = loader {
            match LoaderFlavor::for_loader(kind) {
                Some(flavor) => group.insert(
                    "loader",
                    Arc::new(InstallTask::new(
                        ModLoaderInstaller::new(ctx.clone(), flavor, instance.clone(), version),
                        observer.clone(),
                    )),
                ),
                None => info!("{} needs no loader install", kind),
            }
        }

        if !mods.is_empty() {
            group.insert(
                "mods",
                Arc::new(InstallTask::new(
                    ModFilesInstaller::new(
                        self.downloader.clone(),
                        instance.clone(),
                        pack_name,
                        mods,
                    ),
                    observer,
                )),
            );
        }
        group
    }
}
