use async_trait::async_trait;
use tracing::{info, warn};

use super::context::InstallContext;
use crate::core::assets::AssetManager;
use crate::core::downloader::ReplacePolicy;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::Instance;
use crate::core::maven::MAVEN_CENTRAL;
use crate::core::task::{TaskContext, TaskRoutine, TaskStage};
use crate::core::version::{VersionJson, VersionManifest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GameStage {
    ResolveVersion,
    DownloadClient,
    DownloadLibraries,
    DownloadAssets,
}

impl TaskStage for GameStage {
    const ALL: &'static [Self] = &[
        GameStage::ResolveVersion,
        GameStage::DownloadClient,
        GameStage::DownloadLibraries,
        GameStage::DownloadAssets,
    ];

    fn label(self) -> &'static str {
        match self {
            GameStage::ResolveVersion => "resolve_version",
            GameStage::DownloadClient => "download_client",
            GameStage::DownloadLibraries => "download_libraries",
            GameStage::DownloadAssets => "download_assets",
        }
    }

    fn weight(self) -> f64 {
        match self {
            GameStage::ResolveVersion => 0.05,
            GameStage::DownloadClient => 0.15,
            GameStage::DownloadLibraries => 0.3,
            GameStage::DownloadAssets => 0.5,
        }
    }
}

/// Vanilla install: version manifest, client jar, libraries (OS rules
/// applied) and assets.
pub struct GameInstaller {
    ctx: InstallContext,
    instance: Instance,
}

impl GameInstaller {
    pub fn new(ctx: InstallContext, instance: Instance) -> Self {
        Self { ctx, instance }
    }

    fn version(&self) -> &str {
        &self.instance.minecraft_version
    }

    /// The shared `versions/<mc>/<mc>.json`, fetched from Mojang unless it
    /// is already on disk.
    async fn resolve_version(&self) -> LauncherResult<(VersionJson, String)> {
        let path = self.ctx.paths.version_manifest(self.version());
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            info!("Using version manifest on disk: {:?}", path);
            return VersionJson::load(&path).await;
        }

        let manifest = VersionManifest::fetch(&self.ctx.http_client).await?;
        let entry = manifest.find_version(self.version()).ok_or_else(|| {
            LauncherError::Other(format!(
                "Minecraft version {} not found in manifest",
                self.version()
            ))
        })?;
        let (json, raw) = entry.fetch_json(&self.ctx.http_client).await?;
        write_file(&path, &raw).await?;
        Ok((json, raw))
    }

    async fn download_assets(&self, task: &TaskContext<GameStage>, json: &VersionJson) -> LauncherResult<()> {
        let Some(index) = &json.asset_index else {
            warn!("{} declares no asset index", self.version());
            task.set_stage_progress(1.0);
            return Ok(());
        };

        let result = AssetManager::download_assets(
            &self.ctx.http_client,
            index,
            &self.ctx.paths.assets_dir(),
            &*self.ctx.objects,
            task,
        )
        .await;
        task.check_cancelled()?;

        // Missing assets degrade the game, they do not block it.
        match result {
            Ok(report) if report.is_complete() => {}
            Ok(report) => warn!(
                "{} asset objects failed, {} not attempted",
                report.failed.len(),
                report.not_attempted
            ),
            Err(e) => warn!("Asset download for {} failed: {}", self.version(), e),
        }
        Ok(())
    }
}

#[async_trait]
impl TaskRoutine for GameInstaller {
    type Stage = GameStage;

    fn name(&self) -> String {
        format!("minecraft-{}", self.version())
    }

    async fn run(&self, task: &TaskContext<GameStage>) -> LauncherResult<()> {
        info!("Installing Minecraft {} into {}", self.version(), self.instance.id);

        task.enter_stage(GameStage::ResolveVersion)?;
        let (json, raw) = self.resolve_version().await?;
        write_file(&self.instance.manifest_path(), &raw).await?;

        task.enter_stage(GameStage::DownloadClient)?;
        let client = json.client().ok_or_else(|| {
            LauncherError::Other(format!("{} has no client download", self.version()))
        })?;
        let jar = self.ctx.paths.version_jar(self.version());
        self.ctx
            .downloader
            .download_all(vec![client.download_item(&jar)], ReplacePolicy::Skip, task)
            .await?;

        task.enter_stage(GameStage::DownloadLibraries)?;
        let libraries_dir = self.ctx.paths.libraries_dir();
        let items: Vec<_> = json
            .libraries_for_current_os()
            .iter()
            .filter_map(|lib| lib.download_item(&libraries_dir, Some(MAVEN_CENTRAL)))
            .collect();
        task.set_files(items.len());
        self.ctx
            .downloader
            .download_all(items, ReplacePolicy::Skip, task)
            .await?;

        task.enter_stage(GameStage::DownloadAssets)?;
        self.download_assets(task, &json).await
    }

    fn wrap_error(&self, error: LauncherError) -> LauncherError {
        LauncherError::GameInstall {
            version: self.version().to_string(),
            source: Box::new(error),
        }
    }
}

async fn write_file(path: &std::path::Path, contents: &str) -> LauncherResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| LauncherError::io(parent, e))?;
    }
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| LauncherError::io(path, e))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use super::*;
    use crate::core::cache::CacheStore;
    use crate::core::downloader::{sha1_bytes, Downloader, MapTransport, PersistentDownloader};
    use crate::core::instance::InstanceManager;
    use crate::core::loaders::archive::ZipOpener;
    use crate::core::state::{LauncherPaths, NetworkSettings};
    use crate::core::task::{InstallTask, NoopObserver, TaskState};

    const CLIENT_URL: &str = "https://piston-data.mojang.com/v1/objects/abc/client.jar";
    const GSON_URL: &str = "https://libraries.minecraft.net/com/google/code/gson/gson/2.10/gson-2.10.jar";

    async fn context(dir: &std::path::Path, transport: Arc<MapTransport>) -> InstallContext {
        let paths = LauncherPaths::new(dir.join("data"));
        InstallContext {
            http_client: reqwest::Client::new(),
            downloader: Arc::new(Downloader::with_transport(transport)),
            objects: Arc::new(PersistentDownloader::new(&NetworkSettings::default())),
            cache: Arc::new(CacheStore::open(paths.cache_dir()).await),
            instances: InstanceManager::new(paths.instances_dir()),
            java_bin: PathBuf::from("java"),
            archives: Arc::new(ZipOpener),
            paths,
        }
    }

    #[tokio::test]
    async fn installs_from_a_manifest_already_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(
            MapTransport::default()
                .with(CLIENT_URL, b"client".to_vec())
                .with(GSON_URL, b"gson".to_vec()),
        );
        let ctx = context(dir.path(), transport.clone()).await;
        let instance = ctx
            .instances
            .create(Instance::new("Vanilla", "1.20.1", &ctx.paths.instances_dir()))
            .await
            .unwrap();

        let raw = serde_json::json!({
            "id": "1.20.1",
            "downloads": { "client": { "sha1": sha1_bytes(b"client"), "url": CLIENT_URL } },
            "libraries": [
                { "name": "com.google.code.gson:gson:2.10",
                  "downloads": { "artifact": { "path": "com/google/code/gson/gson/2.10/gson-2.10.jar", "url": GSON_URL } } },
                { "name": "org.lwjgl:lwjgl-macos-only:3.3.1",
                  "rules": [ { "action": "allow", "os": { "name": "nowhere" } } ] }
            ]
        })
        .to_string();
        let base = ctx.paths.version_manifest("1.20.1");
        std::fs::create_dir_all(base.parent().unwrap()).unwrap();
        std::fs::write(&base, &raw).unwrap();

        let task = InstallTask::new(GameInstaller::new(ctx.clone(), instance.clone()), Arc::new(NoopObserver));
        let state = task.start().await;
        assert!(matches!(state, TaskState::Completed), "{:?}", state);
        assert_eq!(task.progress().overall, 1.0);

        assert_eq!(std::fs::read(ctx.paths.version_jar("1.20.1")).unwrap(), b"client");
        assert_eq!(
            std::fs::read(ctx.paths.libraries_dir().join("com/google/code/gson/gson/2.10/gson-2.10.jar")).unwrap(),
            b"gson"
        );
        assert_eq!(std::fs::read_to_string(instance.manifest_path()).unwrap(), raw);
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn missing_client_download_fails_as_game_install() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), Arc::new(MapTransport::default())).await;
        let instance = ctx
            .instances
            .create(Instance::new("Broken", "1.20.1", &ctx.paths.instances_dir()))
            .await
            .unwrap();
        let base = ctx.paths.version_manifest("1.20.1");
        std::fs::create_dir_all(base.parent().unwrap()).unwrap();
        std::fs::write(&base, r#"{"id":"1.20.1"}"#).unwrap();

        let state = InstallTask::new(GameInstaller::new(ctx, instance), Arc::new(NoopObserver))
            .start()
            .await;
        let TaskState::Failed(err) = state else {
            panic!("expected failure, got {:?}", state);
        };
        assert!(matches!(err.as_ref(), LauncherError::GameInstall { version, .. } if version == "1.20.1"));
    }
}
