// ─── Mod-Loader Installer ───
// One routine for every installer-based loader. The flavor supplies the
// URLs and group id; the rest is shared:
//   installer jar → install profile → manifest splice → data values →
//   libraries → processors → instance record.
// Nothing is rolled back on failure. The scratch directory is always removed.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::archive::ArchiveReader;
use super::context::InstallContext;
use super::flavor::LoaderFlavor;
use super::processor::{run_processor, ProcessorEnv};
use super::profile::{InstallProfile, InstallerManifest, PROFILE_ENTRY};
use super::values::{resolve_data_values, substitute_arg};
use crate::core::downloader::{DownloadItem, ReplacePolicy};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::Instance;
use crate::core::maven::Library;
use crate::core::task::{TaskContext, TaskRoutine, TaskStage};
use crate::core::version::{LibraryEntry, VersionJson};

const INSTALLER_FILE: &str = "installer.jar";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LoaderStage {
    AcquireInstaller,
    ExtractManifest,
    ResolveValues,
    DownloadLibraries,
    RunProcessors,
    Finish,
}

impl TaskStage for LoaderStage {
    const ALL: &'static [Self] = &[
        LoaderStage::AcquireInstaller,
        LoaderStage::ExtractManifest,
        LoaderStage::ResolveValues,
        LoaderStage::DownloadLibraries,
        LoaderStage::RunProcessors,
        LoaderStage::Finish,
    ];

    fn label(self) -> &'static str {
        match self {
            LoaderStage::AcquireInstaller => "acquire_installer",
            LoaderStage::ExtractManifest => "extract_manifest",
            LoaderStage::ResolveValues => "resolve_values",
            LoaderStage::DownloadLibraries => "download_libraries",
            LoaderStage::RunProcessors => "run_processors",
            LoaderStage::Finish => "finish",
        }
    }

    fn weight(self) -> f64 {
        match self {
            LoaderStage::AcquireInstaller => 0.2,
            LoaderStage::ExtractManifest => 0.1,
            LoaderStage::ResolveValues => 0.1,
            LoaderStage::DownloadLibraries => 0.3,
            LoaderStage::RunProcessors => 0.3,
            LoaderStage::Finish => 0.0,
        }
    }
}

/// What the extract step hands to the later steps.
struct Extracted {
    archive: Box<dyn ArchiveReader>,
    profile: Option<InstallProfile>,
    /// The manifest now written to the instance.
    loader_json: VersionJson,
    /// The unmodified game manifest, when one is on disk.
    base_json: Option<VersionJson>,
}

pub struct ModLoaderInstaller {
    ctx: InstallContext,
    flavor: LoaderFlavor,
    instance: Instance,
    loader_version: String,
}

impl ModLoaderInstaller {
    pub fn new(
        ctx: InstallContext,
        flavor: LoaderFlavor,
        instance: Instance,
        loader_version: impl Into<String>,
    ) -> Self {
        Self {
            ctx,
            flavor,
            instance,
            loader_version: loader_version.into(),
        }
    }

    pub fn flavor(&self) -> &LoaderFlavor {
        &self.flavor
    }

    fn minecraft_version(&self) -> &str {
        &self.instance.minecraft_version
    }

    /// `temp/<flavor>`, parent of every scratch dir of this loader kind.
    fn scratch_root(&self) -> PathBuf {
        self.ctx.paths.temp_dir().join(self.flavor.name())
    }

    async fn install(&self, task: &TaskContext<LoaderStage>, scratch: &Path) -> LauncherResult<()> {
        info!(
            "Installing {} {} for Minecraft {} into {}",
            self.flavor.name(),
            self.loader_version,
            self.minecraft_version(),
            self.instance.id
        );

        task.enter_stage(LoaderStage::AcquireInstaller)?;
        let installer = scratch.join(INSTALLER_FILE);
        self.acquire_installer(task, &installer).await?;

        task.enter_stage(LoaderStage::ExtractManifest)?;
        let mut extracted = self.extract_manifest(&installer).await?;

        let values = match &extracted.profile {
            Some(profile) => {
                task.enter_stage(LoaderStage::ResolveValues)?;
                let values = resolve_data_values(
                    &profile.data,
                    extracted.archive.as_mut(),
                    &self.ctx.paths.libraries_dir(),
                    scratch,
                    self.baseline_values(&installer),
                )?;
                debug!("Resolved {} data values", values.len());
                values
            }
            None => HashMap::new(),
        };

        task.enter_stage(LoaderStage::DownloadLibraries)?;
        self.download_libraries(task, &mut extracted).await?;

        if let Some(profile) = &extracted.profile {
            task.enter_stage(LoaderStage::RunProcessors)?;
            self.run_processors(task, profile, extracted.base_json.as_ref(), &values)
                .await?;
        }

        task.enter_stage(LoaderStage::Finish)?;
        self.ctx
            .instances
            .record_loader(
                &self.instance.id,
                self.flavor.kind,
                Some(self.loader_version.clone()),
            )
            .await?;
        Ok(())
    }

    async fn acquire_installer(
        &self,
        task: &TaskContext<LoaderStage>,
        dest: &Path,
    ) -> LauncherResult<()> {
        let key = self
            .flavor
            .cache_key(self.minecraft_version(), &self.loader_version);
        if self.ctx.cache.copy(&key, dest).await {
            task.set_stage_progress(1.0);
            return Ok(());
        }

        let url = self
            .flavor
            .installer_url(self.minecraft_version(), &self.loader_version);
        info!("Downloading installer {}", url);
        self.ctx
            .downloader
            .download_file_with_progress(&url, dest, None, task)
            .await?;

        if let Err(e) = self.ctx.cache.add(&key, dest, "installer").await {
            warn!("Could not cache installer {}: {}", key, e);
        }
        Ok(())
    }

    async fn extract_manifest(&self, installer: &Path) -> LauncherResult<Extracted> {
        let mut archive = self.ctx.archives.open(installer)?;
        let manifest = InstallerManifest::parse(&archive.read_entry(PROFILE_ENTRY)?)?;

        let (profile, version_bytes) = match manifest {
            InstallerManifest::Legacy { version_info } => {
                debug!("Installer uses the legacy profile layout");
                (None, serde_json::to_vec_pretty(&version_info)?)
            }
            InstallerManifest::Modern(profile) => {
                let bytes = archive.read_entry(&profile.json)?;
                (Some(profile), bytes)
            }
        };
        let loader_json: VersionJson = serde_json::from_slice(&version_bytes)?;

        self.splice_manifest(&version_bytes).await?;

        let base_path = self.ctx.paths.version_manifest(self.minecraft_version());
        let base_json = if tokio::fs::try_exists(&base_path).await.unwrap_or(false) {
            Some(VersionJson::load(&base_path).await?.0)
        } else {
            warn!("No base manifest at {:?}", base_path);
            None
        };

        Ok(Extracted {
            archive,
            profile,
            loader_json,
            base_json,
        })
    }

    /// Preserve the pre-install manifest as the shared base version (unless
    /// one exists already), then give the instance the loader's manifest.
    async fn splice_manifest(&self, version_bytes: &[u8]) -> LauncherResult<()> {
        let base = self.ctx.paths.version_manifest(self.minecraft_version());
        let current = self.instance.manifest_path();

        if !tokio::fs::try_exists(&base).await.unwrap_or(false)
            && tokio::fs::try_exists(&current).await.unwrap_or(false)
        {
            create_parent(&base).await?;
            tokio::fs::copy(&current, &base)
                .await
                .map_err(|e| LauncherError::io(&base, e))?;
            info!("Preserved base manifest at {:?}", base);
        }

        create_parent(&current).await?;
        tokio::fs::write(&current, version_bytes)
            .await
            .map_err(|e| LauncherError::io(&current, e))
    }

    fn baseline_values(&self, installer: &Path) -> Vec<(String, String)> {
        let paths = &self.ctx.paths;
        let mc = self.minecraft_version();
        [
            ("SIDE", "client".to_string()),
            ("INSTALLER", display(installer)),
            ("MINECRAFT_JAR", display(&paths.version_jar(mc))),
            ("MINECRAFT_VERSION", mc.to_string()),
            ("ROOT", display(&paths.data_dir)),
            ("LIBRARY_DIR", display(&paths.libraries_dir())),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    /// Profile libraries plus the loader manifest's own, each path once.
    fn collect_libraries(&self, extracted: &Extracted) -> Vec<Library> {
        let profile_libraries = extracted
            .profile
            .iter()
            .flat_map(|p| p.libraries.iter())
            .filter(|entry| entry.is_allowed_for_current_os())
            .filter_map(|entry: &LibraryEntry| match entry.to_library() {
                Ok(library) => Some(library),
                Err(e) => {
                    warn!("Skipping profile library {}: {}", entry.name, e);
                    None
                }
            });

        let mut seen = HashSet::new();
        profile_libraries
            .chain(extracted.loader_json.libraries_for_current_os())
            .filter(|library| seen.insert(library.path.clone()))
            .collect()
    }

    async fn download_libraries(
        &self,
        task: &TaskContext<LoaderStage>,
        extracted: &mut Extracted,
    ) -> LauncherResult<()> {
        let libraries_dir = self.ctx.paths.libraries_dir();
        let libraries = self.collect_libraries(extracted);

        let mut items: Vec<DownloadItem> = Vec::with_capacity(libraries.len());
        for library in &libraries {
            if !library.is_embedded() {
                items.extend(library.download_item(&libraries_dir, Some(self.flavor.maven_base)));
                continue;
            }
            let entry = format!("maven/{}", library.path);
            if !extracted.archive.has_entry(&entry) {
                // Produced by a processor later on.
                debug!("{} is not shipped in the installer", library.name);
                continue;
            }
            let dest = library.destination(&libraries_dir);
            let bytes = extracted.archive.read_entry(&entry)?;
            create_parent(&dest).await?;
            tokio::fs::write(&dest, bytes)
                .await
                .map_err(|e| LauncherError::io(&dest, e))?;
            debug!("Extracted {} from installer", library.name);
        }

        info!(
            "{} libraries, {} to download",
            libraries.len(),
            items.len()
        );
        task.set_files(items.len());
        self.ctx
            .downloader
            .download_all(items, ReplacePolicy::Skip, task)
            .await?;
        task.set_stage_progress(1.0);
        Ok(())
    }

    async fn run_processors(
        &self,
        task: &TaskContext<LoaderStage>,
        profile: &InstallProfile,
        base_json: Option<&VersionJson>,
        values: &HashMap<String, String>,
    ) -> LauncherResult<()> {
        let libraries_dir = self.ctx.paths.libraries_dir();
        let working_dir = self.instance.game_dir();
        tokio::fs::create_dir_all(&working_dir)
            .await
            .map_err(|e| LauncherError::io(&working_dir, e))?;
        let env = ProcessorEnv {
            java: &self.ctx.java_bin,
            libraries_dir: &libraries_dir,
            working_dir: &working_dir,
            archives: self.ctx.archives.as_ref(),
        };

        let processors: Vec<_> = profile.client_processors().collect();
        let total = processors.len();
        for (done, (index, processor)) in processors.into_iter().enumerate() {
            task.check_cancelled()?;

            let mappings = base_json.and_then(|json| json.client_mappings());
            match (processor.is_mappings_download(), mappings) {
                (true, Some(mappings)) => {
                    let output = processor
                        .output_arg()
                        .ok_or_else(|| LauncherError::MissingProfileKey("--output".into()))?;
                    let dest = PathBuf::from(substitute_arg(output, values, &libraries_dir)?);
                    info!("Processor #{} satisfied by direct mappings download", index);
                    self.ctx
                        .downloader
                        .download_all(vec![mappings.download_item(&dest)], ReplacePolicy::Skip, &())
                        .await?;
                }
                _ => run_processor(&env, index, processor, values).await?,
            }

            task.set_stage_progress((done + 1) as f64 / total as f64);
        }
        Ok(())
    }
}

#[async_trait]
impl TaskRoutine for ModLoaderInstaller {
    type Stage = LoaderStage;

    fn name(&self) -> String {
        format!("{}-{}", self.flavor.name(), self.loader_version)
    }

    async fn run(&self, task: &TaskContext<LoaderStage>) -> LauncherResult<()> {
        let root = self.scratch_root();
        let scratch = root.join(Uuid::new_v4().to_string());
        let result = self.install(task, &scratch).await;

        match tokio::fs::remove_dir_all(&root).await {
            Ok(()) => debug!("Removed scratch state {:?}", root),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove scratch state {:?}: {}", root, e),
        }
        result
    }

    fn wrap_error(&self, error: LauncherError) -> LauncherError {
        LauncherError::LoaderInstall {
            loader: TaskRoutine::name(self),
            source: Box::new(error),
        }
    }
}

fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

async fn create_parent(path: &Path) -> LauncherResult<()> {
    match path.parent() {
        Some(parent) => tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| LauncherError::io(parent, e)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::core::cache::CacheStore;
    use crate::core::downloader::{sha1_bytes, Downloader, MapTransport, PersistentDownloader};
    use crate::core::instance::{InstanceManager, LoaderType};
    use crate::core::loaders::archive::testing::write_jar;
    use crate::core::loaders::archive::ZipOpener;
    use crate::core::loaders::flavor::FORGE;
    use crate::core::state::{LauncherPaths, NetworkSettings};
    use crate::core::task::{InstallTask, NoopObserver, TaskState};

    const MC: &str = "1.20.1";
    const LOADER: &str = "47.2.0";

    struct Fixture {
        _dir: tempfile::TempDir,
        paths: LauncherPaths,
        ctx: InstallContext,
        instance: Instance,
        transport: Arc<MapTransport>,
    }

    impl Fixture {
        async fn new(transport: MapTransport, java_bin: PathBuf) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let paths = LauncherPaths::new(dir.path().join("data"));
            let transport = Arc::new(transport);
            let instances = InstanceManager::new(paths.instances_dir());
            let instance = instances
                .create(Instance::new("Modded", MC, &paths.instances_dir()))
                .await
                .unwrap();
            std::fs::write(instance.manifest_path(), r#"{"id":"1.20.1"}"#).unwrap();

            let ctx = InstallContext {
                paths: paths.clone(),
                http_client: reqwest::Client::new(),
                downloader: Arc::new(Downloader::with_transport(transport.clone())),
                objects: Arc::new(PersistentDownloader::new(&NetworkSettings::default())),
                cache: Arc::new(CacheStore::open(paths.cache_dir()).await),
                instances,
                java_bin,
                archives: Arc::new(ZipOpener),
            };
            Self {
                _dir: dir,
                paths,
                ctx,
                instance,
                transport,
            }
        }

        /// Put an installer with `entries` in the cache under the Forge key.
        async fn cache_installer(&self, entries: &[(&str, &[u8])]) {
            let jar = self.paths.data_dir.join("staged-installer.jar");
            write_jar(&jar, entries);
            self.ctx
                .cache
                .add(&FORGE.cache_key(MC, LOADER), &jar, "installer")
                .await
                .unwrap();
        }

        async fn run(&self) -> TaskState {
            let installer =
                ModLoaderInstaller::new(self.ctx.clone(), FORGE, self.instance.clone(), LOADER);
            InstallTask::new(installer, Arc::new(NoopObserver)).start().await
        }

        fn lib(&self, path: &str) -> PathBuf {
            self.paths.libraries_dir().join(path)
        }
    }

    #[tokio::test]
    async fn installer_without_profile_fails_before_splicing() {
        let fx = Fixture::new(MapTransport::default(), PathBuf::from("java")).await;
        fx.cache_installer(&[("version.json", b"{}")]).await;

        let state = fx.run().await;
        let TaskState::Failed(err) = state else {
            panic!("expected failure, got {:?}", state);
        };
        match err.as_ref() {
            LauncherError::LoaderInstall { loader, source } => {
                assert_eq!(loader, "forge-47.2.0");
                assert!(matches!(**source, LauncherError::MissingArchiveEntry { .. }));
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(!fx.paths.version_manifest(MC).exists());
        assert_eq!(
            std::fs::read_to_string(fx.instance.manifest_path()).unwrap(),
            r#"{"id":"1.20.1"}"#
        );
        assert!(!fx.paths.temp_dir().join("forge").exists());
        assert!(fx.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn legacy_installer_copies_version_info_and_fetches_libraries() {
        let asm_url = "https://libraries.minecraft.net/org/ow2/asm/asm/5.2/asm-5.2.jar";
        let fx = Fixture::new(
            MapTransport::default().with(asm_url, b"asm".to_vec()),
            PathBuf::from("java"),
        )
        .await;

        let profile = serde_json::json!({
            "install": { "target": "1.20.1-forge-47.2.0" },
            "versionInfo": {
                "id": "1.20.1-forge-47.2.0",
                "libraries": [
                    { "name": "org.ow2.asm:asm:5.2",
                      "downloads": { "artifact": { "path": "org/ow2/asm/asm/5.2/asm-5.2.jar", "url": asm_url } } },
                    { "name": "net.minecraftforge:forge:1.20.1-47.2.0",
                      "downloads": { "artifact": { "path": "net/minecraftforge/forge/1.20.1-47.2.0/forge-1.20.1-47.2.0.jar", "url": "" } } }
                ]
            }
        })
        .to_string();
        fx.cache_installer(&[
            ("install_profile.json", profile.as_bytes()),
            (
                "maven/net/minecraftforge/forge/1.20.1-47.2.0/forge-1.20.1-47.2.0.jar",
                b"universal",
            ),
        ])
        .await;

        let state = fx.run().await;
        assert!(matches!(state, TaskState::Completed), "{:?}", state);

        assert_eq!(
            std::fs::read_to_string(fx.paths.version_manifest(MC)).unwrap(),
            r#"{"id":"1.20.1"}"#
        );
        let spliced: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(fx.instance.manifest_path()).unwrap())
                .unwrap();
        assert_eq!(spliced["id"], "1.20.1-forge-47.2.0");

        assert_eq!(std::fs::read(fx.lib("org/ow2/asm/asm/5.2/asm-5.2.jar")).unwrap(), b"asm");
        assert_eq!(
            std::fs::read(fx.lib("net/minecraftforge/forge/1.20.1-47.2.0/forge-1.20.1-47.2.0.jar"))
                .unwrap(),
            b"universal"
        );

        let recorded = fx.ctx.instances.load(&fx.instance.id).await.unwrap();
        assert_eq!(recorded.loader, LoaderType::Forge);
        assert_eq!(recorded.loader_version.as_deref(), Some(LOADER));
        assert!(!fx.paths.temp_dir().join("forge").exists());
    }

    #[tokio::test]
    async fn existing_base_manifest_is_not_overwritten() {
        let fx = Fixture::new(MapTransport::default(), PathBuf::from("java")).await;
        let base = fx.paths.version_manifest(MC);
        std::fs::create_dir_all(base.parent().unwrap()).unwrap();
        std::fs::write(&base, r#"{"id":"1.20.1","pristine":true}"#).unwrap();

        let profile = r#"{"install":{},"versionInfo":{"id":"1.20.1-forge-47.2.0"}}"#;
        fx.cache_installer(&[("install_profile.json", profile.as_bytes())]).await;

        assert!(matches!(fx.run().await, TaskState::Completed));
        assert!(std::fs::read_to_string(&base).unwrap().contains("pristine"));
    }

    #[cfg(unix)]
    mod processors {
        use super::*;
        use crate::core::loaders::processor::testing::fake_java;

        const TOOLS: &str = "net/minecraftforge/installertools/1.3.0/installertools-1.3.0.jar";

        fn tools_jar(dir: &Path) -> Vec<u8> {
            let jar = dir.join("tools-src.jar");
            write_jar(&jar, &[("META-INF/MANIFEST.MF", b"Main-Class: tools.Main\n")]);
            std::fs::read(jar).unwrap()
        }

        fn profile(processors: serde_json::Value) -> String {
            serde_json::json!({
                "minecraft": MC,
                "json": "/version.json",
                "data": {
                    "BINPATCH": { "client": "/data/client.lzma", "server": "/data/server.lzma" },
                    "MOJMAPS": { "client": "[net.minecraft:client:1.20.1:mappings@txt]" }
                },
                "processors": processors,
                "libraries": [
                    { "name": "net.minecraftforge:installertools:1.3.0",
                      "downloads": { "artifact": { "path": TOOLS, "url": "" } } },
                    { "name": "net.sf.jopt-simple:jopt-simple:5.0.4",
                      "downloads": { "artifact": {
                          "path": "net/sf/jopt-simple/jopt-simple/5.0.4/jopt-simple-5.0.4.jar",
                          "url": "https://maven.minecraftforge.net/net/sf/jopt-simple/jopt-simple/5.0.4/jopt-simple-5.0.4.jar" } } }
                ]
            })
            .to_string()
        }

        const VERSION_JSON: &[u8] = br#"{"id":"1.20.1-forge-47.2.0","libraries":[
            {"name":"net.minecraftforge:forge:1.20.1-47.2.0:client",
             "downloads":{"artifact":{"path":"net/minecraftforge/forge/1.20.1-47.2.0/forge-1.20.1-47.2.0-client.jar","url":""}}}]}"#;

        const JOPT_URL: &str =
            "https://maven.minecraftforge.net/net/sf/jopt-simple/jopt-simple/5.0.4/jopt-simple-5.0.4.jar";
        const MAPPINGS_URL: &str = "https://piston-data.mojang.com/v1/objects/client.txt";

        async fn fixture(processors: serde_json::Value) -> (Fixture, PathBuf) {
            let transport = MapTransport::default()
                .with(JOPT_URL, b"jopt".to_vec())
                .with(MAPPINGS_URL, b"mappings".to_vec());
            let mut fx = Fixture::new(transport, PathBuf::new()).await;
            let scripts = fx._dir.path().to_path_buf();
            let log = scripts.join("java.log");
            fx.ctx.java_bin = fake_java(&scripts, &log);

            let base = fx.paths.version_manifest(MC);
            std::fs::create_dir_all(base.parent().unwrap()).unwrap();
            let base_json = serde_json::json!({
                "id": MC,
                "downloads": { "client_mappings": { "sha1": sha1_bytes(b"mappings"), "url": MAPPINGS_URL } }
            });
            std::fs::write(&base, base_json.to_string()).unwrap();

            let tools = tools_jar(&scripts);
            let profile = profile(processors);
            fx.cache_installer(&[
                ("install_profile.json", profile.as_bytes()),
                ("version.json", VERSION_JSON),
                ("data/client.lzma", b"patch"),
                (&format!("maven/{}", TOOLS), &tools),
            ])
            .await;
            (fx, log)
        }

        #[tokio::test]
        async fn modern_profile_runs_client_processors_in_order() {
            let (fx, log) = fixture(serde_json::json!([
                { "jar": "net.minecraftforge:installertools:1.3.0",
                  "args": ["--task", "DOWNLOAD_MOJMAPS", "--output", "{MOJMAPS}"] },
                { "sides": ["server"], "jar": "net.minecraftforge:installertools:1.3.0", "args": ["FAIL"] },
                { "sides": ["client"], "jar": "net.minecraftforge:installertools:1.3.0",
                  "classpath": ["net.sf.jopt-simple:jopt-simple:5.0.4"],
                  "args": ["--task", "PATCH", "--patch", "{BINPATCH}", "--side", "{SIDE}"] },
                { "jar": "net.minecraftforge:installertools:1.3.0", "args": ["--task", "LAST"] }
            ]))
            .await;

            let state = fx.run().await;
            assert!(matches!(state, TaskState::Completed), "{:?}", state);

            assert_eq!(
                std::fs::read(fx.lib("net/minecraft/client/1.20.1/client-1.20.1-mappings.txt")).unwrap(),
                b"mappings"
            );
            assert_eq!(
                std::fs::read(fx.lib("net/sf/jopt-simple/jopt-simple/5.0.4/jopt-simple-5.0.4.jar")).unwrap(),
                b"jopt"
            );

            let logged = std::fs::read_to_string(&log).unwrap();
            let lines: Vec<&str> = logged.lines().collect();
            assert_eq!(lines.len(), 2, "{}", logged);
            assert!(lines[0].contains("tools.Main --task PATCH --patch "));
            assert!(lines[0].contains("data/client.lzma --side client"));
            assert!(lines[1].ends_with("--task LAST"));

            let recorded = fx.ctx.instances.load(&fx.instance.id).await.unwrap();
            assert_eq!(recorded.loader, LoaderType::Forge);
            assert!(!fx.paths.temp_dir().join("forge").exists());
        }

        #[tokio::test]
        async fn failing_processor_stops_the_chain() {
            let (fx, log) = fixture(serde_json::json!([
                { "jar": "net.minecraftforge:installertools:1.3.0", "args": ["--task", "FIRST"] },
                { "jar": "net.minecraftforge:installertools:1.3.0", "args": ["--task", "BREAK", "FAIL"] },
                { "jar": "net.minecraftforge:installertools:1.3.0", "args": ["--task", "THIRD"] }
            ]))
            .await;

            let state = fx.run().await;
            let TaskState::Failed(err) = state else {
                panic!("expected failure, got {:?}", state);
            };
            let LauncherError::LoaderInstall { source, .. } = err.as_ref() else {
                panic!("unexpected {:?}", err);
            };
            assert!(matches!(
                source.as_ref(),
                LauncherError::ProcessorFailed { index: 1, task: Some(t), code: Some(1), .. } if t == "BREAK"
            ));

            let logged = std::fs::read_to_string(&log).unwrap();
            assert!(logged.contains("--task FIRST"));
            assert!(logged.contains("--task BREAK"));
            assert!(!logged.contains("THIRD"));

            assert!(fx.lib("net/sf/jopt-simple/jopt-simple/5.0.4/jopt-simple-5.0.4.jar").exists());
            let recorded = fx.ctx.instances.load(&fx.instance.id).await.unwrap();
            assert_eq!(recorded.loader, LoaderType::Vanilla);
            assert!(!fx.paths.temp_dir().join("forge").exists());
        }
    }
}
