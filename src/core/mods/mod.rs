// ─── Mod Files ───
// Downloads a fixed list of mod jars into an instance's `mods/` folder.
// Modpack manifests resolve to this list before the task is built.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::downloader::{DownloadItem, Downloader, ReplacePolicy};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::Instance;
use crate::core::task::{TaskContext, TaskRoutine, TaskStage};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModFile {
    pub url: String,
    #[serde(default)]
    pub fallback_url: Option<String>,
    pub file_name: String,
    #[serde(default)]
    pub sha1: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ModStage {
    Prepare,
    Download,
}

impl TaskStage for ModStage {
    const ALL: &'static [Self] = &[ModStage::Prepare, ModStage::Download];

    fn label(self) -> &'static str {
        match self {
            ModStage::Prepare => "prepare",
            ModStage::Download => "download",
        }
    }

    fn weight(self) -> f64 {
        match self {
            ModStage::Prepare => 0.05,
            ModStage::Download => 0.95,
        }
    }
}

pub struct ModFilesInstaller {
    downloader: Arc<Downloader>,
    instance: Instance,
    /// Shown in the failure message.
    name: String,
    files: Vec<ModFile>,
}

impl ModFilesInstaller {
    pub fn new(
        downloader: Arc<Downloader>,
        instance: Instance,
        name: impl Into<String>,
        files: Vec<ModFile>,
    ) -> Self {
        Self {
            downloader,
            instance,
            name: name.into(),
            files,
        }
    }

    fn download_items(&self) -> LauncherResult<Vec<DownloadItem>> {
        let mods_dir = self.instance.mods_dir();
        self.files
            .iter()
            .map(|file| {
                // Names come from remote manifests.
                if file.file_name.contains(['/', '\\']) || file.file_name.starts_with('.') {
                    return Err(LauncherError::Other(format!(
                        "refusing mod file name '{}'",
                        file.file_name
                    )));
                }
                let mut item = DownloadItem::new(file.url.clone(), mods_dir.join(&file.file_name));
                if let Some(fallback) = &file.fallback_url {
                    item = item.with_fallback(fallback.clone());
                }
                if let Some(sha1) = &file.sha1 {
                    item = item.with_sha1(sha1.clone());
                }
                Ok(item)
            })
            .collect()
    }
}

#[async_trait]
impl TaskRoutine for ModFilesInstaller {
    type Stage = ModStage;

    fn name(&self) -> String {
        format!("mods-{}", self.name)
    }

    async fn run(&self, task: &TaskContext<ModStage>) -> LauncherResult<()> {
        task.enter_stage(ModStage::Prepare)?;
        let items = self.download_items()?;
        let mods_dir = self.instance.mods_dir();
        tokio::fs::create_dir_all(&mods_dir)
            .await
            .map_err(|e| LauncherError::io(&mods_dir, e))?;

        task.enter_stage(ModStage::Download)?;
        task.set_files(items.len());
        let summary = self
            .downloader
            .download_all(items, ReplacePolicy::Skip, task)
            .await?;
        info!("{}: {:?}", self.name, summary);
        Ok(())
    }

    fn wrap_error(&self, error: LauncherError) -> LauncherError {
        LauncherError::ModpackInstall {
            name: self.name.clone(),
            source: Box::new(error),
        }
    }
}
