use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::model::{Instance, InstanceState, LoaderType};
use crate::core::error::{LauncherError, LauncherResult};

/// Manages the lifecycle of instances on disk.
#[derive(Debug, Clone)]
pub struct InstanceManager {
    /// Root directory where all instances live.
    instances_dir: PathBuf,
}

impl InstanceManager {
    pub fn new(instances_dir: impl Into<PathBuf>) -> Self {
        Self {
            instances_dir: instances_dir.into(),
        }
    }

    pub fn instances_dir(&self) -> &Path {
        &self.instances_dir
    }

    /// Create the instance folder tree and persist `instance.json`.
    pub async fn create(&self, mut instance: Instance) -> LauncherResult<Instance> {
        instance.path = self.instances_dir.join(&instance.id);
        if tokio::fs::try_exists(&instance.path).await.unwrap_or(false) {
            return Err(LauncherError::InstanceAlreadyExists(instance.id.clone()));
        }

        let game_dir = instance.game_dir();
        let mods_dir = instance.mods_dir();
        let config_dir = instance.config_dir();
        tokio::try_join!(
            create_dir(&game_dir),
            create_dir(&mods_dir),
            create_dir(&config_dir),
        )?;
        self.save(&instance).await?;

        info!("Created instance '{}' ({})", instance.name, instance.id);
        Ok(instance)
    }

    /// Save instance metadata to disk.
    pub async fn save(&self, instance: &Instance) -> LauncherResult<()> {
        let json = serde_json::to_string_pretty(instance)?;
        let config_path = instance.config_path();
        if let Some(parent) = config_path.parent() {
            create_dir(parent).await?;
        }
        tokio::fs::write(&config_path, json)
            .await
            .map_err(|e| LauncherError::io(&config_path, e))
    }

    /// Load a single instance by ID.
    pub async fn load(&self, id: &str) -> LauncherResult<Instance> {
        let config_path = self.instances_dir.join(id).join("instance.json");
        let json = match tokio::fs::read_to_string(&config_path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LauncherError::InstanceNotFound(id.to_string()))
            }
            Err(e) => return Err(LauncherError::io(&config_path, e)),
        };
        Ok(serde_json::from_str(&json)?)
    }

    /// Move instance `id` to `state`. Re-reads the file so a loader recorded
    /// by a running task is not overwritten.
    pub async fn set_state(&self, id: &str, state: InstanceState) -> LauncherResult<Instance> {
        let mut instance = self.load(id).await?;
        instance.state = state;
        self.save(&instance).await?;
        debug!("Instance {} is now {:?}", id, state);
        Ok(instance)
    }

    /// Record the loader brand now installed in instance `id`. Re-reads the
    /// file so concurrent edits to other fields survive.
    pub async fn record_loader(
        &self,
        id: &str,
        loader: LoaderType,
        loader_version: Option<String>,
    ) -> LauncherResult<Instance> {
        let mut instance = self.load(id).await?;
        instance.loader = loader;
        instance.loader_version = loader_version;
        self.save(&instance).await?;
        info!(
            "Instance {} now runs {} {}",
            id,
            loader,
            instance.loader_version.as_deref().unwrap_or("")
        );
        Ok(instance)
    }
}

async fn create_dir(path: &Path) -> LauncherResult<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| LauncherError::io(path, e))
}
