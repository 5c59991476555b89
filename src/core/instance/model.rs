use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Loader brands the pipeline can install.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LoaderType {
    Vanilla,
    Forge,
    NeoForge,
}

impl std::fmt::Display for LoaderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoaderType::Vanilla => write!(f, "vanilla"),
            LoaderType::Forge => write!(f, "forge"),
            LoaderType::NeoForge => write!(f, "neoforge"),
        }
    }
}

/// Lifecycle state of an instance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InstanceState {
    /// Metadata exists but nothing has been installed.
    Created,
    /// An install group is running against it.
    Installing,
    Ready,
    /// Last install failed or was cancelled; files may be partially present.
    Error,
}

/// Instance metadata persisted as `instance.json`.
///
/// Each instance folder under `instances/<uuid>/` holds:
/// - `minecraft/`    — game working directory, also where processors run
/// - `mods/`         — mod JARs
/// - `config/`       — mod configuration files
/// - `version.json`  — the version manifest this instance launches with
/// - `instance.json` — this struct
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
    pub minecraft_version: String,
    pub loader: LoaderType,
    pub loader_version: Option<String>,
    pub state: InstanceState,
    pub created_at: DateTime<Utc>,
}

impl Instance {
    pub fn new(
        name: impl Into<String>,
        minecraft_version: impl Into<String>,
        base_dir: &Path,
    ) -> Self {
        let id = Uuid::new_v4().to_string();
        Self {
            path: base_dir.join(&id),
            id,
            name: name.into(),
            minecraft_version: minecraft_version.into(),
            loader: LoaderType::Vanilla,
            loader_version: None,
            state: InstanceState::Created,
            created_at: Utc::now(),
        }
    }

    pub fn game_dir(&self) -> PathBuf {
        self.path.join("minecraft")
    }

    pub fn mods_dir(&self) -> PathBuf {
        self.path.join("mods")
    }

    pub fn config_dir(&self) -> PathBuf {
        self.path.join("config")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.path.join("version.json")
    }

    pub fn config_path(&self) -> PathBuf {
        self.path.join("instance.json")
    }
}
