use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

const APP_DIR_NAME: &str = "InterfaceOficial";
const BOOTSTRAP_FILE: &str = "launcher_bootstrap.json";
const SETTINGS_FILE: &str = "launcher_settings.json";

/// Knobs for both download engines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Concurrent transfers in the pooled downloader.
    pub download_concurrency: usize,
    /// Long-lived TLS connections used for asset objects.
    pub asset_connections: usize,
    pub connect_timeout_secs: u64,
    pub io_timeout_secs: u64,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            download_concurrency: 8,
            asset_connections: 6,
            connect_timeout_secs: 15,
            io_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherSettings {
    /// Java used to run installer processors. `java` on `PATH` when unset.
    pub java_path: Option<PathBuf>,
    pub network: NetworkSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BootstrapConfig {
    data_dir: PathBuf,
}

impl LauncherSettings {
    /// Read `launcher_settings.json` from `data_dir`; defaults on any problem.
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join(SETTINGS_FILE);
        let Ok(raw) = std::fs::read_to_string(&path) else {
            return Self::default();
        };
        match serde_json::from_str(&raw) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring unreadable settings at {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    pub fn save(&self, data_dir: &Path) -> std::io::Result<()> {
        std::fs::create_dir_all(data_dir)?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(data_dir.join(SETTINGS_FILE), json)
    }

    pub fn java_binary(&self) -> PathBuf {
        self.java_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(if cfg!(windows) { "java.exe" } else { "java" }))
    }
}

/// Every on-disk location used by the pipeline, derived from one data dir.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherPaths {
    pub data_dir: PathBuf,
}

impl LauncherPaths {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.data_dir.join("versions")
    }

    pub fn libraries_dir(&self) -> PathBuf {
        self.data_dir.join("libraries")
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.data_dir.join("assets")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.data_dir.join("temp")
    }

    pub fn instances_dir(&self) -> PathBuf {
        self.data_dir.join("instances")
    }

    /// `versions/<id>/<id>.json`
    pub fn version_manifest(&self, id: &str) -> PathBuf {
        self.versions_dir().join(id).join(format!("{}.json", id))
    }

    /// `versions/<id>/<id>.jar`
    pub fn version_jar(&self, id: &str) -> PathBuf {
        self.versions_dir().join(id).join(format!("{}.jar", id))
    }
}

fn default_base_dir() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Resolve the launcher data dir, honouring a bootstrap redirect if present.
pub fn default_data_dir() -> PathBuf {
    data_dir_under(&default_base_dir())
}

/// `<base>/InterfaceOficial`, unless `<base>/launcher_bootstrap.json` points
/// somewhere else.
pub fn data_dir_under(base: &Path) -> PathBuf {
    let bootstrap_path = base.join(BOOTSTRAP_FILE);

    if let Ok(raw) = std::fs::read_to_string(&bootstrap_path) {
        if let Ok(cfg) = serde_json::from_str::<BootstrapConfig>(&raw) {
            return cfg.data_dir;
        }
        warn!("Ignoring malformed bootstrap file {:?}", bootstrap_path);
    }

    base.join(APP_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_settings_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = LauncherSettings::load(dir.path());
        assert_eq!(settings, LauncherSettings::default());
        assert_eq!(settings.network.download_concurrency, 8);
    }

    #[test]
    fn partial_settings_keep_remaining_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{"network":{"asset_connections":2}}"#,
        )
        .unwrap();
        let settings = LauncherSettings::load(dir.path());
        assert_eq!(settings.network.asset_connections, 2);
        assert_eq!(settings.network.io_timeout_secs, 60);
        assert!(settings.java_path.is_none());
    }

    #[test]
    fn settings_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let settings = LauncherSettings {
            java_path: Some(PathBuf::from("/opt/java/bin/java")),
            network: NetworkSettings::default(),
        };
        settings.save(dir.path()).unwrap();
        assert_eq!(LauncherSettings::load(dir.path()), settings);
        assert_eq!(settings.java_binary(), PathBuf::from("/opt/java/bin/java"));
    }

    #[test]
    fn version_paths_follow_minecraft_layout() {
        let paths = LauncherPaths::new("/data");
        assert_eq!(
            paths.version_manifest("1.20.1"),
            PathBuf::from("/data/versions/1.20.1/1.20.1.json")
        );
        assert_eq!(
            paths.version_jar("1.20.1"),
            PathBuf::from("/data/versions/1.20.1/1.20.1.jar")
        );
    }

    #[test]
    fn bootstrap_file_redirects_the_data_dir() {
        let base = tempfile::tempdir().unwrap();
        assert_eq!(data_dir_under(base.path()), base.path().join(APP_DIR_NAME));

        let elsewhere = base.path().join("portable");
        std::fs::write(
            base.path().join(BOOTSTRAP_FILE),
            serde_json::json!({ "data_dir": elsewhere }).to_string(),
        )
        .unwrap();
        assert_eq!(data_dir_under(base.path()), elsewhere);
    }

    #[test]
    fn malformed_bootstrap_is_ignored() {
        let base = tempfile::tempdir().unwrap();
        std::fs::write(base.path().join(BOOTSTRAP_FILE), "not json").unwrap();
        assert_eq!(data_dir_under(base.path()), base.path().join(APP_DIR_NAME));
    }
}
