// ─── Install Profile ───
// `install_profile.json` comes in two dialects. Old installers embed the
// finished version manifest under `versionInfo` next to an `install` block;
// newer ones describe data values, libraries and a processor chain.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::version::LibraryEntry;

pub const PROFILE_ENTRY: &str = "install_profile.json";

/// Marker task of the processor that fetches official client mappings.
pub const MAPPINGS_TASK: &str = "DOWNLOAD_MOJMAPS";

#[derive(Debug, Clone, Deserialize)]
pub struct DataEntry {
    pub client: String,
    #[serde(default)]
    pub server: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Processor {
    /// Maven coordinate of the processor jar.
    pub jar: String,
    #[serde(default)]
    pub classpath: Vec<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub sides: Option<Vec<String>>,
}

impl Processor {
    pub fn available_on_client(&self) -> bool {
        self.sides
            .as_ref()
            .map_or(true, |sides| sides.iter().any(|s| s == "client"))
    }

    fn arg_after(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    /// Value of `--task`, used to label the processor in logs and errors.
    pub fn task_label(&self) -> Option<&str> {
        self.arg_after("--task")
    }

    pub fn output_arg(&self) -> Option<&str> {
        self.arg_after("--output")
    }

    pub fn is_mappings_download(&self) -> bool {
        self.task_label() == Some(MAPPINGS_TASK)
    }
}

fn default_json_entry() -> String {
    "/version.json".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstallProfile {
    #[serde(default)]
    pub data: BTreeMap<String, DataEntry>,
    pub processors: Vec<Processor>,
    pub libraries: Vec<LibraryEntry>,
    /// Archive entry holding the version manifest.
    #[serde(default = "default_json_entry")]
    pub json: String,
    #[serde(default)]
    pub minecraft: Option<String>,
}

impl InstallProfile {
    /// Client-side processors with their index in declaration order.
    pub fn client_processors(&self) -> impl Iterator<Item = (usize, &Processor)> {
        self.processors
            .iter()
            .enumerate()
            .filter(|(_, p)| p.available_on_client())
    }
}

#[derive(Debug, Clone)]
pub enum InstallerManifest {
    /// Finished version manifest, copied out verbatim.
    Legacy { version_info: serde_json::Value },
    Modern(InstallProfile),
}

impl InstallerManifest {
    pub fn parse(bytes: &[u8]) -> LauncherResult<Self> {
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        let Some(root) = value.as_object() else {
            return Err(LauncherError::MissingProfileKey("install".into()));
        };

        if root.contains_key("install") {
            let version_info = root
                .get("versionInfo")
                .cloned()
                .ok_or_else(|| LauncherError::MissingProfileKey("versionInfo".into()))?;
            return Ok(Self::Legacy { version_info });
        }

        for key in ["processors", "libraries"] {
            if !root.contains_key(key) {
                return Err(LauncherError::MissingProfileKey(key.into()));
            }
        }
        Ok(Self::Modern(serde_json::from_value(value)?))
    }
}
