// ─── Version File ───
// Parses a Mojang version JSON and evaluates OS rules for libraries.
// Only the fields the install pipeline needs are modelled.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::core::downloader::DownloadItem;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::maven::{Library, MavenArtifact, MOJANG_LIBRARIES};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionJson {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub inherits_from: Option<String>,
    #[serde(default)]
    pub libraries: Vec<LibraryEntry>,
    #[serde(default)]
    pub downloads: Option<VersionDownloads>,
    #[serde(default)]
    pub asset_index: Option<AssetIndexInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionDownloads {
    #[serde(default)]
    pub client: Option<DownloadArtifact>,
    #[serde(default)]
    pub client_mappings: Option<DownloadArtifact>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadArtifact {
    pub sha1: String,
    #[serde(default)]
    pub size: Option<u64>,
    pub url: String,
}

impl DownloadArtifact {
    pub fn download_item(&self, dest: &Path) -> DownloadItem {
        let mut item = DownloadItem::new(self.url.clone(), dest).with_sha1(self.sha1.clone());
        if let Some(size) = self.size {
            item = item.with_size(size);
        }
        item
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetIndexInfo {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub total_size: Option<u64>,
}

// ─── Library Entry with Rules ───

/// Library as written in version JSONs and install profiles.
#[derive(Debug, Clone, Deserialize)]
pub struct LibraryEntry {
    pub name: String,
    #[serde(default)]
    pub downloads: Option<LibraryDownloads>,
    /// Repository base for entries without `downloads` (older loader JSONs).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub rules: Option<Vec<LibraryRule>>,
    #[serde(default)]
    pub natives: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryDownloads {
    #[serde(default)]
    pub artifact: Option<LibDownloadArtifact>,
    #[serde(default)]
    pub classifiers: Option<HashMap<String, LibDownloadArtifact>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibDownloadArtifact {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    /// Empty for libraries that ship inside an installer.
    #[serde(default)]
    pub url: String,
}

// ─── OS Rule Evaluation ───

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryRule {
    pub action: RuleAction,
    #[serde(default)]
    pub os: Option<OsRule>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OsRule {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arch: Option<String>,
}

impl OsRule {
    fn matches_current(&self) -> bool {
        let name_ok = self.name.as_deref().map_or(true, |n| n == current_os_name());
        let arch_ok = self.arch.as_deref().map_or(true, |a| a == current_arch_name());
        name_ok && arch_ok
    }
}

impl LibraryEntry {
    /// Evaluate whether this library should be included for the current OS.
    ///
    /// No rules means allowed. Otherwise start from "disallowed" and let
    /// every matching rule, top to bottom, set the verdict.
    pub fn is_allowed_for_current_os(&self) -> bool {
        let Some(rules) = &self.rules else {
            return true;
        };

        let mut allowed = false;
        for rule in rules {
            let applies = rule.os.as_ref().map_or(true, OsRule::matches_current);
            if applies {
                allowed = rule.action == RuleAction::Allow;
            }
        }
        allowed
    }

    pub fn native_classifier_for_current_os(&self) -> Option<String> {
        let natives = self.natives.as_ref()?;
        let classifier = natives.get(current_os_name())?;
        let bits = if cfg!(target_pointer_width = "64") { "64" } else { "32" };
        Some(classifier.replace("${arch}", bits))
    }

    /// Descriptor of the main artifact. Entries without `downloads.artifact`
    /// derive their path from the coordinate and their URL from `url` (or
    /// Mojang's repository).
    pub fn to_library(&self) -> LauncherResult<Library> {
        let name = MavenArtifact::parse(&self.name)?;
        match self.downloads.as_ref().and_then(|d| d.artifact.as_ref()) {
            Some(artifact) => Ok(library_from_download(name, artifact)),
            None => {
                let repo = self.url.as_deref().unwrap_or(MOJANG_LIBRARIES);
                Ok(Library::from_artifact(name, Some(repo)))
            }
        }
    }

    /// Native jar for this platform, if the entry declares one.
    pub fn native_library(&self) -> Option<Library> {
        let classifier = self.native_classifier_for_current_os()?;
        let artifact = self
            .downloads
            .as_ref()?
            .classifiers
            .as_ref()?
            .get(&classifier)?;
        let mut name = MavenArtifact::parse(&self.name).ok()?;
        name.classifier = Some(classifier);
        Some(library_from_download(name, artifact))
    }
}

fn library_from_download(name: MavenArtifact, artifact: &LibDownloadArtifact) -> Library {
    let path = artifact
        .path
        .clone()
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| name.to_path());
    let url = Some(artifact.url.trim().to_string()).filter(|u| !u.is_empty());
    Library {
        name,
        path,
        url,
        sha1: artifact.sha1.clone(),
    }
}

/// Get the Mojang OS name for the current platform.
fn current_os_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "osx"
    } else {
        "linux"
    }
}

fn current_arch_name() -> &'static str {
    if cfg!(target_arch = "x86") {
        "x86"
    } else if cfg!(target_arch = "aarch64") {
        "arm64"
    } else {
        "x86_64"
    }
}

impl VersionJson {
    pub fn parse(raw: &str) -> LauncherResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub async fn load(path: &Path) -> LauncherResult<(Self, String)> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| LauncherError::io(path, e))?;
        Ok((Self::parse(&raw)?, raw))
    }

    pub fn client(&self) -> Option<&DownloadArtifact> {
        self.downloads.as_ref()?.client.as_ref()
    }

    pub fn client_mappings(&self) -> Option<&DownloadArtifact> {
        self.downloads.as_ref()?.client_mappings.as_ref()
    }

    /// Libraries (and natives) that apply to this platform. Entries with a
    /// malformed coordinate are skipped with a warning.
    pub fn libraries_for_current_os(&self) -> Vec<Library> {
        let mut libraries = Vec::with_capacity(self.libraries.len());
        for entry in &self.libraries {
            if !entry.is_allowed_for_current_os() {
                debug!("Skipping library (OS rule): {}", entry.name);
                continue;
            }
            match entry.to_library() {
                Ok(library) => libraries.push(library),
                Err(e) => {
                    warn!("Skipping library {}: {}", entry.name, e);
                    continue;
                }
            }
            if let Some(native) = entry.native_library() {
                libraries.push(native);
            }
        }
        libraries
    }
}
