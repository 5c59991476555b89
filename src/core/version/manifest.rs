// ─── Version Manifest ───
// Handles fetching and parsing the Mojang version manifest v2.

use serde::Deserialize;
use tracing::info;

use super::version_file::VersionJson;
use crate::core::error::{LauncherError, LauncherResult};

pub const VERSION_MANIFEST_URL: &str =
    "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json";

/// Top-level Mojang version manifest.
#[derive(Debug, Deserialize)]
pub struct VersionManifest {
    #[serde(default)]
    pub latest: Option<LatestVersions>,
    pub versions: Vec<VersionEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LatestVersions {
    pub release: String,
    pub snapshot: String,
}

/// A single entry in the manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub version_type: String,
    #[serde(rename = "releaseTime")]
    pub release_time: String,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
}

impl VersionManifest {
    /// Fetch the version manifest from Mojang using a shared HTTP client.
    pub async fn fetch(client: &reqwest::Client) -> LauncherResult<Self> {
        info!("Fetching Minecraft version manifest...");

        let manifest: VersionManifest = client
            .get(VERSION_MANIFEST_URL)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        info!("Loaded {} versions from manifest", manifest.versions.len());
        Ok(manifest)
    }

    /// Find a specific version entry by ID (e.g. "1.20.4").
    pub fn find_version(&self, id: &str) -> Option<&VersionEntry> {
        self.versions.iter().find(|v| v.id == id)
    }

    pub fn releases(&self) -> impl Iterator<Item = &VersionEntry> {
        self.versions.iter().filter(|v| v.version_type == "release")
    }
}

impl VersionEntry {
    /// Download this version's JSON. Returns the parsed form and the raw text,
    /// which is what gets written to disk.
    pub async fn fetch_json(&self, client: &reqwest::Client) -> LauncherResult<(VersionJson, String)> {
        let raw = client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let parsed = VersionJson::parse(&raw)?;
        if let Some(id) = parsed.id.as_deref() {
            if id != self.id {
                return Err(LauncherError::Other(format!(
                    "version JSON at {} describes '{}', expected '{}'",
                    self.url, id, self.id
                )));
            }
        }
        Ok((parsed, raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_manifest_entry() {
        let json = r#"{
            "id": "1.20.4",
            "type": "release",
            "releaseTime": "2023-12-07T08:00:00+00:00",
            "url": "https://example.com/1.20.4.json",
            "sha1": "abc123"
        }"#;
        let entry: VersionEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.id, "1.20.4");
        assert_eq!(entry.version_type, "release");
        assert_eq!(entry.release_time, "2023-12-07T08:00:00+00:00");
    }

    #[test]
    fn finds_versions_and_filters_releases() {
        let manifest: VersionManifest = serde_json::from_value(serde_json::json!({
            "latest": { "release": "1.20.4", "snapshot": "24w03a" },
            "versions": [
                { "id": "24w03a", "type": "snapshot", "releaseTime": "t", "url": "u1" },
                { "id": "1.20.4", "type": "release", "releaseTime": "t", "url": "u2" }
            ]
        }))
        .unwrap();

        assert_eq!(manifest.find_version("1.20.4").unwrap().url, "u2");
        assert!(manifest.find_version("1.0").is_none());
        assert_eq!(manifest.releases().count(), 1);
        assert_eq!(manifest.latest.unwrap().snapshot, "24w03a");
    }
}
