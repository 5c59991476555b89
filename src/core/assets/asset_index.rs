use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::core::downloader::{
    sha1_bytes, Connector, DownloadMonitor, ObjectRequest, PersistentDownloader, PersistentReport,
};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::version::AssetIndexInfo;

pub const RESOURCES_URL: &str = "https://resources.download.minecraft.net";

/// Top-level asset index JSON structure.
#[derive(Debug, Deserialize)]
pub struct AssetIndex {
    pub objects: BTreeMap<String, AssetObject>,
}

#[derive(Debug, Deserialize)]
pub struct AssetObject {
    pub hash: String,
    pub size: u64,
}

impl AssetIndex {
    /// One request per distinct object; names sharing a hash share a file.
    pub fn object_requests(&self, objects_dir: &Path) -> Vec<ObjectRequest> {
        let mut seen = HashSet::new();
        self.objects
            .iter()
            .filter_map(|(name, obj)| {
                let prefix = match obj.hash.get(..2) {
                    Some(prefix) if obj.hash.len() > 2 => prefix,
                    _ => {
                        warn!("Skipping asset {} with malformed hash '{}'", name, obj.hash);
                        return None;
                    }
                };
                if !seen.insert(obj.hash.as_str()) {
                    return None;
                }
                Some(ObjectRequest {
                    url: format!("{}/{}/{}", RESOURCES_URL, prefix, obj.hash),
                    dest: objects_dir.join(prefix).join(&obj.hash),
                    sha1: obj.hash.clone(),
                })
            })
            .collect()
    }
}

/// Asset index + object downloads (sounds, textures, language files).
pub struct AssetManager;

impl AssetManager {
    /// Fetch the index, store it under `indexes/<id>.json` and pull every
    /// object over persistent connections. Individual object failures are
    /// logged and left in the report.
    pub async fn download_assets<C: Connector>(
        client: &reqwest::Client,
        info: &AssetIndexInfo,
        assets_dir: &Path,
        objects: &PersistentDownloader<C>,
        monitor: &dyn DownloadMonitor,
    ) -> LauncherResult<PersistentReport> {
        let index_text = Self::fetch_index(client, info).await?;
        let index: AssetIndex = serde_json::from_str(&index_text)?;

        let indexes_dir = assets_dir.join("indexes");
        tokio::fs::create_dir_all(&indexes_dir)
            .await
            .map_err(|e| LauncherError::io(&indexes_dir, e))?;
        let index_path = indexes_dir.join(format!("{}.json", info.id));
        tokio::fs::write(&index_path, &index_text)
            .await
            .map_err(|e| LauncherError::io(&index_path, e))?;

        let requests = index.object_requests(&assets_dir.join("objects"));
        info!(
            "Asset index {}: {} entries, {} distinct objects",
            info.id,
            index.objects.len(),
            requests.len()
        );

        let report = objects.download(requests, monitor).await;
        if !report.failed.is_empty() {
            warn!("{} asset downloads failed", report.failed.len());
        }
        Ok(report)
    }

    async fn fetch_index(client: &reqwest::Client, info: &AssetIndexInfo) -> LauncherResult<String> {
        let response = client.get(&info.url).send().await?;
        if !response.status().is_success() {
            return Err(LauncherError::DownloadFailed {
                url: info.url.clone(),
                status: response.status().as_u16(),
            });
        }
        let text = response.text().await?;

        if let Some(expected) = &info.sha1 {
            let actual = sha1_bytes(text.as_bytes());
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(LauncherError::Sha1Mismatch {
                    path: format!("indexes/{}.json", info.id).into(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }
        Ok(text)
    }
}
