// ─── Content Cache Store ───
// Blobs live under `SHA-1/<first two hex>/<hash>`; `index.json` maps logical
// names (installer keys, library names) onto those hashes. Several names can
// share one blob.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::core::downloader::sha1_file;
use crate::core::error::{LauncherError, LauncherResult};

const INDEX_FILE: &str = "index.json";
const OBJECTS_DIR: &str = "SHA-1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub name: String,
    pub hash: String,
    /// Free-form category, e.g. `installer` or `library`.
    pub kind: String,
    pub added_at: DateTime<Utc>,
}

pub struct CacheStore {
    root: PathBuf,
    entries: Mutex<Vec<CacheEntry>>,
}

impl CacheStore {
    /// Load the index under `root`. A missing index is an empty cache; so is
    /// a corrupt one, after a warning.
    pub async fn open(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let index_path = root.join(INDEX_FILE);
        let entries = match tokio::fs::read_to_string(&index_path).await {
            Ok(raw) => match serde_json::from_str::<Vec<CacheEntry>>(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    let err = LauncherError::CacheIndex {
                        path: index_path.clone(),
                        reason: e.to_string(),
                    };
                    warn!("{}; starting with an empty cache", err);
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };
        debug!("Cache at {:?} holds {} entries", root, entries.len());

        Self {
            root,
            entries: Mutex::new(entries),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn object_path(&self, hash: &str) -> PathBuf {
        let shard = hash.get(..2).unwrap_or(hash);
        self.root.join(OBJECTS_DIR).join(shard).join(hash)
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.entries.lock().await.iter().any(|e| e.name == name)
    }

    pub async fn entries(&self) -> Vec<CacheEntry> {
        self.entries.lock().await.clone()
    }

    /// Copy the blob behind `name` to `to`.
    ///
    /// Returns `false` on a miss. An entry whose blob has vanished is evicted
    /// and the index rewritten before returning `false`. Failures are logged
    /// and reported as a miss.
    pub async fn copy(&self, name: &str, to: &Path) -> bool {
        let mut entries = self.entries.lock().await;
        let Some(pos) = entries.iter().position(|e| e.name == name) else {
            debug!("Cache miss: {}", name);
            return false;
        };

        let object = self.object_path(&entries[pos].hash);
        if !tokio::fs::try_exists(&object).await.unwrap_or(false) {
            warn!("Cache blob for {} is gone, evicting entry", name);
            entries.remove(pos);
            if let Err(e) = self.persist(&entries).await {
                warn!("Could not rewrite cache index: {}", e);
            }
            return false;
        }

        if let Some(parent) = to.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                warn!("Cache copy of {} failed: {}", name, LauncherError::io(parent, e));
                return false;
            }
        }
        match tokio::fs::copy(&object, to).await {
            Ok(_) => {
                info!("Cache hit: {} -> {:?}", name, to);
                true
            }
            Err(e) => {
                warn!("Cache copy of {} failed: {}", name, LauncherError::io(to, e));
                false
            }
        }
    }

    /// Register `source` under `name`. Identical content is stored once; a
    /// name that is already indexed is left untouched.
    pub async fn add(&self, name: &str, source: &Path, kind: &str) -> LauncherResult<()> {
        let mut entries = self.entries.lock().await;
        if entries.iter().any(|e| e.name == name) {
            debug!("{} already cached", name);
            return Ok(());
        }

        let hash = sha1_file(source).await?;
        let object = self.object_path(&hash);
        if !tokio::fs::try_exists(&object).await.unwrap_or(false) {
            let parent = object.parent().unwrap_or(&self.root);
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
            let staging = object.with_extension("part");
            tokio::fs::copy(source, &staging)
                .await
                .map_err(|e| LauncherError::io(&staging, e))?;
            tokio::fs::rename(&staging, &object)
                .await
                .map_err(|e| LauncherError::io(&object, e))?;
        }

        entries.push(CacheEntry {
            name: name.to_string(),
            hash,
            kind: kind.to_string(),
            added_at: Utc::now(),
        });
        self.persist(&entries).await?;
        info!("Cached {} ({})", name, kind);
        Ok(())
    }

    async fn persist(&self, entries: &[CacheEntry]) -> LauncherResult<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| LauncherError::io(&self.root, e))?;
        let index_path = self.root.join(INDEX_FILE);
        let staging = index_path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(entries)?;
        tokio::fs::write(&staging, json)
            .await
            .map_err(|e| LauncherError::io(&staging, e))?;
        tokio::fs::rename(&staging, &index_path)
            .await
            .map_err(|e| LauncherError::io(&index_path, e))
    }
}
