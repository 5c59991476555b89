use std::path::{Path, PathBuf};

use super::artifact::MavenArtifact;
use crate::core::downloader::DownloadItem;

/// A library as the pipeline sees it: coordinate, relative path, where to
/// fetch it from and the hash it must have.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Library {
    pub name: MavenArtifact,
    /// Forward-slash path relative to the libraries directory.
    pub path: String,
    pub url: Option<String>,
    pub sha1: Option<String>,
}

impl Library {
    /// Library whose path is derived from its coordinate and whose URL (if
    /// any) lives under `repo`.
    pub fn from_artifact(name: MavenArtifact, repo: Option<&str>) -> Self {
        let path = name.to_path();
        let url = repo.map(|r| name.url(r));
        Self {
            name,
            path,
            url,
            sha1: None,
        }
    }

    pub fn destination(&self, libraries_dir: &Path) -> PathBuf {
        self.path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .fold(libraries_dir.to_path_buf(), |acc, segment| acc.join(segment))
    }

    /// Libraries without a URL ship inside the installer archive.
    pub fn is_embedded(&self) -> bool {
        self.url.as_deref().map_or(true, |u| u.trim().is_empty())
    }

    /// Download request for this library. `fallback_repo` supplies the second
    /// URL tried when the primary one fails.
    pub fn download_item(
        &self,
        libraries_dir: &Path,
        fallback_repo: Option<&str>,
    ) -> Option<DownloadItem> {
        if self.is_embedded() {
            return None;
        }
        let url = self.url.clone()?;
        let mut item = DownloadItem::new(url.clone(), self.destination(libraries_dir));
        if let Some(fallback) = fallback_repo.map(|repo| self.name.url(repo)) {
            if fallback != url {
                item = item.with_fallback(fallback);
            }
        }
        if let Some(sha1) = &self.sha1 {
            item = item.with_sha1(sha1.clone());
        }
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::maven::{FORGE_MAVEN, MOJANG_LIBRARIES};

    #[test]
    fn derived_library_points_into_repo() {
        let name = MavenArtifact::parse("com.example:foo:1.0").unwrap();
        let lib = Library::from_artifact(name, Some(MOJANG_LIBRARIES));
        assert_eq!(lib.path, "com/example/foo/1.0/foo-1.0.jar");
        assert_eq!(
            lib.url.as_deref(),
            Some("https://libraries.minecraft.net/com/example/foo/1.0/foo-1.0.jar")
        );
        assert_eq!(
            lib.destination(Path::new("/libs")),
            Path::new("/libs").join("com/example/foo/1.0/foo-1.0.jar")
        );
    }

    #[test]
    fn download_item_carries_fallback_and_hash() {
        let name = MavenArtifact::parse("com.example:foo:1.0").unwrap();
        let mut lib = Library::from_artifact(name, Some(MOJANG_LIBRARIES));
        lib.sha1 = Some("abc".into());

        let item = lib.download_item(Path::new("/libs"), Some(FORGE_MAVEN)).unwrap();
        assert_eq!(
            item.fallback_url.as_deref(),
            Some("https://maven.minecraftforge.net/com/example/foo/1.0/foo-1.0.jar")
        );
        assert_eq!(item.sha1.as_deref(), Some("abc"));
    }

    #[test]
    fn embedded_library_has_no_download() {
        let name = MavenArtifact::parse("net.minecraftforge:forge:1.20.1-47.2.0:universal").unwrap();
        let mut lib = Library::from_artifact(name, None);
        assert!(lib.download_item(Path::new("/libs"), None).is_none());
        lib.url = Some(String::new());
        assert!(lib.is_embedded());
    }
}
