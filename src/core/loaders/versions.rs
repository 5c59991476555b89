use serde::Deserialize;
use tracing::info;

use super::flavor::LoaderFlavor;
use crate::core::downloader::Downloader;
use crate::core::error::LauncherResult;

#[derive(Debug, Deserialize)]
struct MavenMetadata {
    versioning: MavenVersioning,
}

#[derive(Debug, Deserialize)]
struct MavenVersioning {
    versions: MavenVersions,
}

#[derive(Debug, Deserialize)]
struct MavenVersions {
    #[serde(rename = "version", default)]
    version: Vec<String>,
}

pub fn parse_metadata(xml: &str) -> LauncherResult<Vec<String>> {
    let metadata: MavenMetadata = quick_xml::de::from_str(xml)?;
    Ok(metadata.versioning.versions.version)
}

/// Loader versions from `published` that target `minecraft_version`,
/// newest first.
pub fn select_versions(
    flavor: &LoaderFlavor,
    published: &[String],
    minecraft_version: &str,
) -> Vec<String> {
    let mut versions: Vec<String> = published
        .iter()
        .filter_map(|v| flavor.loader_version_for(v, minecraft_version))
        .collect();
    versions.sort_by(|a, b| {
        version_sort_key(b)
            .cmp(&version_sort_key(a))
            .then_with(|| b.cmp(a))
    });
    versions.dedup();
    versions
}

/// Loader versions published for `minecraft_version`, newest first.
pub async fn list_loader_versions(
    downloader: &Downloader,
    flavor: &LoaderFlavor,
    minecraft_version: &str,
) -> LauncherResult<Vec<String>> {
    let body = downloader.fetch_bytes(flavor.metadata_url).await?;
    let published = parse_metadata(&String::from_utf8_lossy(&body))?;
    let versions = select_versions(flavor, &published, minecraft_version);
    info!(
        "{} {} versions available for {}",
        versions.len(),
        flavor.name(),
        minecraft_version
    );
    Ok(versions)
}

fn version_sort_key(version: &str) -> Vec<u64> {
    version
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<u64>().unwrap_or(0))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::core::downloader::MapTransport;
    use crate::core::error::LauncherError;
    use crate::core::loaders::flavor::{FORGE, NEOFORGE};

    const METADATA: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata>
  <groupId>net.minecraftforge</groupId>
  <artifactId>forge</artifactId>
  <versioning>
    <latest>1.20.4-49.0.3</latest>
    <versions>
      <version>1.20.1-47.1.0</version>
      <version>1.20.1-47.2.0</version>
      <version>1.20.1-47.10.1</version>
      <version>1.20.4-49.0.3</version>
    </versions>
  </versioning>
</metadata>"#;

    #[test]
    fn forge_metadata_filters_and_sorts_newest_first() {
        let published = parse_metadata(METADATA).unwrap();
        assert_eq!(published.len(), 4);
        assert_eq!(
            select_versions(&FORGE, &published, "1.20.1"),
            vec!["47.10.1", "47.2.0", "47.1.0"]
        );
    }

    #[test]
    fn neoforge_selection_uses_encoded_game_version() {
        let published: Vec<String> = ["20.4.70-beta", "20.4.80", "20.6.1", "21.0.3"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            select_versions(&NEOFORGE, &published, "1.20.4"),
            vec!["20.4.80", "20.4.70-beta"]
        );
        assert_eq!(select_versions(&NEOFORGE, &published, "1.21"), vec!["21.0.3"]);
    }

    #[tokio::test]
    async fn listing_reads_the_published_metadata() {
        let transport = Arc::new(MapTransport::default().with(FORGE.metadata_url, METADATA));
        let downloader = Downloader::with_transport(transport.clone());

        let versions = list_loader_versions(&downloader, &FORGE, "1.20.4").await.unwrap();
        assert_eq!(versions, vec!["49.0.3"]);
        assert_eq!(transport.requests(), vec![FORGE.metadata_url.to_string()]);
    }

    #[tokio::test]
    async fn unreachable_metadata_is_an_error() {
        let downloader = Downloader::with_transport(Arc::new(MapTransport::default()));
        let err = list_loader_versions(&downloader, &NEOFORGE, "1.20.4")
            .await
            .unwrap_err();
        assert!(matches!(err, LauncherError::DownloadFailed { status: 404, .. }));
    }
}
