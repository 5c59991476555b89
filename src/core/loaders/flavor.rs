use crate::core::instance::LoaderType;
use crate::core::maven::{FORGE_MAVEN, NEOFORGE_MAVEN};

/// How a loader's published versions encode the game version they target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionScheme {
    /// `<minecraft>-<loader>`, e.g. `1.20.1-47.2.0`.
    GamePrefixed,
    /// `X.Y.Z` targets `1.X.Y` (`1.X` when `Y` is 0), e.g. `20.4.80` → `1.20.4`.
    GameEncoded,
}

/// Everything that differs between installer-based loaders. One generic
/// installer consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderFlavor {
    pub kind: LoaderType,
    pub group_id: &'static str,
    pub maven_base: &'static str,
    /// `{minecraft}` and `{loader}` are substituted.
    pub installer_url_template: &'static str,
    pub metadata_url: &'static str,
    pub version_scheme: VersionScheme,
}

pub const FORGE: LoaderFlavor = LoaderFlavor {
    kind: LoaderType::Forge,
    group_id: "net.minecraftforge",
    maven_base: FORGE_MAVEN,
    installer_url_template: "https://maven.minecraftforge.net/net/minecraftforge/forge/{minecraft}-{loader}/forge-{minecraft}-{loader}-installer.jar",
    metadata_url: "https://maven.minecraftforge.net/net/minecraftforge/forge/maven-metadata.xml",
    version_scheme: VersionScheme::GamePrefixed,
};

pub const NEOFORGE: LoaderFlavor = LoaderFlavor {
    kind: LoaderType::NeoForge,
    group_id: "net.neoforged",
    maven_base: NEOFORGE_MAVEN,
    installer_url_template: "https://maven.neoforged.net/releases/net/neoforged/neoforge/{loader}/neoforge-{loader}-installer.jar",
    metadata_url: "https://maven.neoforged.net/releases/net/neoforged/neoforge/maven-metadata.xml",
    version_scheme: VersionScheme::GameEncoded,
};

impl LoaderFlavor {
    pub fn for_loader(kind: LoaderType) -> Option<LoaderFlavor> {
        match kind {
            LoaderType::Forge => Some(FORGE),
            LoaderType::NeoForge => Some(NEOFORGE),
            LoaderType::Vanilla => None,
        }
    }

    pub fn name(&self) -> String {
        self.kind.to_string()
    }

    pub fn installer_url(&self, minecraft_version: &str, loader_version: &str) -> String {
        self.installer_url_template
            .replace("{minecraft}", minecraft_version)
            .replace("{loader}", loader_version)
    }

    /// Cache name of the installer jar.
    pub fn cache_key(&self, minecraft_version: &str, loader_version: &str) -> String {
        format!("{}:{}:{}", self.group_id, minecraft_version, loader_version)
    }

    /// The loader version inside a published version string, if it targets
    /// `minecraft_version`.
    pub fn loader_version_for(&self, published: &str, minecraft_version: &str) -> Option<String> {
        match self.version_scheme {
            VersionScheme::GamePrefixed => published
                .strip_prefix(minecraft_version)?
                .strip_prefix('-')
                .map(str::to_owned),
            VersionScheme::GameEncoded => {
                (encoded_game_version(published)? == minecraft_version).then(|| published.to_owned())
            }
        }
    }
}

fn encoded_game_version(published: &str) -> Option<String> {
    let release = published.split('-').next()?;
    let mut parts = release.split('.');
    let major = parts.next()?.parse::<u32>().ok()?;
    let minor = parts.next()?.parse::<u32>().ok()?;
    Some(if minor == 0 {
        format!("1.{}", major)
    } else {
        format!("1.{}.{}", major, minor)
    })
}
