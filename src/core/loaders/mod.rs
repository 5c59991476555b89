pub mod archive;
pub mod context;
pub mod flavor;
pub mod installer;
pub mod processor;
pub mod profile;
pub mod values;
pub mod vanilla;
pub mod versions;

pub use archive::{read_main_class, ArchiveOpener, ArchiveReader, ZipArchiveReader, ZipOpener};
pub use context::InstallContext;
pub use flavor::{LoaderFlavor, VersionScheme, FORGE, NEOFORGE};
pub use installer::{LoaderStage, ModLoaderInstaller};
pub use profile::{DataEntry, InstallProfile, InstallerManifest, Processor};
pub use vanilla::{GameInstaller, GameStage};
pub use versions::list_loader_versions;
