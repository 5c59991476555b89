// ─── InterfaceOficial Install Core ───
// Everything between "the user picked a version" and "the files are on disk".
//
// Architecture:
//   core/
//     task/       — Staged, cancellable install tasks + ordered groups
//     downloader/ — Pooled downloads + persistent-connection object fetcher
//     cache/      — Content-addressed blob store for installers
//     loaders/    — Vanilla, Forge and NeoForge install routines
//     mods/       — Mod file downloads into an instance
//     maven/      — Coordinate parsing + library descriptors
//     version/    — Mojang manifest + version JSON + OS rules
//     assets/     — Asset index + object downloads
//     instance/   — Instance model + persistence
//     state/      — Settings, paths and the service root

pub mod assets;
pub mod cache;
pub mod downloader;
pub mod error;
pub mod http;
pub mod instance;
pub mod loaders;
pub mod maven;
pub mod mods;
pub mod state;
pub mod task;
pub mod version;
