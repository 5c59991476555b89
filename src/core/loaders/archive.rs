// ─── Archive Access ───
// Installers only ever need "does this entry exist" and "give me its bytes",
// so that is all the installer sees. Zip is the production backend.

use std::io::Read;
use std::path::{Path, PathBuf};

use crate::core::error::{LauncherError, LauncherResult};

pub trait ArchiveReader: Send {
    fn has_entry(&mut self, name: &str) -> bool;

    fn read_entry(&mut self, name: &str) -> LauncherResult<Vec<u8>>;
}

/// Opens archives by path. Injected into the installer.
pub trait ArchiveOpener: Send + Sync {
    fn open(&self, path: &Path) -> LauncherResult<Box<dyn ArchiveReader>>;
}

pub struct ZipOpener;

impl ArchiveOpener for ZipOpener {
    fn open(&self, path: &Path) -> LauncherResult<Box<dyn ArchiveReader>> {
        Ok(Box::new(ZipArchiveReader::open(path)?))
    }
}

pub struct ZipArchiveReader {
    path: PathBuf,
    archive: zip::ZipArchive<std::fs::File>,
}

impl ZipArchiveReader {
    pub fn open(path: &Path) -> LauncherResult<Self> {
        let file = std::fs::File::open(path).map_err(|e| LauncherError::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            archive: zip::ZipArchive::new(file)?,
        })
    }
}

/// Profile paths are written as `/data/client.lzma`; zip names have no
/// leading slash.
fn entry_name(name: &str) -> &str {
    name.trim_start_matches('/')
}

impl ArchiveReader for ZipArchiveReader {
    fn has_entry(&mut self, name: &str) -> bool {
        self.archive.index_for_name(entry_name(name)).is_some()
    }

    fn read_entry(&mut self, name: &str) -> LauncherResult<Vec<u8>> {
        let mut entry = match self.archive.by_name(entry_name(name)) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => {
                return Err(LauncherError::MissingArchiveEntry {
                    archive: self.path.clone(),
                    entry: name.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| LauncherError::io(&self.path, e))?;
        Ok(bytes)
    }
}

/// `Main-Class` from a jar's manifest, honouring 72-column continuation lines.
pub fn read_main_class(opener: &dyn ArchiveOpener, jar: &Path) -> LauncherResult<String> {
    let mut archive = opener.open(jar)?;
    let manifest = match archive.read_entry("META-INF/MANIFEST.MF") {
        Ok(bytes) => bytes,
        Err(LauncherError::MissingArchiveEntry { .. }) => {
            return Err(LauncherError::MissingMainClass(jar.to_path_buf()))
        }
        Err(e) => return Err(e),
    };
    let text = String::from_utf8_lossy(&manifest);

    let mut main_class: Option<String> = None;
    let mut current_key: Option<&str> = None;
    for line in text.lines() {
        if let Some(rest) = line.strip_prefix(' ') {
            if current_key == Some("Main-Class") {
                if let Some(value) = &mut main_class {
                    value.push_str(rest.trim_end());
                }
            }
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim();
            current_key = Some(key);
            if key == "Main-Class" {
                main_class = Some(value.trim().to_string());
            }
        }
    }

    main_class
        .filter(|c| !c.is_empty())
        .ok_or_else(|| LauncherError::MissingMainClass(jar.to_path_buf()))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::io::Write;
    use std::path::Path;

    /// Write a zip with the given entries.
    pub fn write_jar(path: &Path, entries: &[(&str, &[u8])]) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        let file = std::fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, bytes) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(bytes).unwrap();
        }
        zip.finish().unwrap();
    }
}
