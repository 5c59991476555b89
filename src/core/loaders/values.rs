// ─── Data Values ───
// Profile `data` entries are symbolic tokens. They are resolved once per
// install into plain strings, then substituted into processor arguments.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::archive::ArchiveReader;
use super::profile::DataEntry;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::maven::MavenArtifact;

const MAX_REDUCTION_DEPTH: usize = 8;

/// Shape of a raw data value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataToken<'a> {
    /// `'text'`
    Literal(&'a str),
    /// `[group:artifact:version]`
    Artifact(&'a str),
    /// `/path/inside/installer`
    ArchiveEntry(&'a str),
    Plain(&'a str),
}

impl<'a> DataToken<'a> {
    pub fn classify(raw: &'a str) -> Self {
        if let Some(inner) = raw.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
            DataToken::Literal(inner)
        } else if let Some(inner) = raw.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            DataToken::Artifact(inner)
        } else if raw.starts_with('/') {
            DataToken::ArchiveEntry(raw)
        } else {
            DataToken::Plain(raw)
        }
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn artifact_path(coord: &str, libraries_dir: &Path) -> LauncherResult<String> {
    Ok(path_string(&MavenArtifact::parse(coord)?.path_in(libraries_dir)))
}

/// `scratch` joined with the forward-slash entry name.
fn scratch_target(scratch: &Path, entry: &str) -> PathBuf {
    entry
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != "..")
        .fold(scratch.to_path_buf(), |acc, segment| acc.join(segment))
}

fn resolve_one(
    key: &str,
    raw: &str,
    archive: &mut dyn ArchiveReader,
    libraries_dir: &Path,
    scratch: &Path,
) -> LauncherResult<String> {
    let unresolvable = |reason: String| LauncherError::UnresolvableToken {
        key: key.to_string(),
        value: raw.to_string(),
        reason,
    };

    match DataToken::classify(raw) {
        DataToken::Literal(text) | DataToken::Plain(text) => Ok(text.to_string()),
        DataToken::Artifact(coord) => {
            artifact_path(coord, libraries_dir).map_err(|e| unresolvable(e.to_string()))
        }
        DataToken::ArchiveEntry(entry) => {
            let bytes = archive
                .read_entry(entry)
                .map_err(|e| unresolvable(e.to_string()))?;
            let target = scratch_target(scratch, entry);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
            }
            std::fs::write(&target, bytes).map_err(|e| LauncherError::io(&target, e))?;
            debug!("Extracted {} to {:?}", entry, target);
            Ok(path_string(&target))
        }
    }
}

/// Resolve every client-side data value. `baseline` keys are inserted last
/// and override same-named profile entries.
pub fn resolve_data_values(
    data: &BTreeMap<String, DataEntry>,
    archive: &mut dyn ArchiveReader,
    libraries_dir: &Path,
    scratch: &Path,
    baseline: Vec<(String, String)>,
) -> LauncherResult<HashMap<String, String>> {
    let mut values = HashMap::with_capacity(data.len() + baseline.len());
    for (key, entry) in data {
        let resolved = resolve_one(key, &entry.client, archive, libraries_dir, scratch)?;
        values.insert(key.clone(), resolved);
    }
    values.extend(baseline);
    Ok(values)
}

/// Reduce a value that is itself a token (`[coord]` or `{KEY}`) until it is
/// a plain string.
fn reduce(
    value: &str,
    values: &HashMap<String, String>,
    libraries_dir: &Path,
    depth: usize,
) -> LauncherResult<String> {
    if depth > MAX_REDUCTION_DEPTH {
        return Err(LauncherError::UnresolvableToken {
            key: String::new(),
            value: value.to_string(),
            reason: "reference cycle".into(),
        });
    }
    if let DataToken::Artifact(coord) = DataToken::classify(value) {
        return artifact_path(coord, libraries_dir);
    }
    if !value.contains('{') {
        return Ok(value.to_string());
    }

    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let key = &rest[start + 1..start + len];
        let replacement = values
            .get(key)
            .ok_or_else(|| LauncherError::MissingProfileKey(key.to_string()))?;
        out.push_str(&reduce(replacement, values, libraries_dir, depth + 1)?);
        rest = &rest[start + len + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Substitute one processor argument.
pub fn substitute_arg(
    arg: &str,
    values: &HashMap<String, String>,
    libraries_dir: &Path,
) -> LauncherResult<String> {
    reduce(arg, values, libraries_dir, 0)
}
