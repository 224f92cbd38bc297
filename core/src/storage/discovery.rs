use std::{
    ffi::OsStr,
    fs, io,
    path::{Path, PathBuf},
};

use crate::error::{Result, StoreError};

use super::shard::{DATA_EXTENSION, INDEX_EXTENSION};

/// Turn a user-supplied path into a base name. `depot.csm`, `depot.csd`
/// and a full shard file name like `depot_3.csm` all map to `depot`. A path
/// without one of the two extensions is returned unchanged.
pub fn normalize_base(path: &Path) -> PathBuf {
    let ext = path.extension().and_then(OsStr::to_str);
    if ext != Some(INDEX_EXTENSION) && ext != Some(DATA_EXTENSION) {
        return path.to_path_buf();
    }

    let stripped = path.with_extension("");
    let Some(name) = stripped.file_name().and_then(OsStr::to_str) else {
        return stripped;
    };

    match name.rsplit_once('_') {
        Some((prefix, id)) if !prefix.is_empty() && parse_id(id).is_some() => {
            stripped.with_file_name(prefix)
        }
        _ => stripped,
    }
}

/// Parses a shard id. Only plain decimal digits without leading zeros are
/// accepted and the id must be positive.
fn parse_id(s: &str) -> Option<u32> {
    if s.is_empty() || s.starts_with('0') || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<u32>().ok().filter(|id| *id > 0)
}

fn split_base(base: &Path) -> (PathBuf, String) {
    let dir = match base.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let prefix = base
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    (dir, prefix)
}

/// List the ids of all files named `<base>_<id>.<extension>`, ascending
fn discover_with_extension(base: &Path, extension: &str) -> Result<Vec<u32>> {
    let (dir, prefix) = split_base(base);

    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::io(&dir, e)),
    };

    let mut ids = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StoreError::io(&dir, e))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };

        let id = name
            .strip_prefix(prefix.as_str())
            .and_then(|rest| rest.strip_prefix('_'))
            .and_then(|rest| rest.strip_suffix(extension))
            .and_then(|rest| rest.strip_suffix('.'))
            .and_then(parse_id);

        if let Some(id) = id {
            ids.push(id);
        }
    }

    ids.sort_unstable();
    Ok(ids)
}

/// List the ids of all shards with an index file, ascending
pub fn discover_shards(base: &Path) -> Result<Vec<u32>> {
    discover_with_extension(base, INDEX_EXTENSION)
}

/// List the ids of all shards with a data file, ascending
pub fn discover_data_files(base: &Path) -> Result<Vec<u32>> {
    discover_with_extension(base, DATA_EXTENSION)
}

/// Shard ids must be numbered 1, 2, 3, ... without gaps
pub fn check_contiguous(base: &Path, ids: &[u32]) -> Result<()> {
    for (expected, id) in (1u32..).zip(ids) {
        if *id != expected {
            return Err(StoreError::Integrity(format!(
                "shard {expected} of `{}' is missing (found shard {id} instead)",
                base.display()
            )));
        }
    }
    Ok(())
}
