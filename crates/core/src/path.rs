//! Mapping between local relative paths and remote object keys
//!
//! Remote keys always use `/`, whatever the local platform separator is.

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Separator used in the remote key space
pub const KEY_SEPARATOR: char = '/';

/// Normalize a path relative to the sync root into a remote key
pub fn normalize_key(relative: &Path) -> String {
    normalize_with_separator(&relative.to_string_lossy(), std::path::MAIN_SEPARATOR)
}

/// Normalize `relative`, split on `separator`, into a remote key
///
/// For `\`-separated paths a leading two-character drive prefix (`C:`) is
/// stripped first; elsewhere `c:` is an ordinary file name. Empty segments
/// are dropped, so the result never starts with `/`.
pub fn normalize_with_separator(relative: &str, separator: char) -> String {
    let relative = if separator == '\\' {
        strip_drive(relative)
    } else {
        relative
    };
    relative
        .split(separator)
        .flat_map(|segment| segment.split(KEY_SEPARATOR))
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

fn strip_drive(path: &str) -> &str {
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        &path[2..]
    } else {
        path
    }
}

/// Last segment of a key
pub fn base_name(key: &str) -> &str {
    key.rsplit(KEY_SEPARATOR).next().unwrap_or(key)
}

/// Parent "directory" of a key with a trailing separator
///
/// `docs/index.html` gives `docs/`; a top-level key gives `/`.
pub fn directory_path(key: &str) -> String {
    match key.rfind(KEY_SEPARATOR) {
        Some(pos) => key[..=pos].to_string(),
        None => KEY_SEPARATOR.to_string(),
    }
}

/// Local destination for a remote key under `root`
///
/// Rejects keys that would escape `root` (`..`, absolute segments, drive prefixes).
pub fn local_path_for_key(root: &Path, key: &str) -> Result<PathBuf> {
    let mut path = root.to_path_buf();
    for segment in key.split(KEY_SEPARATOR).filter(|s| !s.is_empty()) {
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) => path.push(part),
            _ => return Err(Error::InvalidKey(key.to_string())),
        }
    }
    if path == root {
        return Err(Error::InvalidKey(key.to_string()));
    }
    Ok(path)
}
