//! Local file enumeration and content hashing
//!
//! Walks a sync root recursively and yields one [`LocalFileRecord`] per
//! regular file, hashing contents in fixed-size chunks.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::error::{Error, Result};
use crate::path::normalize_key;

/// Read buffer size used while hashing
pub const HASH_CHUNK_SIZE: usize = 8192;

/// One local file under the sync root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileRecord {
    /// Absolute (root-joined) path
    pub path: PathBuf,
    /// Path relative to the sync root, in local form
    pub relative: PathBuf,
    /// Hex MD5 of the full content
    pub digest: String,
}

impl LocalFileRecord {
    /// Remote key this file maps to
    pub fn key(&self) -> String {
        normalize_key(&self.relative)
    }
}

/// Compute the hex MD5 digest of a file
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| Error::file(path, e))?;
    let mut context = md5::Context::new();
    let mut buf = [0u8; HASH_CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).map_err(|e| Error::file(path, e))?;
        if n == 0 {
            break;
        }
        context.consume(&buf[..n]);
    }
    Ok(format!("{:x}", context.compute()))
}

/// Dotfiles and dot-directories below the root are never published
fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

/// Recursive walker over a sync root
///
/// Every call to [`FileWalker::files`] starts a fresh traversal.
#[derive(Debug, Clone)]
pub struct FileWalker {
    root: PathBuf,
}

impl FileWalker {
    /// Create a walker, failing if `root` is not a directory
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::NotADirectory(root));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lazily yield the path of every regular file under the root
    ///
    /// Hidden entries (names starting with `.`) are pruned, directories
    /// included. Symlinks are followed. A symlink that loops back to one of
    /// its own ancestors is skipped with a warning; any other error is yielded.
    pub fn files(&self) -> impl Iterator<Item = Result<PathBuf>> + '_ {
        WalkDir::new(&self.root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_hidden(entry))
            .filter_map(|entry| match entry {
                Ok(entry) if entry.file_type().is_file() => Some(Ok(entry.into_path())),
                Ok(_) => None,
                Err(e) if e.loop_ancestor().is_some() => {
                    tracing::warn!(
                        path = ?e.path(),
                        "skipping symlink loop"
                    );
                    None
                }
                Err(e) => {
                    let path = e.path().unwrap_or(&self.root).to_path_buf();
                    let io = std::io::Error::other(e.to_string());
                    Some(Err(Error::file(path, io)))
                }
            })
    }

    /// Lazily yield a hashed record for every file
    pub fn records(&self) -> impl Iterator<Item = Result<LocalFileRecord>> + '_ {
        self.files().map(|path| {
            let path = path?;
            let relative = path
                .strip_prefix(&self.root)
                .map(Path::to_path_buf)
                .map_err(|e| Error::General(format!("{}: {e}", path.display())))?;
            let digest = hash_file(&path)?;
            tracing::debug!(path = %relative.display(), %digest, "hashed");
            Ok(LocalFileRecord {
                path,
                relative,
                digest,
            })
        })
    }
}
