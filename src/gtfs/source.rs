//! Where a feed comes from: a directory, a zip on disk, or uploaded bytes.

use bytes::Bytes;
use rustc_hash::FxHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::REQUIRED_FILES;
use super::archive::extract_members;
use crate::error::PipelineError;

#[derive(Debug, Clone)]
pub enum InputSource {
    /// A directory holding the `.txt` files directly.
    Directory(PathBuf),
    /// A zip archive on disk.
    Archive(PathBuf),
    /// Zip archive bytes received from an upload or a download.
    Upload { name: String, bytes: Bytes },
}

/// Identity of an input, used as the memoization key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputKey(pub u64);

impl InputSource {
    /// Treats paths ending in `.zip` as archives and anything else as a
    /// directory.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let is_zip = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("zip"));
        if is_zip {
            InputSource::Archive(path)
        } else {
            InputSource::Directory(path)
        }
    }

    pub fn upload(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        InputSource::Upload {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Reads the raw contents of each file in `names`.
    ///
    /// Fails with [`PipelineError::MissingInput`] naming the first absent
    /// file or member; never returns a partial set.
    pub fn read_members(
        &self,
        names: &[&str],
        max_archive_bytes: u64,
    ) -> Result<HashMap<String, Vec<u8>>, PipelineError> {
        match self {
            InputSource::Directory(dir) => {
                let mut members = HashMap::with_capacity(names.len());
                for name in names {
                    let path = dir.join(name);
                    let contents = std::fs::read(&path).map_err(|source| {
                        if source.kind() == ErrorKind::NotFound {
                            PipelineError::missing(name)
                        } else {
                            PipelineError::Io { path, source }
                        }
                    })?;
                    members.insert(name.to_string(), contents);
                }
                Ok(members)
            }
            InputSource::Archive(path) => {
                let bytes = std::fs::read(path).map_err(|source| {
                    if source.kind() == ErrorKind::NotFound {
                        PipelineError::missing(&path.display().to_string())
                    } else {
                        PipelineError::Io {
                            path: path.clone(),
                            source,
                        }
                    }
                })?;
                extract_members(&bytes, names, max_archive_bytes)
            }
            InputSource::Upload { bytes, .. } => {
                extract_members(bytes, names, max_archive_bytes)
            }
        }
    }

    /// Hashes what identifies this input's contents.
    ///
    /// Paths contribute their size and modification time, so rewriting a
    /// file on disk yields a new key. Uploads hash their bytes.
    pub fn key(&self) -> InputKey {
        let mut hasher = FxHasher::default();
        match self {
            InputSource::Directory(dir) => {
                "directory".hash(&mut hasher);
                dir.hash(&mut hasher);
                for name in REQUIRED_FILES {
                    hash_file_stamp(&dir.join(name), &mut hasher);
                }
            }
            InputSource::Archive(path) => {
                "archive".hash(&mut hasher);
                path.hash(&mut hasher);
                hash_file_stamp(path, &mut hasher);
            }
            InputSource::Upload { bytes, .. } => {
                "upload".hash(&mut hasher);
                bytes.hash(&mut hasher);
            }
        }
        let key = InputKey(hasher.finish());
        debug!(source = %self, key = key.0, "Computed input key");
        key
    }
}

fn hash_file_stamp(path: &Path, hasher: &mut FxHasher) {
    match std::fs::metadata(path) {
        Ok(meta) => {
            meta.len().hash(hasher);
            meta.modified().ok().hash(hasher);
        }
        Err(_) => "absent".hash(hasher),
    }
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSource::Directory(dir) => write!(f, "{}", dir.display()),
            InputSource::Archive(path) => write!(f, "{}", path.display()),
            InputSource::Upload { name, bytes } => write!(f, "{} ({} bytes)", name, bytes.len()),
        }
    }
}
