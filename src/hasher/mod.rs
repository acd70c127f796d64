pub mod digest;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Component, Path};

/// Strategy used to decide whether two files are "the same".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HashMode {
    /// BLAKE3 digest of the full file content.
    #[default]
    #[serde(rename = "CONTENT", alias = "SHA256")]
    Content,
    /// Lowercased immediate parent directory name plus lowercased file name.
    #[serde(rename = "FILENAME_AND_PARENT")]
    FilenameAndParent,
    /// Lowercased file name only.
    #[serde(rename = "FILENAME")]
    Filename,
}

/// Comparable "sameness" key for a file.
///
/// Planners and resolvers only ever compare identities, so a new [`HashMode`]
/// only has to produce one of these.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Identity {
    Digest(String),
    Name(String),
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Digest(hex) => write!(f, "blake3:{}", hex),
            Identity::Name(name) => write!(f, "name:{}", name),
        }
    }
}

impl HashMode {
    /// Computes the identity of `absolute`, whose location relative to the
    /// scanned root is `relative`. Name based modes use the relative path so
    /// that a file at the same place in two different trees gets the same key.
    pub fn identity(&self, absolute: &Path, relative: &Path) -> Result<Identity> {
        match self {
            HashMode::Content => digest::content_digest(absolute)
                .map(Identity::Digest)
                .map_err(|source| Error::Hash {
                    path: absolute.to_path_buf(),
                    source,
                }),
            HashMode::FilenameAndParent => {
                let name = file_name_key(relative);
                let parent = relative
                    .parent()
                    .and_then(|p| p.components().last())
                    .and_then(|c| match c {
                        Component::Normal(s) => Some(s.to_string_lossy().to_lowercase()),
                        _ => None,
                    })
                    .unwrap_or_default();
                Ok(Identity::Name(format!("{}/{}", parent, name)))
            }
            HashMode::Filename => Ok(Identity::Name(file_name_key(relative))),
        }
    }

    /// True when equal identities imply byte-identical content.
    pub fn is_content_exact(&self) -> bool {
        matches!(self, HashMode::Content)
    }

    /// Checks that the file at `path` is a faithful copy of a file with the
    /// given identity and size.
    ///
    /// Content mode re-hashes. Name modes cannot vouch for content, so they
    /// fall back to a size check (the copied name may carry a numeric suffix).
    pub fn verify(&self, path: &Path, expected: &Identity, expected_size: u64) -> Result<bool> {
        let metadata = match fs::metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(source) => {
                return Err(Error::Hash {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        if !metadata.is_file() || metadata.len() != expected_size {
            return Ok(false);
        }
        match self {
            HashMode::Content => {
                let actual = digest::content_digest(path).map_err(|source| Error::Hash {
                    path: path.to_path_buf(),
                    source,
                })?;
                Ok(matches!(expected, Identity::Digest(hex) if *hex == actual))
            }
            HashMode::FilenameAndParent | HashMode::Filename => Ok(true),
        }
    }
}

impl fmt::Display for HashMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashMode::Content => write!(f, "content"),
            HashMode::FilenameAndParent => write!(f, "filename+parent"),
            HashMode::Filename => write!(f, "filename"),
        }
    }
}

fn file_name_key(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}
