//! Document identity: a pure function from absolute path to a stable id.
//!
//! `doc_id` is the sole mechanism binding a lexical record to its vector
//! chunks. The digest is blake3 over the UTF-8 bytes of the normalized
//! path, encoded with the URL-safe, padding-free base64 alphabet so the
//! result can be used verbatim as a key in both stores.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::DocId;

/// Compute the identity of `path`.
///
/// Deterministic across calls and processes: existing paths are
/// canonicalized (symlinks and relative segments resolved), absent absolute
/// paths are normalized lexically. Relative paths that cannot be resolved
/// fail with [`Error::InvalidPath`].
pub fn doc_id(path: &Path) -> Result<DocId> {
    let normalized = normalize_path(path)?;
    let digest = blake3::hash(normalized.to_string_lossy().as_bytes());
    Ok(DocId::new(URL_SAFE_NO_PAD.encode(digest.as_bytes())))
}

fn normalize_path(path: &Path) -> Result<PathBuf> {
    if let Ok(canonical) = path.canonicalize() {
        return Ok(canonical);
    }
    if !path.is_absolute() {
        return Err(Error::InvalidPath {
            path: path.to_path_buf(),
            reason: "relative path does not exist and cannot be resolved".to_string(),
        });
    }
    // The path no longer exists (deletions); clean it lexically so the
    // identity still matches what was computed while the file was present.
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return Err(Error::InvalidPath {
                        path: path.to_path_buf(),
                        reason: "parent traversal escapes the filesystem root".to_string(),
                    });
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    Ok(out)
}
