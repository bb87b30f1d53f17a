//! Deterministic repository file scanner.
//!
//! Walks the repository root in lexicographic directory order so two scans
//! of an unchanged tree yield the same sequence. Exclude globs prune whole
//! directories without descending; include globs narrow files; oversized
//! and binary files are skipped, never truncated.

use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use repodex_core::config::RepoSpec;
use repodex_core::identity::doc_id;
use repodex_core::types::ScannedFile;
use repodex_core::{Error, Result};

/// Bytes sniffed from the head of each file for the binary check.
const BINARY_SNIFF_LEN: usize = 8192;

pub struct RepoScanner {
    spec: RepoSpec,
    root: PathBuf,
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
}

impl RepoScanner {
    pub fn new(spec: &RepoSpec) -> Result<Self> {
        let root = Path::new(&spec.root)
            .canonicalize()
            .map_err(|e| Error::InvalidPath {
                path: PathBuf::from(&spec.root),
                reason: e.to_string(),
            })?;
        let include = if spec.include.is_empty() {
            None
        } else {
            Some(build_globset(&spec.include)?)
        };
        let exclude = if spec.exclude.is_empty() {
            None
        } else {
            Some(build_globset(&spec.exclude)?)
        };
        Ok(Self {
            spec: spec.clone(),
            root,
            include,
            exclude,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lazy, restartable sequence of files under the repository root.
    ///
    /// Unreadable entries surface as `Err` items; the caller decides
    /// whether to tally and continue. Excluded, oversized and binary files
    /// are silently dropped from the sequence.
    pub fn scan(&self) -> impl Iterator<Item = Result<ScannedFile>> + '_ {
        WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |e| self.keep_entry(e))
            .filter_map(move |entry| self.to_scanned(entry).transpose())
    }

    fn keep_entry(&self, entry: &DirEntry) -> bool {
        let rel = match self.rel_path(entry.path()) {
            Some(rel) => rel,
            None => return true, // the root itself
        };
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(&rel) {
                return false;
            }
        }
        if entry.file_type().is_file() {
            if let Some(include) = &self.include {
                return include.is_match(&rel);
            }
        }
        true
    }

    fn to_scanned(&self, entry: walkdir::Result<DirEntry>) -> Result<Option<ScannedFile>> {
        let entry = entry.map_err(|e| Error::Io(std::io::Error::other(e)))?;
        if !entry.file_type().is_file() {
            return Ok(None);
        }
        let path = entry.path();
        let metadata = entry.metadata().map_err(|e| Error::Io(std::io::Error::other(e)))?;
        if metadata.len() > self.spec.max_file_size {
            debug!(path = %path.display(), size = metadata.len(), "skipping oversized file");
            return Ok(None);
        }

        let bytes = std::fs::read(path)?;
        if self.spec.skip_binary && looks_binary(&bytes) {
            debug!(path = %path.display(), "skipping binary file");
            return Ok(None);
        }
        let content = match String::from_utf8(bytes) {
            Ok(content) => content,
            Err(_) => {
                debug!(path = %path.display(), "skipping undecodable file");
                return Ok(None);
            }
        };

        let rel_path = self.rel_path(path).unwrap_or_default();
        let modified_at: DateTime<Utc> = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        Ok(Some(ScannedFile {
            doc_id: doc_id(path)?,
            abs_path: path.to_path_buf(),
            rel_path,
            file_type: file_type_of(path),
            size: metadata.len(),
            fingerprint: blake3::hash(content.as_bytes()).to_hex().to_string(),
            content,
            modified_at,
            repo: self.spec.name.clone(),
        }))
    }

    fn rel_path(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        if rel.as_os_str().is_empty() {
            return None;
        }
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| Error::Store(format!("bad glob pattern '{pattern}': {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| Error::Store(format!("glob set: {e}")))
}

/// Prefix heuristic: a NUL byte in the head marks the file as binary; the
/// full decodability check happens when the bytes become a `String`.
fn looks_binary(bytes: &[u8]) -> bool {
    let sniff = &bytes[..bytes.len().min(BINARY_SNIFF_LEN)];
    sniff.contains(&0)
}

fn file_type_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}
