//! Change classification against the persisted fingerprint set.
//!
//! Comparison is by content fingerprint, never by mtime, so a
//! touched-but-unmodified file costs nothing downstream.

use std::collections::HashMap;
use std::path::PathBuf;

use repodex_core::types::{FingerprintEntry, ScannedFile};

#[derive(Debug, Default)]
pub struct ChangeSet {
    /// No prior fingerprint entry.
    pub added: Vec<ScannedFile>,
    /// Fingerprint differs from the prior entry.
    pub modified: Vec<ScannedFile>,
    /// Fingerprint equal; skipped entirely by the adapters.
    pub unchanged: usize,
    /// Prior entries whose path is absent from the current scan.
    pub deleted: Vec<FingerprintEntry>,
}

impl ChangeSet {
    /// Files that must be forwarded for upsert.
    pub fn to_upsert(&self) -> Vec<ScannedFile> {
        let mut out = Vec::with_capacity(self.added.len() + self.modified.len());
        out.extend(self.added.iter().cloned());
        out.extend(self.modified.iter().cloned());
        out
    }

    pub fn is_clean(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }
}

/// Classify each current file as added/modified/unchanged and every prior
/// path missing from the scan as deleted.
pub fn detect(current: Vec<ScannedFile>, prior: &[FingerprintEntry]) -> ChangeSet {
    let mut remaining: HashMap<PathBuf, &FingerprintEntry> =
        prior.iter().map(|e| (e.path.clone(), e)).collect();

    let mut set = ChangeSet::default();
    for file in current {
        match remaining.remove(&file.abs_path) {
            None => set.added.push(file),
            Some(entry) if entry.fingerprint != file.fingerprint => set.modified.push(file),
            Some(_) => set.unchanged += 1,
        }
    }
    set.deleted = remaining.into_values().cloned().collect();
    // Deterministic order for reporting and batch deletes.
    set.deleted.sort_by(|a, b| a.path.cmp(&b.path));
    set
}
