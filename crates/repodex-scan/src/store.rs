//! JSON-file fingerprint store, one file per repository.
//!
//! Per-repository files keep concurrent passes over independent
//! repositories from interleaving state. Writes go through a temp file and
//! an atomic rename.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use repodex_core::traits::FingerprintStore;
use repodex_core::types::FingerprintEntry;
use repodex_core::{Error, Result};

pub struct JsonFingerprintStore {
    dir: PathBuf,
}

impl JsonFingerprintStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn file_for(&self, repo: &str) -> PathBuf {
        // Repo names come from config; keep the filename tame anyway.
        let safe: String = repo
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("fingerprints-{safe}.json"))
    }

    fn read_map(&self, repo: &str) -> Result<BTreeMap<String, FingerprintEntry>> {
        let path = self.file_for(repo);
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Store(format!("corrupt fingerprint file {}: {e}", path.display())))
    }

    fn write_map(&self, repo: &str, map: &BTreeMap<String, FingerprintEntry>) -> Result<()> {
        let path = self.file_for(repo);
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(map)
            .map_err(|e| Error::Store(format!("serialize fingerprints: {e}")))?;
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

impl FingerprintStore for JsonFingerprintStore {
    fn load_all(&self, repo: &str) -> Result<Vec<FingerprintEntry>> {
        Ok(self.read_map(repo)?.into_values().collect())
    }

    fn upsert(&self, repo: &str, entry: &FingerprintEntry) -> Result<()> {
        let mut map = self.read_map(repo)?;
        map.insert(entry.path.to_string_lossy().into_owned(), entry.clone());
        self.write_map(repo, &map)
    }

    fn delete(&self, repo: &str, path: &Path) -> Result<()> {
        let mut map = self.read_map(repo)?;
        map.remove(path.to_string_lossy().as_ref());
        self.write_map(repo, &map)
    }
}
