//! Domain types shared by the scanner, both index adapters and the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Stable cross-index document identifier.
///
/// Derived exclusively from the normalized absolute path of the source file
/// (see [`crate::identity::doc_id`]). The same identity keys the lexical
/// record and all vector chunks of a document, so both adapters must obtain
/// it from the same `ScannedFile`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(String);

impl DocId {
    pub fn new(raw: String) -> Self {
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One filesystem entity considered for indexing.
///
/// Produced by the scanner on each pass; consumed by the adapters and then
/// discarded. Only its fingerprint survives (in the fingerprint store).
#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub doc_id: DocId,
    pub abs_path: PathBuf,
    /// Path relative to the repository root, `/`-separated.
    pub rel_path: String,
    /// Lowercased file extension, empty when absent.
    pub file_type: String,
    pub size: u64,
    pub content: String,
    /// blake3 hex digest of the raw bytes.
    pub fingerprint: String,
    pub modified_at: DateTime<Utc>,
    pub repo: String,
}

/// A bounded text span of a document, the unit stored in the vector index.
///
/// `seq` starts at zero and is contiguous per document so that all chunks of
/// a superseded document can be located and removed together.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub doc_id: DocId,
    pub seq: u32,
    pub text: String,
}

impl Chunk {
    /// Store key for this chunk, derivable from `(doc_id, seq)` alone.
    pub fn chunk_id(&self) -> String {
        format!("{}:{}", self.doc_id, self.seq)
    }
}

/// Last fingerprint seen per absolute path, persisted between passes.
///
/// Carries the `DocId` so deletions never have to re-derive an identity from
/// a path that no longer exists on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintEntry {
    pub path: PathBuf,
    pub doc_id: DocId,
    pub fingerprint: String,
    pub indexed_at: DateTime<Utc>,
}

/// Per-batch adapter result: which identities landed and which did not.
///
/// Both engines accept mixed batches, so a batch never fails atomically.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub succeeded: Vec<DocId>,
    pub failed: Vec<(DocId, String)>,
}

impl BatchOutcome {
    pub fn merge(&mut self, other: BatchOutcome) {
        self.succeeded.extend(other.succeeded);
        self.failed.extend(other.failed);
    }
}

/// A hit from the keyword backend. `score` is backend-native (BM25); only
/// its ordering is meaningful to callers.
#[derive(Debug, Clone)]
pub struct KeywordHit {
    pub doc_id: DocId,
    pub score: f32,
    pub snippet: Option<String>,
    pub rel_path: String,
    pub repo: String,
}

/// A per-chunk hit from the vector backend. `score` is a similarity, higher
/// is better; collapsing to one score per document happens during fusion.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub doc_id: DocId,
    pub seq: u32,
    pub score: f32,
    pub text: String,
    pub rel_path: String,
    pub repo: String,
}

/// Fused result unit returned to callers; at most one per `DocId`.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub doc_id: DocId,
    pub rel_path: String,
    pub repo: String,
    pub snippet: String,
    pub keyword_score: f32,
    pub vector_score: f32,
    pub score: f32,
    pub rank: usize,
}

/// Full query answer, including per-backend timing and whether one backend
/// was excluded from fusion.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub degraded: bool,
    /// Wall time of the keyword branch; `None` when it failed or timed out.
    pub keyword_ms: Option<u64>,
    /// Wall time of the vector branch; `None` when it failed or timed out.
    pub vector_ms: Option<u64>,
}
