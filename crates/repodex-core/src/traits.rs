//! Seams between the pipeline/engine and the external collaborators.

use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;
use crate::types::{BatchOutcome, DocId, FingerprintEntry, KeywordHit, ScannedFile, VectorHit};

/// Optional narrowing applied to both backends at query time.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub repo: Option<String>,
    pub file_type: Option<String>,
}

/// Whole-document lexical store (inverted index).
///
/// `upsert` replaces any prior record with the same identity. Scores
/// returned by `query` are backend-native and opaque apart from their
/// ordering; normalization is the fusion step's job.
#[async_trait]
pub trait KeywordBackend: Send + Sync {
    async fn upsert(&self, files: &[ScannedFile]) -> Result<BatchOutcome>;
    async fn delete(&self, ids: &[DocId]) -> Result<usize>;
    async fn query(
        &self,
        text: &str,
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<KeywordHit>>;
}

/// Chunked semantic store (nearest-neighbor index).
///
/// `upsert` is full replacement: all existing chunks of a document are
/// removed before fresh chunks are written, never a partial patch.
/// `delete` cascades to every sequence number of each identity.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    async fn upsert(&self, files: &[ScannedFile]) -> Result<BatchOutcome>;
    async fn delete(&self, ids: &[DocId]) -> Result<usize>;
    async fn query(
        &self,
        text: &str,
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<VectorHit>>;
}

/// Embedding provider boundary.
///
/// Errors must be distinguishable as transient (retryable) vs permanent
/// (span too long, invalid encoding) via
/// [`crate::Error::EmbeddingFailure`].
pub trait Embedder: Send + Sync {
    /// Stable identifier of the model/provider; embeddings from different
    /// ids are not comparable.
    fn id(&self) -> &str;
    fn dim(&self) -> usize;
    /// Longest span (in characters) accepted by `embed_batch`.
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Persistence for the last fingerprint seen per absolute path.
pub trait FingerprintStore: Send + Sync {
    fn load_all(&self, repo: &str) -> Result<Vec<FingerprintEntry>>;
    fn upsert(&self, repo: &str, entry: &FingerprintEntry) -> Result<()>;
    fn delete(&self, repo: &str, path: &Path) -> Result<()>;
}
