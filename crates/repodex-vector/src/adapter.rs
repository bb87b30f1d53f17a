//! Chunked vector adapter over LanceDB.
//!
//! Upsert is full replacement: every existing chunk of a document is
//! deleted before fresh chunks are written, because chunk boundaries shift
//! between versions and stale chunks would corrupt later queries. A chunk
//! the provider permanently rejects is skipped and logged; the rest of the
//! document is still indexed.

use arrow_array::cast::AsArray;
use arrow_array::{
    FixedSizeListArray, Int32Array, RecordBatch, RecordBatchIterator, StringArray,
};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::Connection;
use std::fmt::Display;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use repodex_core::config::ChunkingSettings;
use repodex_core::traits::{Embedder, SearchFilters, VectorBackend};
use repodex_core::types::{BatchOutcome, Chunk, DocId, ScannedFile, VectorHit};
use repodex_core::{Error, Result};

use crate::chunker::chunk_text;
use crate::schema::build_chunk_schema;
use crate::table::{ensure_chunk_table, open_db};

fn unavailable(e: impl Display) -> Error {
    Error::BackendUnavailable {
        backend: "vector",
        message: e.to_string(),
    }
}

fn sql_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

pub struct LanceVectorIndex {
    db: Connection,
    table_name: String,
    embedder: Box<dyn Embedder>,
    chunking: ChunkingSettings,
}

impl LanceVectorIndex {
    pub async fn open(
        db_path: &Path,
        table_name: &str,
        embedder: Box<dyn Embedder>,
        chunking: ChunkingSettings,
    ) -> Result<Self> {
        let db = open_db(db_path.to_string_lossy().as_ref()).await?;
        ensure_chunk_table(&db, table_name, embedder.dim() as i32).await?;
        Ok(Self {
            db,
            table_name: table_name.to_string(),
            embedder,
            chunking,
        })
    }

    /// Embed every chunk, tolerating permanently rejected spans.
    ///
    /// Transient provider failures propagate so the pipeline can retry the
    /// batch; a permanent rejection downgrades to per-chunk embedding so
    /// only the offending span is dropped.
    fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Option<Vec<f32>>>> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        match self.embedder.embed_batch(&texts) {
            Ok(vectors) => Ok(vectors.into_iter().map(Some).collect()),
            Err(Error::EmbeddingFailure {
                transient: false, ..
            }) => {
                let mut out = Vec::with_capacity(chunks.len());
                for chunk in chunks {
                    match self.embedder.embed_batch(std::slice::from_ref(&chunk.text)) {
                        Ok(mut v) => out.push(Some(v.remove(0))),
                        Err(e) => {
                            warn!(
                                doc_id = %chunk.doc_id,
                                seq = chunk.seq,
                                error = %e,
                                "skipping chunk rejected by embedding provider"
                            );
                            out.push(None);
                        }
                    }
                }
                Ok(out)
            }
            Err(e) => Err(e),
        }
    }

    async fn replace_document(&self, file: &ScannedFile) -> Result<()> {
        let table = self
            .db
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(unavailable)?;
        table
            .delete(&format!("doc_id = {}", sql_quote(file.doc_id.as_str())))
            .await
            .map_err(unavailable)?;

        let chunks = chunk_text(&file.doc_id, &file.content, &self.chunking);
        if chunks.is_empty() {
            debug!(doc_id = %file.doc_id, "document produced zero chunks");
            return Ok(());
        }
        let vectors = self.embed_chunks(&chunks)?;

        let kept: Vec<(&Chunk, Vec<f32>)> = chunks
            .iter()
            .zip(vectors)
            .filter_map(|(c, v)| v.map(|v| (c, v)))
            .collect();
        if kept.is_empty() {
            warn!(doc_id = %file.doc_id, "no embeddable chunks; document absent from vector index");
            return Ok(());
        }

        let batch = self.chunks_to_record_batch(file, &kept)?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        table.add(reader).execute().await.map_err(unavailable)?;
        Ok(())
    }

    fn chunks_to_record_batch(
        &self,
        file: &ScannedFile,
        kept: &[(&Chunk, Vec<f32>)],
    ) -> Result<RecordBatch> {
        let dim = self.embedder.dim() as i32;
        let schema = build_chunk_schema(dim);
        let mut ids = Vec::new();
        let mut doc_ids = Vec::new();
        let mut repos = Vec::new();
        let mut rel_paths = Vec::new();
        let mut file_types = Vec::new();
        let mut seqs = Vec::new();
        let mut contents = Vec::new();
        let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::new();
        for (chunk, vector) in kept {
            ids.push(chunk.chunk_id());
            doc_ids.push(chunk.doc_id.as_str().to_string());
            repos.push(file.repo.clone());
            rel_paths.push(file.rel_path.clone());
            file_types.push(file.file_type.clone());
            seqs.push(chunk.seq as i32);
            contents.push(chunk.text.clone());
            vectors.push(Some(vector.iter().map(|&x| Some(x)).collect()));
        }
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(doc_ids)),
                Arc::new(StringArray::from(repos)),
                Arc::new(StringArray::from(rel_paths)),
                Arc::new(StringArray::from(file_types)),
                Arc::new(Int32Array::from(seqs)),
                Arc::new(StringArray::from(contents)),
                Arc::new(FixedSizeListArray::from_iter_primitive::<
                    arrow_array::types::Float32Type,
                    _,
                    _,
                >(vectors.into_iter(), dim)),
            ],
        )
        .map_err(unavailable)?;
        Ok(batch)
    }
}

#[async_trait]
impl VectorBackend for LanceVectorIndex {
    async fn upsert(&self, files: &[ScannedFile]) -> Result<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        for file in files {
            match self.replace_document(file).await {
                Ok(()) => outcome.succeeded.push(file.doc_id.clone()),
                Err(e) => {
                    warn!(doc_id = %file.doc_id, error = %e, "vector upsert failed for document");
                    outcome.failed.push((file.doc_id.clone(), e.to_string()));
                }
            }
        }
        Ok(outcome)
    }

    async fn delete(&self, ids: &[DocId]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let table = self
            .db
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(unavailable)?;
        let list = ids
            .iter()
            .map(|id| sql_quote(id.as_str()))
            .collect::<Vec<_>>()
            .join(",");
        table
            .delete(&format!("doc_id IN ({list})"))
            .await
            .map_err(unavailable)?;
        Ok(ids.len())
    }

    async fn query(
        &self,
        text: &str,
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<VectorHit>> {
        let query_vector = self
            .embedder
            .embed_batch(std::slice::from_ref(&text.to_string()))?
            .remove(0);
        let table = self
            .db
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(unavailable)?;

        let mut query = table
            .vector_search(query_vector)
            .map_err(unavailable)?
            .limit(limit);
        let mut predicates = Vec::new();
        if let Some(repo) = &filters.repo {
            predicates.push(format!("repo = {}", sql_quote(repo)));
        }
        if let Some(file_type) = &filters.file_type {
            predicates.push(format!("file_type = {}", sql_quote(file_type)));
        }
        if !predicates.is_empty() {
            query = query.only_if(predicates.join(" AND "));
        }

        let mut stream = query.execute().await.map_err(unavailable)?;
        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await.map_err(unavailable)? {
            let get_str = |name: &str| -> Result<&StringArray> {
                batch
                    .column_by_name(name)
                    .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                    .ok_or_else(|| Error::Store(format!("missing column '{name}'")))
            };
            let doc_id_col = get_str("doc_id")?;
            let rel_path_col = get_str("rel_path")?;
            let repo_col = get_str("repo")?;
            let content_col = get_str("content")?;
            let seq_col = batch
                .column_by_name("seq")
                .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
                .ok_or_else(|| Error::Store("missing column 'seq'".to_string()))?;
            let distance_col = batch
                .column_by_name("_distance")
                .map(|c| c.as_primitive::<arrow_array::types::Float32Type>().clone());
            for i in 0..batch.num_rows() {
                // Cosine-style similarity from the reported distance.
                let score = match &distance_col {
                    Some(d) => 1.0 - d.value(i),
                    None => 0.5,
                };
                hits.push(VectorHit {
                    doc_id: DocId::new(doc_id_col.value(i).to_string()),
                    seq: seq_col.value(i) as u32,
                    score,
                    text: content_col.value(i).to_string(),
                    rel_path: rel_path_col.value(i).to_string(),
                    repo: repo_col.value(i).to_string(),
                });
            }
        }
        Ok(hits)
    }
}
