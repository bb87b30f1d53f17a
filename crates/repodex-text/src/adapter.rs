//! Whole-document keyword adapter.
//!
//! Records are keyed by `DocId`: upsert deletes the prior record's term
//! before adding the replacement, so re-indexing a file never duplicates
//! it. Scores are tantivy BM25, opaque to callers except for ordering.

use async_trait::async_trait;
use std::fmt::Display;
use std::path::Path;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::snippet::SnippetGenerator;
use tantivy::{doc, Index, TantivyDocument, Term};
use tokio::sync::Mutex;
use tracing::debug;

use repodex_core::traits::{KeywordBackend, SearchFilters};
use repodex_core::types::{BatchOutcome, DocId, KeywordHit, ScannedFile};
use repodex_core::{Error, Result};

const WRITER_HEAP_BYTES: usize = 50_000_000;

pub struct TantivyKeywordIndex {
    index: Index,
    // tantivy allows one writer per index; serialize mutations through it
    // instead of re-acquiring the writer lock per call.
    writer: Mutex<tantivy::IndexWriter>,
    id_field: tantivy::schema::Field,
    repo_field: tantivy::schema::Field,
    rel_path_field: tantivy::schema::Field,
    file_type_field: tantivy::schema::Field,
    size_field: tantivy::schema::Field,
    text_field: tantivy::schema::Field,
}

fn unavailable(e: impl Display) -> Error {
    Error::BackendUnavailable {
        backend: "keyword",
        message: e.to_string(),
    }
}

impl TantivyKeywordIndex {
    /// Open the index at `dir`, creating it (and the directory) if absent.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let schema = crate::tantivy_utils::build_schema();
        let mmap = tantivy::directory::MmapDirectory::open(dir).map_err(unavailable)?;
        let index = Index::open_or_create(mmap, schema.clone()).map_err(unavailable)?;
        crate::tantivy_utils::register_tokenizer(&index);
        let writer: tantivy::IndexWriter = index.writer(WRITER_HEAP_BYTES).map_err(unavailable)?;
        Ok(Self {
            writer: Mutex::new(writer),
            id_field: schema.get_field("id").map_err(unavailable)?,
            repo_field: schema.get_field("repo").map_err(unavailable)?,
            rel_path_field: schema.get_field("rel_path").map_err(unavailable)?,
            file_type_field: schema.get_field("file_type").map_err(unavailable)?,
            size_field: schema.get_field("size").map_err(unavailable)?,
            text_field: schema.get_field("text").map_err(unavailable)?,
            index,
        })
    }
}

#[async_trait]
impl KeywordBackend for TantivyKeywordIndex {
    async fn upsert(&self, files: &[ScannedFile]) -> Result<BatchOutcome> {
        let mut writer = self.writer.lock().await;
        let mut outcome = BatchOutcome::default();
        for file in files {
            writer.delete_term(Term::from_field_text(self.id_field, file.doc_id.as_str()));
            let document = doc!(
                self.id_field => file.doc_id.as_str(),
                self.repo_field => file.repo.clone(),
                self.rel_path_field => file.rel_path.clone(),
                self.file_type_field => file.file_type.clone(),
                self.size_field => file.size,
                self.text_field => file.content.clone(),
            );
            match writer.add_document(document) {
                Ok(_) => outcome.succeeded.push(file.doc_id.clone()),
                Err(e) => outcome.failed.push((file.doc_id.clone(), e.to_string())),
            }
        }
        writer.commit().map_err(unavailable)?;
        debug!(
            upserted = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            "keyword upsert batch committed"
        );
        Ok(outcome)
    }

    async fn delete(&self, ids: &[DocId]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut writer = self.writer.lock().await;
        for id in ids {
            writer.delete_term(Term::from_field_text(self.id_field, id.as_str()));
        }
        writer.commit().map_err(unavailable)?;
        Ok(ids.len())
    }

    async fn query(
        &self,
        text: &str,
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<KeywordHit>> {
        let reader = self.index.reader().map_err(unavailable)?;
        let searcher = reader.searcher();
        let parser = QueryParser::for_index(&self.index, vec![self.text_field]);
        let parsed = parser
            .parse_query(text)
            .map_err(|e| Error::Query(e.to_string()))?;

        let query: Box<dyn Query> = if filters.repo.is_none() && filters.file_type.is_none() {
            parsed
        } else {
            let mut clauses: Vec<(Occur, Box<dyn Query>)> = vec![(Occur::Must, parsed)];
            if let Some(repo) = &filters.repo {
                clauses.push((
                    Occur::Must,
                    Box::new(TermQuery::new(
                        Term::from_field_text(self.repo_field, repo),
                        IndexRecordOption::Basic,
                    )),
                ));
            }
            if let Some(file_type) = &filters.file_type {
                clauses.push((
                    Occur::Must,
                    Box::new(TermQuery::new(
                        Term::from_field_text(self.file_type_field, file_type),
                        IndexRecordOption::Basic,
                    )),
                ));
            }
            Box::new(BooleanQuery::new(clauses))
        };

        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit))
            .map_err(unavailable)?;
        let snippet_generator =
            SnippetGenerator::create(&searcher, &*query, self.text_field).map_err(unavailable)?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let document: TantivyDocument = searcher.doc(address).map_err(unavailable)?;
            let get_str = |field| {
                document
                    .get_first(field)
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string()
            };
            let snippet = snippet_generator.snippet_from_doc(&document).to_html();
            hits.push(KeywordHit {
                doc_id: DocId::new(get_str(self.id_field)),
                score,
                snippet: if snippet.is_empty() { None } else { Some(snippet) },
                rel_path: get_str(self.rel_path_field),
                repo: get_str(self.repo_field),
            });
        }
        Ok(hits)
    }
}
