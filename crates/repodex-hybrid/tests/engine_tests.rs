use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use repodex_core::config::FusionSettings;
use repodex_core::traits::{KeywordBackend, SearchFilters, VectorBackend};
use repodex_core::types::{BatchOutcome, DocId, KeywordHit, ScannedFile, VectorHit};
use repodex_core::{Error, Result};
use repodex_hybrid::HybridSearchEngine;

struct CannedKeyword(Vec<KeywordHit>);

#[async_trait]
impl KeywordBackend for CannedKeyword {
    async fn upsert(&self, _files: &[ScannedFile]) -> Result<BatchOutcome> {
        Ok(BatchOutcome::default())
    }
    async fn delete(&self, _ids: &[DocId]) -> Result<usize> {
        Ok(0)
    }
    async fn query(
        &self,
        _text: &str,
        _limit: usize,
        _filters: &SearchFilters,
    ) -> Result<Vec<KeywordHit>> {
        Ok(self.0.clone())
    }
}

struct FailingKeyword;

#[async_trait]
impl KeywordBackend for FailingKeyword {
    async fn upsert(&self, _files: &[ScannedFile]) -> Result<BatchOutcome> {
        Ok(BatchOutcome::default())
    }
    async fn delete(&self, _ids: &[DocId]) -> Result<usize> {
        Ok(0)
    }
    async fn query(
        &self,
        _text: &str,
        _limit: usize,
        _filters: &SearchFilters,
    ) -> Result<Vec<KeywordHit>> {
        Err(Error::BackendUnavailable {
            backend: "keyword",
            message: "index offline".to_string(),
        })
    }
}

struct CannedVector(Vec<VectorHit>);

#[async_trait]
impl VectorBackend for CannedVector {
    async fn upsert(&self, _files: &[ScannedFile]) -> Result<BatchOutcome> {
        Ok(BatchOutcome::default())
    }
    async fn delete(&self, _ids: &[DocId]) -> Result<usize> {
        Ok(0)
    }
    async fn query(
        &self,
        _text: &str,
        _limit: usize,
        _filters: &SearchFilters,
    ) -> Result<Vec<VectorHit>> {
        Ok(self.0.clone())
    }
}

struct SlowVector(Duration);

#[async_trait]
impl VectorBackend for SlowVector {
    async fn upsert(&self, _files: &[ScannedFile]) -> Result<BatchOutcome> {
        Ok(BatchOutcome::default())
    }
    async fn delete(&self, _ids: &[DocId]) -> Result<usize> {
        Ok(0)
    }
    async fn query(
        &self,
        _text: &str,
        _limit: usize,
        _filters: &SearchFilters,
    ) -> Result<Vec<VectorHit>> {
        tokio::time::sleep(self.0).await;
        Ok(vec![])
    }
}

struct FailingVector;

#[async_trait]
impl VectorBackend for FailingVector {
    async fn upsert(&self, _files: &[ScannedFile]) -> Result<BatchOutcome> {
        Ok(BatchOutcome::default())
    }
    async fn delete(&self, _ids: &[DocId]) -> Result<usize> {
        Ok(0)
    }
    async fn query(
        &self,
        _text: &str,
        _limit: usize,
        _filters: &SearchFilters,
    ) -> Result<Vec<VectorHit>> {
        Err(Error::BackendUnavailable {
            backend: "vector",
            message: "table missing".to_string(),
        })
    }
}

fn keyword_hit(id: &str, rel_path: &str, score: f32) -> KeywordHit {
    KeywordHit {
        doc_id: DocId::new(id.to_string()),
        score,
        snippet: None,
        rel_path: rel_path.to_string(),
        repo: "demo".to_string(),
    }
}

fn vector_hit(id: &str, rel_path: &str, score: f32) -> VectorHit {
    VectorHit {
        doc_id: DocId::new(id.to_string()),
        seq: 0,
        score,
        text: "body".to_string(),
        rel_path: rel_path.to_string(),
        repo: "demo".to_string(),
    }
}

#[tokio::test]
async fn healthy_backends_fuse_without_degradation() {
    let engine = HybridSearchEngine::new(
        Arc::new(CannedKeyword(vec![
            keyword_hit("doc-a", "a.rs", 0.9),
            keyword_hit("doc-b", "b.rs", 0.5),
        ])),
        Arc::new(CannedVector(vec![vector_hit("doc-b", "b.rs", 0.8)])),
        FusionSettings::default(),
    );

    let response = engine
        .search("query", 5, &SearchFilters::default())
        .await
        .unwrap();

    assert!(!response.degraded);
    assert!(response.keyword_ms.is_some());
    assert!(response.vector_ms.is_some());
    assert_eq!(response.results.len(), 2);
}

#[tokio::test]
async fn keyword_failure_degrades_to_vector_only() {
    let engine = HybridSearchEngine::new(
        Arc::new(FailingKeyword),
        Arc::new(CannedVector(vec![
            vector_hit("doc-a", "a.rs", 0.9),
            vector_hit("doc-b", "b.rs", 0.4),
        ])),
        FusionSettings::default(),
    );

    let response = engine
        .search("query", 5, &SearchFilters::default())
        .await
        .unwrap();

    assert!(response.degraded);
    assert!(response.keyword_ms.is_none());
    assert!(response.vector_ms.is_some());
    assert_eq!(response.results.len(), 2);
    // With the keyword weight dropped out, the vector subscore is the score.
    assert!((response.results[0].score - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn slow_backend_times_out_and_degrades() {
    let settings = FusionSettings {
        timeout_ms: 20,
        ..FusionSettings::default()
    };
    let engine = HybridSearchEngine::new(
        Arc::new(CannedKeyword(vec![keyword_hit("doc-a", "a.rs", 1.0)])),
        Arc::new(SlowVector(Duration::from_millis(500))),
        settings,
    );

    let response = engine
        .search("query", 5, &SearchFilters::default())
        .await
        .unwrap();

    assert!(response.degraded);
    assert!(response.vector_ms.is_none());
    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].doc_id.as_str(), "doc-a");
}

#[tokio::test]
async fn both_backends_failing_is_an_error() {
    let engine = HybridSearchEngine::new(
        Arc::new(FailingKeyword),
        Arc::new(FailingVector),
        FusionSettings::default(),
    );

    let err = engine
        .search("query", 5, &SearchFilters::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::BackendUnavailable { .. }));
}
