use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use repodex_core::config::{IndexingSettings, RepoSpec};
use repodex_core::traits::{KeywordBackend, SearchFilters, VectorBackend};
use repodex_core::types::{BatchOutcome, DocId, KeywordHit, ScannedFile, VectorHit};
use repodex_core::{ErrorKind, Result};
use repodex_hybrid::IndexingPipeline;
use repodex_scan::JsonFingerprintStore;

/// In-memory backend that records upserted documents and can be told to
/// reject specific relative paths.
#[derive(Default)]
struct FakeBackend {
    docs: Mutex<BTreeMap<DocId, String>>,
    reject: Mutex<HashSet<String>>,
}

impl FakeBackend {
    fn contains(&self, id: &DocId) -> bool {
        self.docs.lock().unwrap().contains_key(id)
    }

    fn len(&self) -> usize {
        self.docs.lock().unwrap().len()
    }

    fn content_of(&self, id: &DocId) -> Option<String> {
        self.docs.lock().unwrap().get(id).cloned()
    }

    fn reject_path(&self, rel_path: &str) {
        self.reject.lock().unwrap().insert(rel_path.to_string());
    }

    fn clear_rejections(&self) {
        self.reject.lock().unwrap().clear();
    }

    fn apply_upsert(&self, files: &[ScannedFile]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for file in files {
            if self.reject.lock().unwrap().contains(&file.rel_path) {
                outcome
                    .failed
                    .push((file.doc_id.clone(), "rejected".to_string()));
            } else {
                self.docs
                    .lock()
                    .unwrap()
                    .insert(file.doc_id.clone(), file.content.clone());
                outcome.succeeded.push(file.doc_id.clone());
            }
        }
        outcome
    }

    fn apply_delete(&self, ids: &[DocId]) -> usize {
        let mut docs = self.docs.lock().unwrap();
        ids.iter().filter(|id| docs.remove(id).is_some()).count()
    }
}

#[async_trait]
impl KeywordBackend for FakeBackend {
    async fn upsert(&self, files: &[ScannedFile]) -> Result<BatchOutcome> {
        Ok(self.apply_upsert(files))
    }
    async fn delete(&self, ids: &[DocId]) -> Result<usize> {
        Ok(self.apply_delete(ids))
    }
    async fn query(
        &self,
        _text: &str,
        _limit: usize,
        _filters: &SearchFilters,
    ) -> Result<Vec<KeywordHit>> {
        Ok(vec![])
    }
}

#[async_trait]
impl VectorBackend for FakeBackend {
    async fn upsert(&self, files: &[ScannedFile]) -> Result<BatchOutcome> {
        Ok(self.apply_upsert(files))
    }
    async fn delete(&self, ids: &[DocId]) -> Result<usize> {
        Ok(self.apply_delete(ids))
    }
    async fn query(
        &self,
        _text: &str,
        _limit: usize,
        _filters: &SearchFilters,
    ) -> Result<Vec<VectorHit>> {
        Ok(vec![])
    }
}

fn spec(name: &str, root: &Path) -> RepoSpec {
    RepoSpec {
        name: name.to_string(),
        root: root.to_string_lossy().into_owned(),
        include: vec![],
        exclude: vec![],
        max_file_size: 1_048_576,
        skip_binary: true,
    }
}

fn settings() -> IndexingSettings {
    IndexingSettings {
        batch_size: 8,
        max_retries: 1,
        retry_backoff_ms: 1,
        max_concurrent_repos: 2,
    }
}

struct Fixture {
    _state: TempDir,
    keyword: Arc<FakeBackend>,
    vector: Arc<FakeBackend>,
    pipeline: IndexingPipeline,
}

fn fixture() -> Fixture {
    let state = TempDir::new().unwrap();
    let keyword = Arc::new(FakeBackend::default());
    let vector = Arc::new(FakeBackend::default());
    let store = Arc::new(JsonFingerprintStore::new(state.path()).unwrap());
    let pipeline = IndexingPipeline::new(
        keyword.clone(),
        vector.clone(),
        store,
        settings(),
    );
    Fixture {
        _state: state,
        keyword,
        vector,
        pipeline,
    }
}

#[tokio::test]
async fn first_pass_indexes_everything() {
    let repo = TempDir::new().unwrap();
    fs::write(repo.path().join("alpha.rs"), "fn alpha() {}").unwrap();
    fs::write(repo.path().join("beta.rs"), "fn beta() {}").unwrap();
    let fx = fixture();

    let report = fx.pipeline.index_repo(&spec("demo", repo.path())).await.unwrap();

    assert_eq!(report.added, 2);
    assert_eq!(report.upserted, 2);
    assert_eq!(report.error_count(), 0);
    assert_eq!(fx.keyword.len(), 2);
    assert_eq!(fx.vector.len(), 2);
}

#[tokio::test]
async fn second_pass_is_a_noop() {
    let repo = TempDir::new().unwrap();
    fs::write(repo.path().join("alpha.rs"), "fn alpha() {}").unwrap();
    let fx = fixture();
    let repo_spec = spec("demo", repo.path());

    fx.pipeline.index_repo(&repo_spec).await.unwrap();
    let second = fx.pipeline.index_repo(&repo_spec).await.unwrap();

    assert_eq!(second.added, 0);
    assert_eq!(second.modified, 0);
    assert_eq!(second.unchanged, 1);
    assert_eq!(second.upserted, 0);
}

#[tokio::test]
async fn modification_reindexes_only_the_changed_file() {
    let repo = TempDir::new().unwrap();
    fs::write(repo.path().join("alpha.rs"), "fn alpha() {}").unwrap();
    fs::write(repo.path().join("beta.rs"), "fn beta() {}").unwrap();
    let fx = fixture();
    let repo_spec = spec("demo", repo.path());

    fx.pipeline.index_repo(&repo_spec).await.unwrap();
    fs::write(repo.path().join("alpha.rs"), "fn alpha_v2() {}").unwrap();
    let report = fx.pipeline.index_repo(&repo_spec).await.unwrap();

    assert_eq!(report.modified, 1);
    assert_eq!(report.unchanged, 1);
    assert_eq!(report.upserted, 1);

    let updated = fx
        .keyword
        .docs
        .lock()
        .unwrap()
        .values()
        .any(|c| c.contains("alpha_v2"));
    assert!(updated);
}

#[tokio::test]
async fn deletion_propagates_to_both_backends() {
    let repo = TempDir::new().unwrap();
    fs::write(repo.path().join("alpha.rs"), "fn alpha() {}").unwrap();
    fs::write(repo.path().join("beta.rs"), "fn beta() {}").unwrap();
    let fx = fixture();
    let repo_spec = spec("demo", repo.path());

    fx.pipeline.index_repo(&repo_spec).await.unwrap();
    fs::remove_file(repo.path().join("alpha.rs")).unwrap();
    let report = fx.pipeline.index_repo(&repo_spec).await.unwrap();

    assert_eq!(report.deleted, 1);
    assert_eq!(report.removed, 1);
    assert_eq!(fx.keyword.len(), 1);
    assert_eq!(fx.vector.len(), 1);

    // Fingerprint removed too: the next pass sees a clean repo.
    let third = fx.pipeline.index_repo(&repo_spec).await.unwrap();
    assert_eq!(third.deleted, 0);
    assert_eq!(third.unchanged, 1);
}

#[tokio::test]
async fn fingerprint_committed_only_on_dual_success() {
    let repo = TempDir::new().unwrap();
    fs::write(repo.path().join("good.rs"), "fn good() {}").unwrap();
    fs::write(repo.path().join("poison.rs"), "fn poison() {}").unwrap();
    let fx = fixture();
    let repo_spec = spec("demo", repo.path());

    fx.vector.reject_path("poison.rs");
    let first = fx.pipeline.index_repo(&repo_spec).await.unwrap();

    assert_eq!(first.added, 2);
    assert_eq!(first.upserted, 1);
    assert_eq!(
        first.errors.get(&ErrorKind::PartialBatch).copied(),
        Some(1)
    );
    // Keyword accepted it, but without the vector side there is no
    // fingerprint, so it stays pending.
    assert_eq!(fx.keyword.len(), 2);
    assert_eq!(fx.vector.len(), 1);

    fx.vector.clear_rejections();
    let second = fx.pipeline.index_repo(&repo_spec).await.unwrap();

    assert_eq!(second.added, 1);
    assert_eq!(second.unchanged, 1);
    assert_eq!(second.upserted, 1);
    assert_eq!(fx.vector.len(), 2);
}

#[tokio::test]
async fn index_all_reports_per_repository() {
    let repo_a = TempDir::new().unwrap();
    let repo_b = TempDir::new().unwrap();
    fs::write(repo_a.path().join("a.rs"), "fn a() {}").unwrap();
    fs::write(repo_b.path().join("b.rs"), "fn b() {}").unwrap();
    fs::write(repo_b.path().join("c.rs"), "fn c() {}").unwrap();
    let fx = fixture();

    let specs = vec![spec("alpha", repo_a.path()), spec("beta", repo_b.path())];
    let mut reports = fx.pipeline.index_all(&specs).await;
    reports.sort_by(|a, b| a.repo.cmp(&b.repo));

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].repo, "alpha");
    assert_eq!(reports[0].upserted, 1);
    assert_eq!(reports[1].repo, "beta");
    assert_eq!(reports[1].upserted, 2);
    assert_eq!(fx.keyword.len(), 3);

    let shared_id = fx.keyword.docs.lock().unwrap().keys().next().cloned().unwrap();
    assert!(fx.vector.contains(&shared_id));
    assert!(fx.keyword.content_of(&shared_id).is_some());
}
