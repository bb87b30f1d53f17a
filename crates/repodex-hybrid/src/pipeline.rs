//! Incremental indexing across both backends.
//!
//! A pass scans a repository, classifies files against the persisted
//! fingerprints, upserts added/modified files into both backends in
//! bounded batches and removes deleted identities from both. A
//! fingerprint is committed only once BOTH backends accepted the
//! document, so a crash mid-pass re-indexes at most the uncommitted
//! tail on the next run instead of leaving the stores out of sync.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::{stream, StreamExt};
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use repodex_core::config::{IndexingSettings, RepoSpec};
use repodex_core::traits::{FingerprintStore, KeywordBackend, VectorBackend};
use repodex_core::types::{BatchOutcome, DocId, FingerprintEntry, ScannedFile};
use repodex_core::{Error, ErrorKind, Result};
use repodex_scan::{detect, RepoScanner};

/// Counters for one repository pass.
#[derive(Debug, Clone, Serialize)]
pub struct IndexReport {
    pub repo: String,
    pub added: usize,
    pub modified: usize,
    pub unchanged: usize,
    pub deleted: usize,
    /// Documents committed to both backends this pass.
    pub upserted: usize,
    /// Identities removed from both backends this pass.
    pub removed: usize,
    pub errors: BTreeMap<ErrorKind, usize>,
}

impl IndexReport {
    pub fn new(repo: &str) -> Self {
        Self {
            repo: repo.to_string(),
            added: 0,
            modified: 0,
            unchanged: 0,
            deleted: 0,
            upserted: 0,
            removed: 0,
            errors: BTreeMap::new(),
        }
    }

    pub fn tally(&mut self, error: &Error) {
        *self.errors.entry(error.kind()).or_insert(0) += 1;
    }

    pub fn error_count(&self) -> usize {
        self.errors.values().sum()
    }
}

pub struct IndexingPipeline {
    keyword: Arc<dyn KeywordBackend>,
    vector: Arc<dyn VectorBackend>,
    store: Arc<dyn FingerprintStore>,
    settings: IndexingSettings,
}

impl IndexingPipeline {
    pub fn new(
        keyword: Arc<dyn KeywordBackend>,
        vector: Arc<dyn VectorBackend>,
        store: Arc<dyn FingerprintStore>,
        settings: IndexingSettings,
    ) -> Self {
        Self {
            keyword,
            vector,
            settings,
            store,
        }
    }

    /// Run one incremental pass over a single repository.
    pub async fn index_repo(&self, spec: &RepoSpec) -> Result<IndexReport> {
        let mut report = IndexReport::new(&spec.name);

        let scanner = RepoScanner::new(spec)?;
        let mut files = Vec::new();
        for item in scanner.scan() {
            match item {
                Ok(file) => files.push(file),
                Err(e) => {
                    warn!(repo = %spec.name, error = %e, "skipping unreadable entry");
                    report.tally(&e);
                }
            }
        }

        let prior = self.store.load_all(&spec.name)?;
        let changes = detect(files, &prior);
        report.added = changes.added.len();
        report.modified = changes.modified.len();
        report.unchanged = changes.unchanged;
        report.deleted = changes.deleted.len();
        debug!(
            repo = %spec.name,
            added = report.added,
            modified = report.modified,
            unchanged = report.unchanged,
            deleted = report.deleted,
            "change detection complete"
        );

        let upserts = changes.to_upsert();
        let pass_started = Utc::now();
        let entries: HashMap<DocId, FingerprintEntry> = upserts
            .iter()
            .map(|f| {
                (
                    f.doc_id.clone(),
                    FingerprintEntry {
                        path: f.abs_path.clone(),
                        doc_id: f.doc_id.clone(),
                        fingerprint: f.fingerprint.clone(),
                        indexed_at: pass_started,
                    },
                )
            })
            .collect();

        for batch in upserts.chunks(self.settings.batch_size.max(1)) {
            let (kw, vec) = tokio::join!(
                self.upsert_with_retry(batch, |files| async move {
                    self.keyword.upsert(&files).await
                }),
                self.upsert_with_retry(batch, |files| async move {
                    self.vector.upsert(&files).await
                }),
            );

            // Fingerprints only for the intersection: a document present in
            // one backend but not the other must be retried next pass.
            let kw_ok: HashSet<DocId> = kw.succeeded.iter().cloned().collect();
            for id in &vec.succeeded {
                if !kw_ok.contains(id) {
                    continue;
                }
                if let Some(entry) = entries.get(id) {
                    self.store.upsert(&spec.name, entry)?;
                    report.upserted += 1;
                }
            }

            if !kw.failed.is_empty() || !vec.failed.is_empty() {
                let mut outcome = kw;
                outcome.merge(vec);
                for (id, reason) in &outcome.failed {
                    warn!(repo = %spec.name, doc_id = %id, reason, "document not indexed");
                }
                let partial = Error::PartialBatch { outcome };
                warn!(repo = %spec.name, error = %partial, "batch partially indexed");
                report.tally(&partial);
            }
        }

        if !changes.deleted.is_empty() {
            let ids: Vec<DocId> = changes.deleted.iter().map(|e| e.doc_id.clone()).collect();
            let (kw, vec) = tokio::join!(
                self.delete_with_retry(&ids, |ids| async move { self.keyword.delete(&ids).await }),
                self.delete_with_retry(&ids, |ids| async move { self.vector.delete(&ids).await }),
            );
            match (kw, vec) {
                (Ok(_), Ok(_)) => {
                    for entry in &changes.deleted {
                        self.store.delete(&spec.name, &entry.path)?;
                        report.removed += 1;
                    }
                }
                (kw, vec) => {
                    // Fingerprints stay, so the deletion is re-attempted on
                    // the next pass.
                    for e in [kw.err(), vec.err()].into_iter().flatten() {
                        warn!(repo = %spec.name, error = %e, "deletion pass incomplete");
                        report.tally(&e);
                    }
                }
            }
        }

        info!(
            repo = %spec.name,
            upserted = report.upserted,
            removed = report.removed,
            errors = report.error_count(),
            "indexing pass finished"
        );
        Ok(report)
    }

    /// Index every configured repository, at most `max_concurrent_repos` at
    /// a time. A repository whose pass fails outright still yields a report
    /// carrying the error tally; other repositories are unaffected.
    pub async fn index_all(&self, specs: &[RepoSpec]) -> Vec<IndexReport> {
        let concurrency = self.settings.max_concurrent_repos.max(1);
        stream::iter(specs)
            .map(|spec| async move {
                match self.index_repo(spec).await {
                    Ok(report) => report,
                    Err(e) => {
                        error!(repo = %spec.name, error = %e, "indexing pass failed");
                        let mut report = IndexReport::new(&spec.name);
                        report.tally(&e);
                        report
                    }
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await
    }

    /// Upsert a batch, retrying transient whole-batch failures with backoff
    /// and re-submitting only the failed subset of a partial batch.
    async fn upsert_with_retry<F, Fut>(&self, files: &[ScannedFile], op: F) -> BatchOutcome
    where
        F: Fn(Vec<ScannedFile>) -> Fut,
        Fut: Future<Output = Result<BatchOutcome>>,
    {
        let mut pending: Vec<ScannedFile> = files.to_vec();
        let mut succeeded = Vec::new();
        let mut attempt = 0u32;
        loop {
            match op(pending.clone()).await {
                Ok(outcome) => {
                    succeeded.extend(outcome.succeeded);
                    if outcome.failed.is_empty() {
                        return BatchOutcome {
                            succeeded,
                            failed: Vec::new(),
                        };
                    }
                    if attempt >= self.settings.max_retries {
                        return BatchOutcome {
                            succeeded,
                            failed: outcome.failed,
                        };
                    }
                    let retry: HashSet<DocId> =
                        outcome.failed.into_iter().map(|(id, _)| id).collect();
                    pending.retain(|f| retry.contains(&f.doc_id));
                }
                Err(e) if e.is_transient() && attempt < self.settings.max_retries => {
                    warn!(attempt, error = %e, "transient batch failure, retrying");
                }
                Err(e) => {
                    let failed = pending
                        .iter()
                        .map(|f| (f.doc_id.clone(), e.to_string()))
                        .collect();
                    return BatchOutcome { succeeded, failed };
                }
            }
            attempt += 1;
            sleep(self.backoff(attempt)).await;
        }
    }

    async fn delete_with_retry<F, Fut>(&self, ids: &[DocId], op: F) -> Result<usize>
    where
        F: Fn(Vec<DocId>) -> Fut,
        Fut: Future<Output = Result<usize>>,
    {
        let mut attempt = 0u32;
        loop {
            match op(ids.to_vec()).await {
                Ok(n) => return Ok(n),
                Err(e) if e.is_transient() && attempt < self.settings.max_retries => {
                    warn!(attempt, error = %e, "transient delete failure, retrying");
                    attempt += 1;
                    sleep(self.backoff(attempt)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.settings.retry_backoff_ms.saturating_mul(u64::from(attempt)))
    }
}
