//! Concurrent dual-backend query with graceful degradation.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

use repodex_core::config::FusionSettings;
use repodex_core::traits::{KeywordBackend, SearchFilters, VectorBackend};
use repodex_core::types::SearchResponse;
use repodex_core::{Error, Result};

use crate::fusion;

pub struct HybridSearchEngine {
    keyword: Arc<dyn KeywordBackend>,
    vector: Arc<dyn VectorBackend>,
    settings: FusionSettings,
}

impl HybridSearchEngine {
    pub fn new(
        keyword: Arc<dyn KeywordBackend>,
        vector: Arc<dyn VectorBackend>,
        settings: FusionSettings,
    ) -> Self {
        Self {
            keyword,
            vector,
            settings,
        }
    }

    /// Query both backends in parallel and fuse.
    ///
    /// End-to-end latency is bounded by the slower backend, capped by the
    /// configured timeout. One failing or timed-out backend degrades the
    /// response (flagged) instead of failing it; only both backends
    /// failing surfaces as an error. Dropping the returned future cancels
    /// both in-flight backend calls.
    pub async fn search(
        &self,
        text: &str,
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<SearchResponse> {
        let fetch = limit.saturating_mul(self.settings.overfetch_factor.max(1));
        let budget = Duration::from_millis(self.settings.timeout_ms);

        let keyword_branch = async {
            let started = Instant::now();
            match timeout(budget, self.keyword.query(text, fetch, filters)).await {
                Ok(Ok(hits)) => (Some(hits), Some(elapsed_ms(started))),
                Ok(Err(e)) => {
                    warn!(error = %e, "keyword backend failed; degrading");
                    (None, None)
                }
                Err(_) => {
                    warn!(timeout_ms = self.settings.timeout_ms, "keyword backend timed out");
                    (None, None)
                }
            }
        };
        let vector_branch = async {
            let started = Instant::now();
            match timeout(budget, self.vector.query(text, fetch, filters)).await {
                Ok(Ok(hits)) => (Some(hits), Some(elapsed_ms(started))),
                Ok(Err(e)) => {
                    warn!(error = %e, "vector backend failed; degrading");
                    (None, None)
                }
                Err(_) => {
                    warn!(timeout_ms = self.settings.timeout_ms, "vector backend timed out");
                    (None, None)
                }
            }
        };
        let ((keyword_hits, keyword_ms), (vector_hits, vector_ms)) =
            tokio::join!(keyword_branch, vector_branch);

        if keyword_hits.is_none() && vector_hits.is_none() {
            return Err(Error::BackendUnavailable {
                backend: "keyword+vector",
                message: "both backends failed or timed out".to_string(),
            });
        }
        let degraded = keyword_hits.is_none() || vector_hits.is_none();
        let results = fusion::fuse(keyword_hits, vector_hits, &self.settings, limit);
        debug!(
            results = results.len(),
            degraded,
            ?keyword_ms,
            ?vector_ms,
            "search fused"
        );
        Ok(SearchResponse {
            results,
            degraded,
            keyword_ms,
            vector_ms,
        })
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
