#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! repodex-embed
//!
//! Implementations of the embedding provider boundary. The default is a
//! deterministic feature-hashing embedder: each whitespace token is hashed
//! into one of `dim` buckets and the bucket vector is L2-normalized. No
//! model weights, no I/O, stable across processes, which is exactly what
//! incremental indexing and the test suite need. Model-backed providers
//! plug in behind the same trait.

use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use repodex_core::traits::Embedder;
use repodex_core::{Error, Result};

pub const DEFAULT_DIM: usize = 256;

/// Longest span (in characters) the hash embedder accepts; longer spans are
/// a permanent failure, mirroring a real provider's token ceiling.
const MAX_SPAN_CHARS: usize = 32_768;

pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        if text.chars().count() > MAX_SPAN_CHARS {
            return Err(Error::EmbeddingFailure {
                transient: false,
                message: format!("span exceeds {MAX_SPAN_CHARS} characters"),
            });
        }
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        Ok(v)
    }
}

impl Embedder for HashEmbedder {
    fn id(&self) -> &str {
        "feature-hash-v1"
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        MAX_SPAN_CHARS
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed_one(t)).collect()
    }
}

pub fn default_embedder(dim: usize) -> Box<dyn Embedder> {
    Box::new(HashEmbedder::new(dim))
}
