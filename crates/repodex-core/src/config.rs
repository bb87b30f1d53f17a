//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `REPODEX_*`
//! env vars, plus a helper to expand `~` and `${VAR}` in user-provided
//! paths. Typed settings structs for the scanner, chunker, indexer and
//! fusion live here as well.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("REPODEX_"));

        Ok(Self { figment })
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// One repository to scan and index.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoSpec {
    pub name: String,
    pub root: String,
    /// Include globs over the `/`-separated relative path; empty = all.
    #[serde(default)]
    pub include: Vec<String>,
    /// Exclude globs; matching directories are pruned without descending.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Files above this many bytes are skipped, never truncated.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default = "default_true")]
    pub skip_binary: bool,
}

fn default_max_file_size() -> u64 {
    1_048_576
}

fn default_true() -> bool {
    true
}

/// Fixed-size overlapping windows over document text, in characters.
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkingSettings {
    #[serde(default = "default_window")]
    pub window: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

fn default_window() -> usize {
    2000
}

fn default_overlap() -> usize {
    200
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            window: default_window(),
            overlap: default_overlap(),
        }
    }
}

/// Score-fusion knobs. Weights are part of the documented combined-score
/// formula and never vary per query.
#[derive(Debug, Clone, Deserialize)]
pub struct FusionSettings {
    #[serde(default = "default_weight")]
    pub keyword_weight: f32,
    #[serde(default = "default_weight")]
    pub vector_weight: f32,
    /// Each backend is asked for `limit * overfetch_factor` candidates.
    #[serde(default = "default_overfetch")]
    pub overfetch_factor: usize,
    /// Per-backend query timeout; a timed-out branch degrades the response.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_weight() -> f32 {
    0.5
}

fn default_overfetch() -> usize {
    3
}

fn default_timeout_ms() -> u64 {
    2_000
}

impl Default for FusionSettings {
    fn default() -> Self {
        Self {
            keyword_weight: default_weight(),
            vector_weight: default_weight(),
            overfetch_factor: default_overfetch(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Batch-pipeline knobs for indexing passes.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexingSettings {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Independent repositories indexed concurrently, bounded.
    #[serde(default = "default_max_concurrent_repos")]
    pub max_concurrent_repos: usize,
}

fn default_batch_size() -> usize {
    64
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    200
}

fn default_max_concurrent_repos() -> usize {
    2
}

impl Default for IndexingSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_backoff_ms(),
            max_concurrent_repos: default_max_concurrent_repos(),
        }
    }
}
