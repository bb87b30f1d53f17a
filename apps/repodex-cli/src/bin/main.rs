use std::env;
use std::sync::Arc;
use std::time::Duration;

use indicatif::ProgressBar;
use tracing_subscriber::EnvFilter;

use repodex_core::config::{
    expand_path, ChunkingSettings, Config, FusionSettings, IndexingSettings, RepoSpec,
};
use repodex_core::traits::SearchFilters;
use repodex_embed::{default_embedder, DEFAULT_DIM};
use repodex_hybrid::{HybridSearchEngine, IndexingPipeline};
use repodex_scan::JsonFingerprintStore;
use repodex_text::TantivyKeywordIndex;
use repodex_vector::LanceVectorIndex;

fn usage(prog: &str) -> ! {
    eprintln!("Usage: {prog} <ingest|search> [args...]");
    eprintln!("  {prog} ingest [repo_name]");
    eprintln!("  {prog} search \"<query>\" [--repo NAME] [--type EXT] [--limit N] [--json]");
    std::process::exit(1);
}

async fn open_backends(
    config: &Config,
) -> anyhow::Result<(Arc<TantivyKeywordIndex>, Arc<LanceVectorIndex>)> {
    let keyword_dir = expand_path(
        config
            .get::<String>("index.keyword_dir")
            .unwrap_or_else(|_| "./data/keyword".to_string()),
    );
    let vector_dir = expand_path(
        config
            .get::<String>("index.vector_dir")
            .unwrap_or_else(|_| "./data/vector".to_string()),
    );
    let dim = config.get::<usize>("embedding.dim").unwrap_or(DEFAULT_DIM);
    let chunking = config
        .get::<ChunkingSettings>("chunking")
        .unwrap_or_default();

    let keyword = Arc::new(TantivyKeywordIndex::open(&keyword_dir)?);
    let vector = Arc::new(
        LanceVectorIndex::open(&vector_dir, "chunks", default_embedder(dim), chunking).await?,
    );
    Ok((keyword, vector))
}

async fn ingest(config: &Config, args: &[String]) -> anyhow::Result<()> {
    let mut specs: Vec<RepoSpec> = config
        .get("repos")
        .map_err(|e| anyhow::anyhow!("no repositories configured: {e}"))?;
    let json = args.iter().any(|a| a == "--json");
    if let Some(name) = args.iter().find(|a| !a.starts_with("--")) {
        specs.retain(|s| &s.name == name);
        if specs.is_empty() {
            anyhow::bail!("repository '{name}' not found in config");
        }
    }

    let state_dir = expand_path(
        config
            .get::<String>("index.state_dir")
            .unwrap_or_else(|_| "./data/state".to_string()),
    );
    let (keyword, vector) = open_backends(config).await?;
    let store = Arc::new(JsonFingerprintStore::new(state_dir)?);
    let settings = config
        .get::<IndexingSettings>("indexing")
        .unwrap_or_default();
    let pipeline = IndexingPipeline::new(keyword, vector, store, settings);

    let bar = ProgressBar::new_spinner();
    bar.enable_steady_tick(Duration::from_millis(100));
    bar.set_message(format!("Indexing {} repositories...", specs.len()));
    let reports = pipeline.index_all(&specs).await;
    bar.finish_and_clear();

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }
    for report in &reports {
        println!(
            "✅ {}: +{} added, ~{} modified, ={} unchanged, -{} removed ({} committed)",
            report.repo,
            report.added,
            report.modified,
            report.unchanged,
            report.removed,
            report.upserted,
        );
        for (kind, count) in &report.errors {
            eprintln!("  ⚠️  {kind:?}: {count}");
        }
    }
    Ok(())
}

async fn search(config: &Config, args: &[String]) -> anyhow::Result<()> {
    let mut query = None;
    let mut filters = SearchFilters::default();
    let mut limit = 10usize;
    let mut json = false;
    let mut it = args.iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--repo" => filters.repo = it.next().cloned(),
            "--type" => filters.file_type = it.next().cloned(),
            "--limit" => {
                limit = it
                    .next()
                    .and_then(|v| v.parse().ok())
                    .ok_or_else(|| anyhow::anyhow!("--limit expects a number"))?;
            }
            "--json" => json = true,
            other if query.is_none() => query = Some(other.to_string()),
            other => anyhow::bail!("unexpected argument: {other}"),
        }
    }
    let Some(query) = query else {
        anyhow::bail!("search needs a query string");
    };

    let (keyword, vector) = open_backends(config).await?;
    let fusion = config.get::<FusionSettings>("fusion").unwrap_or_default();
    let engine = HybridSearchEngine::new(keyword, vector, fusion);
    let response = engine.search(&query, limit, &filters).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }
    if response.degraded {
        eprintln!("⚠️  one backend did not answer; results are partial");
    }
    println!("🔍 {} results for \"{}\"", response.results.len(), query);
    for result in &response.results {
        println!(
            "\n  {}. score={:.4} (kw={:.3} vec={:.3})  {}  [{}]",
            result.rank + 1,
            result.score,
            result.keyword_score,
            result.vector_score,
            result.rel_path,
            result.repo,
        );
        if !result.snippet.is_empty() {
            println!("     📝 {}", result.snippet);
        }
    }
    if let (Some(kw), Some(vec)) = (response.keyword_ms, response.vector_ms) {
        println!("\n⏱  keyword {kw}ms, vector {vec}ms");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut args: Vec<String> = env::args().collect();
    let prog = args.remove(0);
    if args.is_empty() {
        usage(&prog);
    }
    let cmd = args.remove(0);
    let config = Config::load()?;
    match cmd.as_str() {
        "ingest" => ingest(&config, &args).await,
        "search" => search(&config, &args).await,
        _ => {
            eprintln!("Unknown command: {cmd}");
            usage(&prog);
        }
    }
}
