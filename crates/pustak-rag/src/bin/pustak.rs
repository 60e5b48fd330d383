//! CLI entry points for the build and query sides of the engine.
//!
//! Backends are picked from the environment: GEMINI_API_KEY, GROQ_API_KEY,
//! and HF_API_TOKEN enable the corresponding remote adapters; with no key at
//! all, indexing falls back to the deterministic offline embedder and `ask`
//! refuses to run (there is nothing to generate with).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use tracing_subscriber::EnvFilter;

use pustak_rag::embeddings::{
    EmbeddingBackend, EmbeddingProvider, FallbackEmbedder, HashedNgramEmbedder, RemoteEmbedder,
};
use pustak_rag::llm::{ApiProvider, FallbackGenerator, GenerationBackend, RemoteProvider};
use pustak_rag::{IndexBuilder, RagConfig, RagEngine};

const USAGE: &str = "\
pustak — retrieval-augmented QA over a folder of books

Usage:
  pustak build <folder> [--chunk-size N] [--overlap N] [--data-dir DIR]
  pustak ask <question> [--k N] [--source PREFIX] [--data-dir DIR]

Ask also understands the direct command `calc: <expression>`.
";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    if let Err(e) = run().await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("build") => build(&args[1..]).await,
        Some("ask") => ask(&args[1..]).await,
        _ => {
            eprint!("{USAGE}");
            std::process::exit(2);
        }
    }
}

async fn build(args: &[String]) -> anyhow::Result<()> {
    let folder = PathBuf::from(
        args.first()
            .ok_or_else(|| anyhow!("build needs a source folder"))?,
    );

    let mut config = RagConfig::default();
    if let Some(dir) = flag_value(args, "--data-dir") {
        config.data_dir = PathBuf::from(dir);
    }
    if let Some(size) = flag_value(args, "--chunk-size") {
        config.chunking.chunk_size = size.parse().context("--chunk-size must be an integer")?;
    }
    if let Some(overlap) = flag_value(args, "--overlap") {
        config.chunking.chunk_overlap = overlap.parse().context("--overlap must be an integer")?;
    }

    let builder = IndexBuilder::new(&config, embedder_from_env())?;
    let report = builder.build(&folder).await?;
    println!(
        "indexed {} chunks from {} documents (dimension {}) into {}",
        report.chunks,
        report.documents,
        report.dimension,
        config.data_dir.display()
    );
    Ok(())
}

async fn ask(args: &[String]) -> anyhow::Result<()> {
    let question = args
        .first()
        .ok_or_else(|| anyhow!("ask needs a question"))?;

    let mut config = RagConfig::default();
    if let Some(dir) = flag_value(args, "--data-dir") {
        config.data_dir = PathBuf::from(dir);
    }
    let k = match flag_value(args, "--k") {
        Some(k) => k.parse().context("--k must be an integer")?,
        None => config.retrieval.default_k,
    };
    let source_filter = flag_value(args, "--source").unwrap_or_else(|| "All".to_string());

    let engine = RagEngine::open(config, embedder_from_env(), generator_from_env()?)?;
    let (answer, contexts) = engine.answer_query(question, k, &source_filter).await?;

    println!("{answer}");
    if !contexts.is_empty() {
        println!("\nSources:");
        for chunk in &contexts {
            println!("- {} (page {})", chunk.source, chunk.page);
        }
    }
    Ok(())
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

/// Remote embedding adapters when keys are present, ordered by preference,
/// with the offline hashed embedder as the last link. The whole chain shares
/// one dimension so a fallback cannot disagree with the built index.
fn embedder_from_env() -> Arc<dyn EmbeddingBackend> {
    let mut backends: Vec<Box<dyn EmbeddingBackend>> = Vec::new();
    let remote_present =
        std::env::var("GEMINI_API_KEY").is_ok() || std::env::var("HF_API_TOKEN").is_ok();
    let dimension = if remote_present { 768 } else { 384 };

    if let Ok(key) = std::env::var("GEMINI_API_KEY") {
        if let Ok(backend) = RemoteEmbedder::new(
            EmbeddingProvider::Google {
                model: "text-embedding-004".to_string(),
            },
            key,
            dimension,
        ) {
            backends.push(Box::new(backend));
        }
    }
    if let Ok(token) = std::env::var("HF_API_TOKEN") {
        if let Ok(backend) = RemoteEmbedder::new(
            EmbeddingProvider::HuggingFace {
                model_id: "intfloat/multilingual-e5-base".to_string(),
            },
            token,
            dimension,
        ) {
            backends.push(Box::new(backend));
        }
    }
    backends.push(Box::new(HashedNgramEmbedder::new(dimension)));

    // The chain is non-empty and single-dimension, so this cannot fail.
    match FallbackEmbedder::new(backends) {
        Ok(chain) => Arc::new(chain),
        Err(_) => Arc::new(HashedNgramEmbedder::new(dimension)),
    }
}

fn generator_from_env() -> anyhow::Result<Arc<dyn GenerationBackend>> {
    let mut providers: Vec<Box<dyn GenerationBackend>> = Vec::new();

    if let Ok(key) = std::env::var("GEMINI_API_KEY") {
        providers.push(Box::new(RemoteProvider::new(
            ApiProvider::Google,
            key,
            "gemini-1.5-flash".to_string(),
        )?));
    }
    if let Ok(key) = std::env::var("GROQ_API_KEY") {
        providers.push(Box::new(RemoteProvider::new(
            ApiProvider::Groq,
            key,
            "llama-3.1-8b-instant".to_string(),
        )?));
    }
    if let Ok(token) = std::env::var("HF_API_TOKEN") {
        providers.push(Box::new(RemoteProvider::new(
            ApiProvider::HuggingFace {
                model_id: "google/flan-t5-small".to_string(),
            },
            token,
            "google/flan-t5-small".to_string(),
        )?));
    }

    if providers.is_empty() {
        bail!("no generation backend configured; set GEMINI_API_KEY, GROQ_API_KEY or HF_API_TOKEN");
    }
    Ok(Arc::new(FallbackGenerator::new(providers)?))
}
