//! Crease CLI - ask questions about IPL players from a folder of PDFs
//!
//! # Commands
//!
//! ```bash
//! # Build (or reuse) the index for the corpus in ./data
//! crease index
//!
//! # Ask one question
//! crease ask "How many wickets did Jasprit Bumrah take in 2020?"
//!
//! # Interactive session
//! crease chat
//!
//! # Show the raw retrieval results for a query
//! crease search "Mumbai Indians captain" -k 5
//!
//! # List the documents and their metadata
//! crease docs
//!
//! # Inspect how one file is chunked
//! crease chunk data/Virat_Kohli.pdf
//! ```
//!
//! Every setting can also come from a `CREASE_*` environment variable, e.g.
//! `CREASE_EMBEDDING_MODEL=hash crease ask "..."` runs fully offline apart
//! from the generation server.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use crease_lib::{
    chunk::{Chunker, WindowChunker},
    config::{
        DEFAULT_CHUNK_MAX_CHARS, DEFAULT_CHUNK_OVERLAP_CHARS, DEFAULT_CONTEXT_CHARS, DEFAULT_CORPUS_DIR,
        DEFAULT_EMBEDDING_MODEL, DEFAULT_GENERATION_MODEL, DEFAULT_GENERATION_URL, DEFAULT_INDEX_DIR,
        DEFAULT_MAX_TOKENS, DEFAULT_METADATA_FILE, DEFAULT_TEMPERATURE, DEFAULT_TOP_K,
    },
    document::CorpusLoader,
    embed::{Embedder, FastEmbedder, HashEmbedder, HASH_MODEL_NAME},
    index::{RetrievalResult, VectorIndex},
    retrieve::Retriever,
    Answer, BuildOutcome, Config, Crease, IndexBuilder, Models, OllamaGenerator,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "crease")]
#[command(about = "Question answering over a corpus of cricket player PDFs")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Settings {
    /// Directory holding the player PDFs
    #[arg(long, global = true, env = "CREASE_CORPUS_DIR", default_value = DEFAULT_CORPUS_DIR)]
    corpus_dir: PathBuf,

    /// Directory the index is persisted in
    #[arg(long, global = true, env = "CREASE_INDEX_DIR", default_value = DEFAULT_INDEX_DIR)]
    index_dir: PathBuf,

    /// Sidecar metadata file, relative to the corpus directory
    #[arg(long, global = true, env = "CREASE_METADATA_FILE", default_value = DEFAULT_METADATA_FILE)]
    metadata_file: String,

    /// Embedding model code, or "hash" for the offline hashing embedder
    #[arg(long, global = true, env = "CREASE_EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    /// Generation model name on the Ollama server
    #[arg(long, global = true, env = "CREASE_GENERATION_MODEL", default_value = DEFAULT_GENERATION_MODEL)]
    generation_model: String,

    /// Ollama server URL
    #[arg(long, global = true, env = "CREASE_GENERATION_URL", default_value = DEFAULT_GENERATION_URL)]
    generation_url: String,

    /// Chunks retrieved per question
    #[arg(long, global = true, env = "CREASE_TOP_K", default_value_t = DEFAULT_TOP_K)]
    top_k: usize,

    /// Maximum tokens generated per answer
    #[arg(long, global = true, env = "CREASE_MAX_TOKENS", default_value_t = DEFAULT_MAX_TOKENS)]
    max_tokens: usize,

    /// Sampling temperature
    #[arg(long, global = true, env = "CREASE_TEMPERATURE", default_value_t = DEFAULT_TEMPERATURE)]
    temperature: f32,

    /// Maximum characters per chunk
    #[arg(long, global = true, env = "CREASE_CHUNK_MAX_CHARS", default_value_t = DEFAULT_CHUNK_MAX_CHARS)]
    chunk_max_chars: usize,

    /// Characters shared by adjacent chunks
    #[arg(long, global = true, env = "CREASE_CHUNK_OVERLAP_CHARS", default_value_t = DEFAULT_CHUNK_OVERLAP_CHARS)]
    chunk_overlap_chars: usize,

    /// Character budget for context passed to the model
    #[arg(long, global = true, env = "CREASE_CONTEXT_CHARS", default_value_t = DEFAULT_CONTEXT_CHARS)]
    context_chars: usize,

    /// Drop retrieved chunks scoring below this cosine similarity before answering
    #[arg(long, global = true, env = "CREASE_MIN_SCORE")]
    min_score: Option<f32>,
}

impl Settings {
    fn into_config(self) -> Config {
        Config {
            embedding_model: self.embedding_model,
            generation_model: self.generation_model,
            generation_url: self.generation_url,
            corpus_dir: self.corpus_dir,
            index_dir: self.index_dir,
            metadata_file: self.metadata_file,
            top_k: self.top_k,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            chunk_max_chars: self.chunk_max_chars,
            chunk_overlap_chars: self.chunk_overlap_chars,
            context_chars: self.context_chars,
            min_score: self.min_score,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index, or reuse it if the corpus is unchanged
    Index {
        /// Rebuild even if the persisted index is current
        #[arg(short, long)]
        force: bool,
    },

    /// Answer a single question
    Ask {
        /// The question to answer
        question: String,

        /// Also print the passages the answer was grounded on
        #[arg(short, long)]
        passages: bool,
    },

    /// Answer questions read from stdin until a blank line or "exit"
    Chat,

    /// Show the chunks retrieved for a query without generating
    Search {
        /// Query to search for
        query: String,

        /// Number of results (defaults to --top-k)
        #[arg(short)]
        k: Option<usize>,
    },

    /// List the corpus documents and their metadata
    Docs,

    /// Show how a file is split into chunks
    Chunk {
        /// File to chunk
        file: PathBuf,
    },
}

fn load_embedder(config: &Config) -> Result<Box<dyn Embedder>> {
    if config.embedding_model == HASH_MODEL_NAME {
        return Ok(Box::new(HashEmbedder::default()));
    }
    println!("Loading embedding model {} (first run downloads it)...", config.embedding_model);
    Ok(Box::new(FastEmbedder::new(&config.embedding_model)?))
}

fn load_crease(config: Config) -> Result<Crease<Box<dyn Embedder>, OllamaGenerator>> {
    let config = config.validate()?;
    let embedder = load_embedder(&config)?;
    let generator = OllamaGenerator::connect(&config.generation_url, &config.generation_model)?;

    let mut crease = Crease::new(config, Models::new(embedder, generator))?;
    let outcome = crease.ensure_index_ready()?;
    report_outcome(&outcome);
    Ok(crease)
}

fn report_outcome(outcome: &BuildOutcome) {
    println!("{outcome}");
    if let BuildOutcome::Rebuilt(report) = outcome {
        for skipped in &report.skipped {
            println!("  skipped {}: {}", skipped.path.display(), skipped.reason);
        }
    }
}

fn print_answer(answer: &Answer, show_passages: bool) {
    println!("\n{}\n", answer.text);
    if !answer.sources.is_empty() {
        println!("Sources:");
        for source in &answer.sources {
            println!("  - {source}");
        }
    }
    if show_passages {
        print_results(&answer.passages);
    }
}

fn print_results(results: &RetrievalResult) {
    for (i, result) in results.iter().enumerate() {
        println!(
            "\n#{} (score: {:.4}) {} page {}",
            i + 1,
            result.score,
            result.chunk.document_id,
            result.chunk.page
        );
        if let Some(label) = &result.chunk.label {
            println!("{label}");
        }
        println!("---");
        let preview: String = result.chunk.text.chars().take(300).collect();
        let ellipsis = if result.chunk.text.chars().count() > 300 { "..." } else { "" };
        println!("{preview}{ellipsis}");
    }
}

fn chat(crease: &mut Crease<Box<dyn Embedder>, OllamaGenerator>) -> Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("\n> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let question = line?;
        let question = question.trim();
        if question.is_empty() || question.eq_ignore_ascii_case("exit") {
            break;
        }

        match crease.ask(question) {
            Ok(answer) => print_answer(&answer, false),
            Err(e) => eprintln!("error: {e}"),
        }
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.settings.into_config();

    match cli.command {
        Commands::Index { force } => {
            let config = config.validate()?;
            let mut embedder = load_embedder(&config)?;
            let builder = IndexBuilder::from_config(&config)?;

            let (index, outcome) = if force {
                builder.rebuild(&mut embedder)?
            } else {
                builder.ensure(&mut embedder)?
            };
            report_outcome(&outcome);
            println!(
                "Index at {} holds {} chunks ({} dims)",
                builder.index_dir().display(),
                index.len(),
                index.dimension()
            );
        }

        Commands::Ask { question, passages } => {
            let mut crease = load_crease(config)?;
            let answer = crease.ask(&question)?;
            print_answer(&answer, passages);
        }

        Commands::Chat => {
            let mut crease = load_crease(config)?;
            println!("Ask about any player in the corpus. Blank line or \"exit\" quits.");
            chat(&mut crease)?;
        }

        Commands::Search { query, k } => {
            let config = config.validate()?;
            let mut embedder = load_embedder(&config)?;
            let (index, outcome) = IndexBuilder::from_config(&config)?.ensure(&mut embedder)?;
            info!("{outcome}");

            let k = k.unwrap_or(config.top_k);
            println!("Searching: '{query}' (k={k})");
            let results = Retriever::new(&mut embedder, &index).retrieve(&query, k)?;
            print_results(&results);
        }

        Commands::Docs => {
            let loader = CorpusLoader::new(&config.corpus_dir).with_metadata_file(&config.metadata_file);
            let mut documents = loader.documents()?;

            let mut count = 0;
            for document in documents.by_ref() {
                count += 1;
                let pages = document.page_at(document.raw_text.chars().count());
                println!(
                    "{} ({} pages, {} chars)",
                    document.id,
                    pages,
                    document.raw_text.chars().count()
                );
                for (key, value) in &document.metadata {
                    println!("    {key}: {value}");
                }
            }
            for skipped in documents.skipped() {
                println!("skipped {}: {}", skipped.path.display(), skipped.reason);
            }
            println!("{count} documents in {}", loader.root().display());
        }

        Commands::Chunk { file } => {
            let chunker = WindowChunker::new(config.chunk_max_chars, config.chunk_overlap_chars)?;
            let loader = CorpusLoader::new(&config.corpus_dir).without_metadata();
            let document = loader
                .load_file(&file)
                .with_context(|| format!("failed to load {}", file.display()))?;
            let chunks = chunker.chunk(&document);

            println!(
                "Chunked '{}' into {} chunks using {} (max {}, overlap {}):\n",
                document.id,
                chunks.len(),
                chunker.name(),
                chunker.max_chars(),
                chunker.overlap_chars()
            );
            for chunk in &chunks {
                let len = chunk.text.chars().count();
                println!(
                    "--- {} ({len} chars, offset {}, page {}) ---",
                    chunk.id, chunk.char_offset, chunk.page
                );
                let preview: String = chunk.text.chars().take(200).collect();
                println!("{}{}\n", preview, if len > 200 { "..." } else { "" });
            }
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flag_defaults_match_library_defaults() {
        let cli = Cli::try_parse_from(["crease", "docs"]).unwrap();
        let defaults = Config::default();
        let config = cli.settings.into_config();

        // environment overrides would make this comparison meaningless
        if std::env::vars().any(|(k, _)| k.starts_with("CREASE_")) {
            return;
        }
        assert_eq!(config, defaults);
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::try_parse_from(["crease", "ask", "who?", "--top-k", "7", "--min-score", "0.25"]).unwrap();
        let config = cli.settings.into_config();
        assert_eq!(config.top_k, 7);
        assert_eq!(config.min_score, Some(0.25));
    }
}
