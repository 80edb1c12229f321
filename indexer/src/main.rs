use anyhow::{Context, Result};
use archive_core::page_store::page_number_of;
use archive_core::{Analyzer, IndexBuilder, QueryEngine, Ranking, SearchOptions, Store, StoryExtractor};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Maintain the story database and its search table", long_about = None)]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true, default_value = "ithappens.sqlite")]
    db: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clear the search table and index every stored story
    Rebuild,
    /// Search stored stories
    Search {
        /// Query words
        #[arg(required = true)]
        words: Vec<String>,
        /// Stem query words the same way indexed text is stemmed
        #[arg(long, default_value_t = false)]
        stem: bool,
        /// Order by summed word count instead of newest story
        #[arg(long, default_value_t = false)]
        by_score: bool,
        /// Print results as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Extract and store every cached page found under a directory
    Import {
        /// Page cache directory
        #[arg(long, default_value = "saved")]
        root: PathBuf,
    },
}

#[derive(Serialize)]
struct Hit {
    story_id: i64,
    score: u64,
    title: String,
    timestamp: i64,
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    let cli = Cli::parse();
    let store = Store::open(&cli.db).with_context(|| format!("opening {}", cli.db.display()))?;
    let analyzer = Analyzer::new();

    match cli.command {
        Commands::Rebuild => {
            let stats = IndexBuilder::new(&store, &analyzer).rebuild(store.all())?;
            println!("indexed {} stories, {} rows", stats.documents, stats.entries);
            Ok(())
        }
        Commands::Search { words, stem, by_score, json } => {
            let opts = SearchOptions {
                stem_query: stem,
                ranking: if by_score { Ranking::ScoreDesc } else { Ranking::DocumentDesc },
            };
            search(&store, &analyzer, &words.join(" "), opts, json)
        }
        Commands::Import { root } => import(&store, &root),
    }
}

fn search(store: &Store, analyzer: &Analyzer, query: &str, opts: SearchOptions, json: bool) -> Result<()> {
    let hits = QueryEngine::new(store, analyzer).search_with(query, opts)?;
    let mut out = Vec::with_capacity(hits.len());
    for hit in hits {
        let story = store.get(hit.document)?;
        out.push(Hit {
            story_id: hit.document,
            score: hit.score,
            title: story.as_ref().map(|s| s.title.clone()).unwrap_or_default(),
            timestamp: story.map(|s| s.timestamp).unwrap_or_default(),
        });
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        for h in &out {
            println!("{}\t{}\t{}", h.story_id, h.score, h.title);
        }
    }
    Ok(())
}

fn import(store: &Store, root: &Path) -> Result<()> {
    let extractor = StoryExtractor::new();
    let mut files: Vec<(u32, PathBuf)> = WalkDir::new(root)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| page_number_of(e.path()).map(|n| (n, e.path().to_path_buf())))
        .collect();
    files.sort_by(|a, b| b.0.cmp(&a.0));
    info!(pages = files.len(), root = %root.display(), "importing cached pages");

    let (mut pages, mut inserted) = (0usize, 0usize);
    for (page, path) in files {
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(error) => {
                warn!(page, %error, "cannot read cached page");
                continue;
            }
        };
        let stories = extractor.extract(&bytes);
        inserted += store.insert_all(&stories)?;
        pages += 1;
    }
    println!("imported {pages} pages, {inserted} new stories");
    Ok(())
}
