use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use archive_core::{ArchiveConfig, PageStore, Ranking, SearchOptions, Store};
use clap::{CommandFactory, Parser};
use crawler::{Fetcher, Mode, Orchestrator, RunPlan, Shutdown};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ithappens-grabber")]
#[command(about = "Archive ithappens.me stories from the Wayback Machine and search them")]
struct Cli {
    /// Download pages missing from the local cache
    #[arg(long)]
    download: bool,
    /// Read pages only from the local cache
    #[arg(long)]
    saved: bool,
    /// Drop the search table and rebuild it
    #[arg(long)]
    dropsearch: bool,
    /// Search stories containing these words
    #[arg(long, num_args = 1.., value_name = "WORDS")]
    search: Option<Vec<String>>,
    /// Stem query words the same way indexed text is stemmed
    #[arg(long)]
    stem_query: bool,
    /// Order results by summed word count instead of newest story
    #[arg(long)]
    by_score: bool,
    /// JSON config file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,
    /// Page cache directory
    #[arg(long)]
    root: Option<PathBuf>,
    /// SQLite database file
    #[arg(long)]
    db: Option<PathBuf>,
    #[arg(long)]
    first_page: Option<u32>,
    #[arg(long)]
    last_page: Option<u32>,
    /// Archive endpoint
    #[arg(long)]
    base_url: Option<String>,
    /// Archive snapshot id
    #[arg(long)]
    snapshot: Option<String>,
    #[arg(long)]
    site: Option<String>,
    /// Concurrent page tasks (default: CPU count)
    #[arg(long)]
    concurrency: Option<usize>,
    /// Request timeout seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

impl Cli {
    fn has_action(&self) -> bool {
        self.download || self.saved || self.dropsearch || self.search.is_some()
    }

    fn mode(&self) -> Mode {
        if self.download {
            Mode::Download
        } else if self.saved {
            Mode::Saved
        } else {
            Mode::IndexOnly
        }
    }

    fn archive_config(&self) -> Result<ArchiveConfig> {
        let mut cfg = match &self.config {
            Some(path) => ArchiveConfig::from_file(path)?,
            None => ArchiveConfig::default(),
        };
        if let Some(v) = &self.root { cfg.download_root = v.clone(); }
        if let Some(v) = &self.db { cfg.database_path = v.clone(); }
        if let Some(v) = self.first_page { cfg.first_page = v; }
        if let Some(v) = self.last_page { cfg.last_page = v; }
        if let Some(v) = &self.base_url { cfg.base_url = v.clone(); }
        if let Some(v) = &self.snapshot { cfg.snapshot = v.clone(); }
        if let Some(v) = &self.site { cfg.site = v.clone(); }
        if let Some(v) = self.concurrency { cfg.concurrency = Some(v); }
        if let Some(v) = self.timeout_secs { cfg.timeout_secs = v; }
        cfg.validate()?;
        Ok(cfg)
    }

    fn search_options(&self) -> SearchOptions {
        SearchOptions {
            stem_query: self.stem_query,
            ranking: if self.by_score { Ranking::ScoreDesc } else { Ranking::DocumentDesc },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    let cli = Cli::parse();
    if !cli.has_action() {
        Cli::command().print_help()?;
        return Ok(());
    }
    let cfg = cli.archive_config()?;

    let store = Arc::new(Store::open(&cfg.database_path)?);
    let shutdown = Shutdown::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, letting in-flight work finish");
                shutdown.trigger();
            }
        });
    }

    let orchestrator = Orchestrator::new(
        Fetcher::new(&cfg)?,
        PageStore::new(&cfg.download_root),
        Arc::clone(&store),
        cfg.workers(),
        shutdown,
    );
    let plan = RunPlan {
        pages: cfg.pages(),
        mode: cli.mode(),
        drop_search: cli.dropsearch,
        query: cli.search.as_ref().map(|words| words.join(" ")),
        search: cli.search_options(),
    };
    info!(db = %cfg.database_path.display(), root = %cfg.download_root.display(), "starting");
    let report = orchestrator.run(&plan).await?;

    if let Some(hits) = &report.hits {
        println!("{} stories found", hits.len());
        for hit in hits {
            let title = store.get(hit.document)?.map(|s| s.title).unwrap_or_default();
            println!("{}\t{}\t{}", hit.document, hit.score, title);
        }
    }
    if report.interrupted {
        bail!("interrupted before completion; run again to resume");
    }
    Ok(())
}
