use std::ops::RangeInclusive;
use std::sync::Arc;

use anyhow::Result;
use archive_core::extract::PageExtraction;
use archive_core::{
    Analyzer, DatabaseError, IndexBuilder, IndexStats, PageNumber, PageStore, PageStoreError,
    QueryEngine, SearchHit, SearchOptions, Store, Story, StoryExtractor,
};
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, warn};

use crate::fetch::{FetchError, PageSource};
use crate::shutdown::Shutdown;

/// Where page bytes come from during ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Fetch pages missing from the cache, then read from the cache.
    Download,
    /// Cache only, never touch the network.
    Saved,
    /// Skip ingestion entirely.
    IndexOnly,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    pub pages_ok: usize,
    pub pages_missing: usize,
    pub pages_failed: usize,
    pub pages_cancelled: usize,
    pub stories_extracted: usize,
    pub stories_inserted: usize,
    pub stories_failed: usize,
}

#[derive(Debug, Error)]
enum PageError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Cache(#[from] PageStoreError),
}

enum PageOutcome {
    Parsed { page: PageNumber, stories: Vec<Story>, failed: usize },
    Missing(PageNumber),
    Failed(PageNumber, PageError),
    Cancelled(PageNumber),
}

/// One full invocation: ingest, rebuild the index, optionally search.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub pages: RangeInclusive<PageNumber>,
    pub mode: Mode,
    pub drop_search: bool,
    pub query: Option<String>,
    pub search: SearchOptions,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub ingest: IngestStats,
    pub index: IndexStats,
    pub hits: Option<Vec<SearchHit>>,
    pub interrupted: bool,
}

/// Drives fetch → parse → store over a page range with a bounded number of
/// concurrent page tasks, then indexes every stored story.
pub struct Orchestrator<S> {
    source: Arc<S>,
    pages: Arc<PageStore>,
    store: Arc<Store>,
    extractor: Arc<StoryExtractor>,
    analyzer: Arc<Analyzer>,
    workers: usize,
    shutdown: Shutdown,
}

impl<S: PageSource> Orchestrator<S> {
    pub fn new(source: S, pages: PageStore, store: Arc<Store>, workers: usize, shutdown: Shutdown) -> Self {
        Self {
            source: Arc::new(source),
            pages: Arc::new(pages),
            store,
            extractor: Arc::new(StoryExtractor::new()),
            analyzer: Arc::new(Analyzer::new()),
            workers: workers.max(1),
            shutdown,
        }
    }

    pub async fn run(&self, plan: &RunPlan) -> Result<RunReport> {
        let mut report = RunReport::default();
        if plan.mode != Mode::IndexOnly {
            report.ingest = self.ingest(plan.pages.clone(), plan.mode).await?;
        }
        if self.shutdown.is_triggered() {
            report.interrupted = true;
            return Ok(report);
        }
        if plan.drop_search {
            info!("dropping search table");
            self.store.drop_search_table()?;
            self.store.create_search_table()?;
        }
        report.index = self.index_all().await?;
        report.interrupted = self.shutdown.is_triggered();
        if let Some(query) = plan.query.as_deref() {
            report.hits = Some(self.search(query, plan.search)?);
        }
        Ok(report)
    }

    /// Ingest every page of `range`, newest page first. Returns once all page
    /// tasks have finished. Only database errors abort the run.
    pub async fn ingest(&self, range: RangeInclusive<PageNumber>, mode: Mode) -> Result<IngestStats> {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let (tx, mut rx) = mpsc::channel::<PageOutcome>(self.workers * 2);
        info!(first = range.start(), last = range.end(), workers = self.workers, ?mode, "ingesting pages");

        for page in range.rev() {
            let source = Arc::clone(&self.source);
            let pages = Arc::clone(&self.pages);
            let extractor = Arc::clone(&self.extractor);
            let sem = Arc::clone(&semaphore);
            let shutdown = self.shutdown.clone();
            let tx = tx.clone();

            tokio::spawn(async move {
                let _permit = match sem.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };
                let outcome = if shutdown.is_triggered() {
                    PageOutcome::Cancelled(page)
                } else {
                    process_page(&*source, &pages, &extractor, &shutdown, page, mode).await
                };
                let _ = tx.send(outcome).await;
            });
        }
        // rx closes once every task has dropped its sender
        drop(tx);

        let mut stats = IngestStats::default();
        while let Some(outcome) = rx.recv().await {
            match outcome {
                PageOutcome::Parsed { page, stories, failed } => {
                    let found = stories.len();
                    let store = Arc::clone(&self.store);
                    let inserted = tokio::task::spawn_blocking(move || store.insert_all(&stories)).await??;
                    info!(page, stories = found, inserted, failed, "stored page");
                    stats.pages_ok += 1;
                    stats.stories_extracted += found;
                    stats.stories_inserted += inserted;
                    stats.stories_failed += failed;
                }
                PageOutcome::Missing(page) => {
                    debug!(page, "page not available");
                    stats.pages_missing += 1;
                }
                PageOutcome::Failed(page, error) => {
                    warn!(page, %error, "page failed");
                    stats.pages_failed += 1;
                }
                PageOutcome::Cancelled(page) => {
                    debug!(page, "page cancelled");
                    stats.pages_cancelled += 1;
                }
            }
        }

        info!(
            ok = stats.pages_ok,
            missing = stats.pages_missing,
            failed = stats.pages_failed,
            cancelled = stats.pages_cancelled,
            inserted = stats.stories_inserted,
            "ingestion finished"
        );
        Ok(stats)
    }

    /// Walk story ids 1..=max and replace each stored story's index rows.
    pub async fn index_all(&self) -> Result<IndexStats> {
        let store = Arc::clone(&self.store);
        let analyzer = Arc::clone(&self.analyzer);
        let shutdown = self.shutdown.clone();
        let stats = tokio::task::spawn_blocking(move || -> Result<IndexStats, DatabaseError> {
            let builder = IndexBuilder::new(&store, &analyzer);
            let max = store.max_story_id()?;
            let mut stats = IndexStats::default();
            for story_id in 1..=max {
                if shutdown.is_triggered() {
                    warn!(story_id, "index pass interrupted");
                    break;
                }
                let Some(story) = store.get(story_id)? else { continue };
                stats.entries += builder.index_story(&story)?;
                stats.documents += 1;
            }
            Ok(stats)
        })
        .await??;
        info!(documents = stats.documents, entries = stats.entries, "index updated");
        Ok(stats)
    }

    pub fn search(&self, query: &str, opts: SearchOptions) -> Result<Vec<SearchHit>, DatabaseError> {
        QueryEngine::new(&self.store, &self.analyzer).search_with(query, opts)
    }
}

async fn process_page<S: PageSource>(
    source: &S,
    pages: &PageStore,
    extractor: &StoryExtractor,
    shutdown: &Shutdown,
    page: PageNumber,
    mode: Mode,
) -> PageOutcome {
    let bytes = match load_page(source, pages, shutdown, page, mode).await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return PageOutcome::Missing(page),
        Err(PageError::Fetch(FetchError::Cancelled { .. })) => return PageOutcome::Cancelled(page),
        Err(PageError::Fetch(e)) if e.is_missing() => return PageOutcome::Missing(page),
        Err(e) => return PageOutcome::Failed(page, e),
    };
    let PageExtraction { stories, failures } = extractor.extract_detailed(&bytes);
    for failure in &failures {
        warn!(page, position = failure.position, error = %failure.error, "skipping malformed story");
    }
    PageOutcome::Parsed { page, stories, failed: failures.len() }
}

async fn load_page<S: PageSource>(
    source: &S,
    pages: &PageStore,
    shutdown: &Shutdown,
    page: PageNumber,
    mode: Mode,
) -> Result<Option<Vec<u8>>, PageError> {
    match mode {
        Mode::IndexOnly => Ok(None),
        Mode::Saved => match pages.read(page).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(PageStoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        },
        Mode::Download => {
            if !pages.exists(page).await {
                let bytes = tokio::select! {
                    res = source.fetch(page) => res?,
                    _ = shutdown.triggered() => return Err(FetchError::Cancelled { page }.into()),
                };
                pages.write(page, &bytes).await?;
            }
            Ok(Some(pages.read(page).await?))
        }
    }
}
