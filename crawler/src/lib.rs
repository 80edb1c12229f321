//! Concurrent page download and ingestion on top of `archive-core`.

pub mod fetch;
pub mod pipeline;
pub mod shutdown;

pub use fetch::{FetchError, Fetcher, PageSource};
pub use pipeline::{IngestStats, Mode, Orchestrator, RunPlan, RunReport};
pub use shutdown::Shutdown;
