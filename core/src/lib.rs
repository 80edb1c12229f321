//! Archive of ithappens.me stories: page cache, extraction, SQLite storage
//! and a small inverted index.

pub mod config;
pub mod date;
pub mod error;
pub mod extract;
pub mod index;
pub mod model;
pub mod page_store;
pub mod persist;
pub mod query;
pub mod tokenizer;

pub use config::ArchiveConfig;
pub use error::{ConfigError, DatabaseError, DateParseError, ExtractError, PageStoreError};
pub use extract::StoryExtractor;
pub use index::{IndexBuilder, IndexStats};
pub use model::{IndexEntry, PageNumber, Story, StoryId};
pub use page_store::PageStore;
pub use persist::Store;
pub use query::{QueryEngine, Ranking, SearchHit, SearchOptions};
pub use tokenizer::Analyzer;
