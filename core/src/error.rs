use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::PageNumber;

/// Local page cache failures, scoped to one page.
#[derive(Debug, Error)]
pub enum PageStoreError {
    #[error("page {page} not found in cache")]
    NotFound { page: PageNumber },
    #[error("cache io failure for page {page}: {source}")]
    Io {
        page: PageNumber,
        #[source]
        source: io::Error,
    },
}

/// The human-readable fallback date could not be turned into an instant.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateParseError {
    #[error("date string '{0}' does not match '<day> <month> <year>, <hh>:<mm>'")]
    NoMatch(String),
    #[error("unknown month name '{0}'")]
    UnknownMonth(String),
    #[error("date '{0}' is out of range")]
    InvalidDate(String),
}

/// One story container did not match the expected structure.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("story field '{field}' is missing")]
    MissingField { field: &'static str },
    #[error("story field '{field}' is not an integer: '{value}'")]
    InvalidNumber { field: &'static str, value: String },
    #[error("datetime attribute '{value}' is not an ISO-8601 instant")]
    InvalidDatetime { value: String },
    #[error(transparent)]
    Date(#[from] DateParseError),
}

/// Connection or statement failure. Not recoverable mid-run.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("cannot prepare database location: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
