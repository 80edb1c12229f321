use std::future::Future;
use std::time::Duration;

use archive_core::{ArchiveConfig, PageNumber};
use bytes::Bytes;
use reqwest::{redirect, Client, StatusCode};
use thiserror::Error;
use tracing::info;
use url::Url;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("page {page}: request failed: {source}")]
    Transport {
        page: PageNumber,
        #[source]
        source: reqwest::Error,
    },
    #[error("page {page}: archive answered {status}")]
    Status { page: PageNumber, status: StatusCode },
    #[error("page {page}: cancelled")]
    Cancelled { page: PageNumber },
}

impl FetchError {
    /// The archive has no snapshot of this page.
    pub fn is_missing(&self) -> bool {
        matches!(self, FetchError::Status { status, .. } if *status == StatusCode::NOT_FOUND)
    }
}

/// Anything that can hand out raw page bytes by number.
pub trait PageSource: Send + Sync + 'static {
    fn fetch(&self, page: PageNumber) -> impl Future<Output = Result<Bytes, FetchError>> + Send;
}

/// HTTP client for one pinned archive snapshot. No retries: a failed page is
/// picked up by the next run.
pub struct Fetcher {
    client: Client,
    config: ArchiveConfig,
}

impl Fetcher {
    pub fn new(config: &ArchiveConfig) -> anyhow::Result<Self> {
        Url::parse(&config.page_url(config.first_page))?;
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(redirect::Policy::limited(5))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config: config.clone() })
    }

    pub fn url_for(&self, page: PageNumber) -> String {
        self.config.page_url(page)
    }
}

impl PageSource for Fetcher {
    async fn fetch(&self, page: PageNumber) -> Result<Bytes, FetchError> {
        let url = self.url_for(page);
        info!(page, %url, "download");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| FetchError::Transport { page, source })?;
        if !resp.status().is_success() {
            return Err(FetchError::Status { page, status: resp.status() });
        }
        resp.bytes()
            .await
            .map_err(|source| FetchError::Transport { page, source })
    }
}
