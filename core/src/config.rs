use serde::Deserialize;
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::PageNumber;

/// Where pages come from and where everything is stored.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Directory of cached raw pages, one `N.html` per page.
    pub download_root: PathBuf,
    pub database_path: PathBuf,
    pub first_page: PageNumber,
    pub last_page: PageNumber,
    /// Archive endpoint, e.g. the Wayback Machine.
    pub base_url: String,
    /// Fixed snapshot id the whole corpus is pinned to.
    pub snapshot: String,
    pub site: String,
    pub timeout_secs: u64,
    /// Worker count. `None` means one per available CPU.
    pub concurrency: Option<usize>,
    pub user_agent: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            download_root: PathBuf::from("saved"),
            database_path: PathBuf::from("ithappens.sqlite"),
            first_page: 1,
            last_page: 1487,
            base_url: "https://web.archive.org/web".to_string(),
            snapshot: "20220120110021".to_string(),
            site: "https://ithappens.me".to_string(),
            timeout_secs: 30,
            concurrency: None,
            user_agent: "ithappens-grabber/0.1".to_string(),
        }
    }
}

impl ArchiveConfig {
    /// Load a JSON config file. Missing keys keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.first_page == 0 || self.first_page > self.last_page {
            return Err(ConfigError::Invalid(format!(
                "page range {}..={} is empty",
                self.first_page, self.last_page
            )));
        }
        if self.concurrency == Some(0) {
            return Err(ConfigError::Invalid("concurrency must be at least 1".into()));
        }
        if self.base_url.trim().is_empty() || self.site.trim().is_empty() {
            return Err(ConfigError::Invalid("base_url and site must be set".into()));
        }
        Ok(())
    }

    pub fn pages(&self) -> RangeInclusive<PageNumber> {
        self.first_page..=self.last_page
    }

    pub fn workers(&self) -> usize {
        self.concurrency.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// `<base>/<snapshot>/<site>/page/<n>`
    pub fn page_url(&self, page: PageNumber) -> String {
        format!(
            "{}/{}/{}/page/{}",
            self.base_url.trim_end_matches('/'),
            self.snapshot,
            self.site.trim_end_matches('/'),
            page
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_url_matches_snapshot_template() {
        let cfg = ArchiveConfig::default();
        assert_eq!(
            cfg.page_url(42),
            "https://web.archive.org/web/20220120110021/https://ithappens.me/page/42"
        );
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: ArchiveConfig = serde_json::from_str(r#"{"last_page": 10, "concurrency": 2}"#).unwrap();
        assert_eq!(cfg.pages(), 1..=10);
        assert_eq!(cfg.workers(), 2);
        assert_eq!(cfg.database_path, PathBuf::from("ithappens.sqlite"));
    }

    #[test]
    fn rejects_inverted_range_and_zero_workers() {
        let cfg = ArchiveConfig { first_page: 5, last_page: 4, ..Default::default() };
        assert!(cfg.validate().is_err());
        let cfg = ArchiveConfig { concurrency: Some(0), ..Default::default() };
        assert!(cfg.validate().is_err());
        assert!(ArchiveConfig::default().validate().is_ok());
    }
}
