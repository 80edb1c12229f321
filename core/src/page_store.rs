use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::error::PageStoreError;
use crate::PageNumber;

/// Write-once byte cache of raw pages, one `N.html` file per page.
///
/// A page becomes visible only after a rename from a temporary file, so an
/// existing file is always a complete prior write.
#[derive(Debug, Clone)]
pub struct PageStore {
    root: PathBuf,
}

impl PageStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    pub fn path_for(&self, page: PageNumber) -> PathBuf {
        self.root.join(format!("{page}.html"))
    }

    fn temp_path_for(&self, page: PageNumber) -> PathBuf {
        self.root.join(format!(".{page}.html.part"))
    }

    pub async fn exists(&self, page: PageNumber) -> bool {
        fs::metadata(self.path_for(page))
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    /// Store `bytes` unless the page is already cached. Returns whether a write happened.
    pub async fn write(&self, page: PageNumber, bytes: &[u8]) -> Result<bool, PageStoreError> {
        if self.exists(page).await {
            return Ok(false);
        }
        let io_err = |source: io::Error| PageStoreError::Io { page, source };
        fs::create_dir_all(&self.root).await.map_err(io_err)?;
        let tmp = self.temp_path_for(page);
        fs::write(&tmp, bytes).await.map_err(io_err)?;
        fs::rename(&tmp, self.path_for(page)).await.map_err(io_err)?;
        debug!(page, bytes = bytes.len(), "cached page");
        Ok(true)
    }

    pub async fn read(&self, page: PageNumber) -> Result<Vec<u8>, PageStoreError> {
        match fs::read(self.path_for(page)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(PageStoreError::NotFound { page }),
            Err(source) => Err(PageStoreError::Io { page, source }),
        }
    }
}

/// Page number encoded in a cache file name, if it is one of ours.
pub fn page_number_of(path: &Path) -> Option<PageNumber> {
    if path.extension()?.to_str()? != "html" {
        return None;
    }
    path.file_stem()?.to_str()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn second_write_is_a_noop() {
        let dir = tempdir().unwrap();
        let store = PageStore::new(dir.path().join("saved"));
        assert!(!store.exists(7).await);

        assert!(store.write(7, b"first").await.unwrap());
        assert!(!store.write(7, b"second").await.unwrap());

        assert!(store.exists(7).await);
        assert_eq!(store.read(7).await.unwrap(), b"first");
        assert!(!store.temp_path_for(7).exists());
    }

    #[tokio::test]
    async fn missing_page_is_not_found() {
        let dir = tempdir().unwrap();
        let store = PageStore::new(dir.path());
        match store.read(3).await {
            Err(PageStoreError::NotFound { page }) => assert_eq!(page, 3),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn recognizes_cache_file_names() {
        assert_eq!(page_number_of(Path::new("saved/1487.html")), Some(1487));
        assert_eq!(page_number_of(Path::new("saved/.12.html.part")), None);
        assert_eq!(page_number_of(Path::new("saved/notes.txt")), None);
    }
}
