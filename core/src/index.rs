use tracing::info;

use crate::persist::{Result, Store};
use crate::tokenizer::Analyzer;
use crate::{IndexEntry, Story};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    pub documents: usize,
    pub entries: usize,
}

/// One row per distinct stemmed term of the story body.
pub fn index_entries(analyzer: &Analyzer, story: &Story) -> Vec<IndexEntry> {
    analyzer
        .terms(&story.text)
        .into_iter()
        .map(|(term, count)| IndexEntry { term, document: story.story_id, count })
        .collect()
}

/// Writes inverted-index rows for stored stories into the search table.
pub struct IndexBuilder<'a> {
    store: &'a Store,
    analyzer: &'a Analyzer,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(store: &'a Store, analyzer: &'a Analyzer) -> Self {
        Self { store, analyzer }
    }

    /// Replace the story's rows, so re-indexing never double counts.
    pub fn index_story(&self, story: &Story) -> Result<usize> {
        let entries = index_entries(self.analyzer, story);
        self.store.replace_entries(story.story_id, &entries)
    }

    /// Clear the search table, then index every story.
    pub fn rebuild<I>(&self, stories: I) -> Result<IndexStats>
    where
        I: IntoIterator<Item = Result<Story>>,
    {
        let cleared = self.store.clear_search()?;
        info!(cleared, "cleared search table");
        let mut stats = IndexStats::default();
        for story in stories {
            stats.entries += self.index_story(&story?)?;
            stats.documents += 1;
            if stats.documents % 1000 == 0 {
                info!(documents = stats.documents, entries = stats.entries, "indexing");
            }
        }
        info!(documents = stats.documents, entries = stats.entries, "index rebuilt");
        Ok(stats)
    }
}
