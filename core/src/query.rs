use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::persist::{Result, Store};
use crate::tokenizer::{tokenize, Analyzer};
use crate::StoryId;

/// Final order of search hits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Ranking {
    /// Newest story first, regardless of score.
    #[default]
    DocumentDesc,
    /// Highest summed count first, ties by newest story.
    ScoreDesc,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SearchOptions {
    /// Run query words through the index analyzer before lookup. Off by
    /// default: query words are matched verbatim against stemmed terms.
    pub stem_query: bool,
    pub ranking: Ranking,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub document: StoryId,
    pub score: u64,
}

pub struct QueryEngine<'a> {
    store: &'a Store,
    analyzer: &'a Analyzer,
}

impl<'a> QueryEngine<'a> {
    pub fn new(store: &'a Store, analyzer: &'a Analyzer) -> Self {
        Self { store, analyzer }
    }

    pub fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        self.search_with(query, SearchOptions::default())
    }

    /// Sum per-document counts over all query words.
    pub fn search_with(&self, query: &str, opts: SearchOptions) -> Result<Vec<SearchHit>> {
        let mut scores: HashMap<StoryId, u64> = HashMap::new();
        for word in self.query_terms(query, opts.stem_query) {
            let rows = self.store.lookup(&word)?;
            debug!(word = %word, rows = rows.len(), "lookup");
            for (document, count) in rows {
                *scores.entry(document).or_insert(0) += u64::from(count);
            }
        }
        let mut hits: Vec<SearchHit> = scores
            .into_iter()
            .map(|(document, score)| SearchHit { document, score })
            .collect();
        match opts.ranking {
            Ranking::DocumentDesc => hits.sort_by(|a, b| b.document.cmp(&a.document)),
            Ranking::ScoreDesc => {
                hits.sort_by(|a, b| b.score.cmp(&a.score).then(b.document.cmp(&a.document)))
            }
        }
        Ok(hits)
    }

    fn query_terms(&self, query: &str, stem: bool) -> Vec<String> {
        let words = query.split_whitespace();
        if !stem {
            return words.map(str::to_string).collect();
        }
        words
            .flat_map(|w| tokenize(w).into_keys().collect::<Vec<_>>())
            .map(|t| self.analyzer.stem(&t))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IndexEntry;

    fn seed(store: &Store, rows: &[(&str, StoryId, u32)]) {
        let mut by_doc: HashMap<StoryId, Vec<IndexEntry>> = HashMap::new();
        for &(term, document, count) in rows {
            by_doc.entry(document).or_default().push(IndexEntry { term: term.into(), document, count });
        }
        for (doc, entries) in by_doc {
            store.replace_entries(doc, &entries).unwrap();
        }
    }

    #[test]
    fn scores_accumulate_across_words() {
        let store = Store::open_in_memory().unwrap();
        let analyzer = Analyzer::new();
        seed(&store, &[("run", 1, 5), ("run", 2, 3), ("fast", 1, 2)]);

        let hits = QueryEngine::new(&store, &analyzer).search("run fast").unwrap();
        assert_eq!(
            hits,
            vec![SearchHit { document: 2, score: 3 }, SearchHit { document: 1, score: 7 }]
        );
    }

    #[test]
    fn score_ranking_is_opt_in() {
        let store = Store::open_in_memory().unwrap();
        let analyzer = Analyzer::new();
        seed(&store, &[("run", 1, 5), ("run", 2, 3), ("run", 3, 3), ("fast", 1, 2)]);

        let opts = SearchOptions { ranking: Ranking::ScoreDesc, ..Default::default() };
        let docs: Vec<StoryId> = QueryEngine::new(&store, &analyzer)
            .search_with("run  fast", opts)
            .unwrap()
            .into_iter()
            .map(|h| h.document)
            .collect();
        assert_eq!(docs, vec![1, 3, 2]);
    }

    #[test]
    fn blank_query_finds_nothing() {
        let store = Store::open_in_memory().unwrap();
        let analyzer = Analyzer::new();
        seed(&store, &[("run", 1, 5)]);
        let engine = QueryEngine::new(&store, &analyzer);
        assert!(engine.search("").unwrap().is_empty());
        assert!(engine.search("   \t ").unwrap().is_empty());
    }

    #[test]
    fn inflected_query_needs_stemming() {
        let store = Store::open_in_memory().unwrap();
        let analyzer = Analyzer::new();
        let term = analyzer.stem("кот");
        seed(&store, &[(term.as_str(), 9, 4)]);
        let engine = QueryEngine::new(&store, &analyzer);

        assert!(engine.search("Котом").unwrap().is_empty());
        let opts = SearchOptions { stem_query: true, ..Default::default() };
        assert_eq!(engine.search_with("Котом", opts).unwrap(), vec![SearchHit { document: 9, score: 4 }]);
    }
}
