use archive_core::{Analyzer, IndexBuilder, QueryEngine, Store, StoryExtractor};
use tempfile::tempdir;

const PAGE: &[u8] = include_bytes!("fixtures/page.html");

fn ingest(store: &Store, markup: &[u8]) -> usize {
    let stories = StoryExtractor::new().extract(markup);
    stories.iter().filter(|s| store.insert(s).unwrap()).count()
}

#[test]
fn page_ingestion_is_idempotent() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path().join("db").join("ithappens.sqlite")).unwrap();

    assert_eq!(ingest(&store, PAGE), 2);
    assert!(store.exists(100).unwrap());
    assert!(store.exists(101).unwrap());
    assert_eq!(store.max_story_id().unwrap(), 101);
    let before: Vec<_> = store.all().map(Result::unwrap).collect();

    assert_eq!(ingest(&store, PAGE), 0);
    let after: Vec<_> = store.all().map(Result::unwrap).collect();
    assert_eq!(before, after);
    assert_eq!(store.count().unwrap(), 2);
}

#[test]
fn stored_stories_are_searchable() {
    let store = Store::open_in_memory().unwrap();
    let analyzer = Analyzer::new();
    ingest(&store, PAGE);

    let builder = IndexBuilder::new(&store, &analyzer);
    for id in 1..=store.max_story_id().unwrap() {
        if let Some(story) = store.get(id).unwrap() {
            builder.index_story(&story).unwrap();
        }
    }

    let engine = QueryEngine::new(&store, &analyzer);
    let hits = engine.search(&analyzer.stem("кот")).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].document, 101);
    assert_eq!(hits[0].score, 4);

    let both = engine
        .search(&format!("{} {}", analyzer.stem("кот"), analyzer.stem("принтер")))
        .unwrap();
    let docs: Vec<_> = both.iter().map(|h| h.document).collect();
    assert_eq!(docs, vec![101, 100]);
}

#[test]
fn reopened_database_keeps_stories() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ithappens.sqlite");
    {
        let store = Store::open(&path).unwrap();
        ingest(&store, PAGE);
    }
    let store = Store::open(&path).unwrap();
    assert_eq!(store.count().unwrap(), 2);
    assert_eq!(store.get(101).unwrap().unwrap().likes, 42);
}
