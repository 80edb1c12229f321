use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::VecDeque;
use std::fs::create_dir_all;
use std::path::Path;
use tracing::debug;

use crate::error::DatabaseError;
use crate::model::{join_tags, split_tags};
use crate::{IndexEntry, Story, StoryId};

pub type Result<T> = std::result::Result<T, DatabaseError>;

const PAGE_SIZE: usize = 256;

const STORIES_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS stories (
        storyId  INTEGER PRIMARY KEY,
        title    TEXT,
        datetime INTEGER,
        tags     TEXT,
        text     TEXT,
        likes    INTEGER
    );
";

const SEARCH_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS search (
        word      TEXT,
        document  INTEGER,
        wordCount INTEGER
    );
    CREATE INDEX IF NOT EXISTS idx_search_word ON search(word);
    CREATE INDEX IF NOT EXISTS idx_search_document ON search(document);
";

/// SQLite-backed story repository and search table.
///
/// One connection behind a mutex: every statement is serialized, which is
/// the write discipline SQLite needs anyway.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            create_dir_all(dir)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(STORIES_SCHEMA)?;
        conn.execute_batch(SEARCH_SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn exists(&self, story_id: StoryId) -> Result<bool> {
        let conn = self.conn.lock();
        let n: i64 = conn.query_row(
            "SELECT COUNT(storyId) FROM stories WHERE storyId = ?1",
            params![story_id],
            |row| row.get(0),
        )?;
        Ok(n > 0)
    }

    /// Insert unless the id is already stored. Returns whether a row was written;
    /// the first write wins.
    pub fn insert(&self, story: &Story) -> Result<bool> {
        let conn = self.conn.lock();
        let n = conn.execute(
            "INSERT OR IGNORE INTO stories (storyId, title, datetime, tags, text, likes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                story.story_id,
                story.title,
                story.timestamp,
                join_tags(&story.tags),
                story.text,
                story.likes
            ],
        )?;
        if n > 0 {
            debug!(story_id = story.story_id, "stored story");
        }
        Ok(n > 0)
    }

    /// Insert a batch in one transaction. Returns how many were new.
    pub fn insert_all(&self, stories: &[Story]) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO stories (storyId, title, datetime, tags, text, likes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for story in stories {
                inserted += stmt.execute(params![
                    story.story_id,
                    story.title,
                    story.timestamp,
                    join_tags(&story.tags),
                    story.text,
                    story.likes
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Highest stored id, 0 when empty.
    pub fn max_story_id(&self) -> Result<StoryId> {
        let conn = self.conn.lock();
        let id = conn.query_row("SELECT COALESCE(MAX(storyId), 0) FROM stories", [], |row| row.get(0))?;
        Ok(id)
    }

    pub fn count(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM stories", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    pub fn get(&self, story_id: StoryId) -> Result<Option<Story>> {
        let conn = self.conn.lock();
        let story = conn
            .query_row(
                "SELECT storyId, title, datetime, tags, text, likes FROM stories WHERE storyId = ?1",
                params![story_id],
                story_from_row,
            )
            .optional()?;
        Ok(story)
    }

    /// Every story by ascending id. Lazy: rows are read in pages and the
    /// connection is not held between pages. Each call starts over.
    pub fn all(&self) -> StoryIter<'_> {
        StoryIter { store: self, after: StoryId::MIN, buffer: VecDeque::new(), done: false }
    }

    fn page_after(&self, after: StoryId, limit: usize) -> Result<Vec<Story>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT storyId, title, datetime, tags, text, likes FROM stories
             WHERE storyId > ?1 ORDER BY storyId LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![after, limit as i64], story_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // search table

    pub fn drop_search_table(&self) -> Result<()> {
        self.conn.lock().execute_batch("DROP TABLE IF EXISTS search;")?;
        Ok(())
    }

    pub fn create_search_table(&self) -> Result<()> {
        self.conn.lock().execute_batch(SEARCH_SCHEMA)?;
        Ok(())
    }

    pub fn clear_search(&self) -> Result<usize> {
        Ok(self.conn.lock().execute("DELETE FROM search", [])?)
    }

    /// Replace every row of `document` with `entries`, atomically.
    pub fn replace_entries(&self, document: StoryId, entries: &[IndexEntry]) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM search WHERE document = ?1", params![document])?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO search (word, document, wordCount) VALUES (?1, ?2, ?3)")?;
            for e in entries {
                stmt.execute(params![e.term, e.document, e.count])?;
            }
        }
        tx.commit()?;
        Ok(entries.len())
    }

    /// `(document, count)` rows for an exact term, highest count first, ties by
    /// newer document.
    pub fn lookup(&self, term: &str) -> Result<Vec<(StoryId, u32)>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT document, wordCount FROM search WHERE word = ?1
             ORDER BY wordCount DESC, document DESC",
        )?;
        let rows = stmt
            .query_map(params![term], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn search_row_count(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM search", [], |row| row.get(0))?;
        Ok(n as u64)
    }
}

fn story_from_row(row: &Row<'_>) -> rusqlite::Result<Story> {
    let tags: Option<String> = row.get(3)?;
    Ok(Story {
        story_id: row.get(0)?,
        title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        timestamp: row.get::<_, Option<i64>>(2)?.unwrap_or_default(),
        tags: split_tags(tags.as_deref().unwrap_or_default()),
        text: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        likes: row.get::<_, Option<i64>>(5)?.unwrap_or_default(),
    })
}

/// See [`Store::all`].
pub struct StoryIter<'a> {
    store: &'a Store,
    after: StoryId,
    buffer: VecDeque<Story>,
    done: bool,
}

impl Iterator for StoryIter<'_> {
    type Item = Result<Story>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.done {
            match self.store.page_after(self.after, PAGE_SIZE) {
                Ok(page) => {
                    self.done = page.len() < PAGE_SIZE;
                    if let Some(last) = page.last() {
                        self.after = last.story_id;
                    }
                    self.buffer.extend(page);
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}
