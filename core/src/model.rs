use serde::{Deserialize, Serialize};

pub type PageNumber = u32;
pub type StoryId = i64;

/// One archived story as extracted from a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    pub story_id: StoryId,
    /// Raw inner markup of the title link.
    pub title: String,
    /// Epoch seconds.
    pub timestamp: i64,
    /// Document order, duplicates kept.
    pub tags: Vec<String>,
    /// Paragraphs joined with '\n'.
    pub text: String,
    pub likes: i64,
}

/// One row of the search table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub term: String,
    pub document: StoryId,
    pub count: u32,
}

const TAG_SEPARATOR: &str = ", ";

pub fn join_tags(tags: &[String]) -> String {
    tags.join(TAG_SEPARATOR)
}

pub fn split_tags(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(TAG_SEPARATOR).map(str::to_string).collect()
}
