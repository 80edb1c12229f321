use scraper::{ElementRef, Html, Selector};
use tracing::warn;

use crate::date::{parse_instant, parse_russian_date};
use crate::error::ExtractError;
use crate::Story;

const CONTAINER: &str = "body > div > div > div > div.story";
const STORY_ID: &str = "div.id > span";
const TITLE: &str = "h2 > a";
const DATETIME: &str = "div.meta > time";
const DATE_TEXT: &str = "div.meta > div.date-time";
const TAGS: &str = "div.meta > div > ul > li > a";
const TEXT: &str = "div.text > p";
const LIKES: &str = "div.actions > div.button-group.like > div > div";

/// A story container that could not be turned into a [`Story`].
#[derive(Debug)]
pub struct StoryFailure {
    /// Zero-based position of the container in document order.
    pub position: usize,
    pub error: ExtractError,
}

#[derive(Debug, Default)]
pub struct PageExtraction {
    pub stories: Vec<Story>,
    pub failures: Vec<StoryFailure>,
}

/// Pulls stories out of one archived page using fixed selector paths.
pub struct StoryExtractor {
    container: Selector,
    story_id: Selector,
    title: Selector,
    datetime: Selector,
    date_text: Selector,
    tags: Selector,
    text: Selector,
    likes: Selector,
}

impl Default for StoryExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

impl StoryExtractor {
    pub fn new() -> Self {
        Self {
            container: selector(CONTAINER),
            story_id: selector(STORY_ID),
            title: selector(TITLE),
            datetime: selector(DATETIME),
            date_text: selector(DATE_TEXT),
            tags: selector(TAGS),
            text: selector(TEXT),
            likes: selector(LIKES),
        }
    }

    /// Stories of one page. Broken containers are logged and skipped.
    pub fn extract(&self, markup: &[u8]) -> Vec<Story> {
        let page = self.extract_detailed(markup);
        for failure in &page.failures {
            warn!(position = failure.position, error = %failure.error, "skipping malformed story");
        }
        page.stories
    }

    pub fn extract_detailed(&self, markup: &[u8]) -> PageExtraction {
        let html = String::from_utf8_lossy(markup);
        let document = Html::parse_document(&html);
        let mut out = PageExtraction::default();
        for (position, container) in document.select(&self.container).enumerate() {
            match self.extract_story(container) {
                Ok(story) => out.stories.push(story),
                Err(error) => out.failures.push(StoryFailure { position, error }),
            }
        }
        out
    }

    fn extract_story(&self, el: ElementRef<'_>) -> Result<Story, ExtractError> {
        let story_id = parse_int(required(el, &self.story_id, "storyId")?, "storyId")?;
        let title = inner_htmls(el, &self.title).join("\n");
        let timestamp = self.timestamp(el)?;
        let tags = inner_htmls(el, &self.tags);
        let text = inner_htmls(el, &self.text).join("\n");
        let likes = parse_count(required(el, &self.likes, "likes")?, "likes")?;
        Ok(Story { story_id, title, timestamp, tags, text, likes })
    }

    fn timestamp(&self, el: ElementRef<'_>) -> Result<i64, ExtractError> {
        let attr = el
            .select(&self.datetime)
            .next()
            .and_then(|t| t.value().attr("datetime"))
            .filter(|v| !v.trim().is_empty());
        if let Some(value) = attr {
            return parse_instant(value).ok_or_else(|| ExtractError::InvalidDatetime {
                value: value.to_string(),
            });
        }
        let raw = required(el, &self.date_text, "date")?;
        Ok(parse_russian_date(&raw)?)
    }
}

fn required(el: ElementRef<'_>, sel: &Selector, field: &'static str) -> Result<String, ExtractError> {
    el.select(sel)
        .next()
        .map(|n| n.inner_html())
        .ok_or(ExtractError::MissingField { field })
}

fn inner_htmls(el: ElementRef<'_>, sel: &Selector) -> Vec<String> {
    el.select(sel).map(|n| n.inner_html()).collect()
}

fn parse_int(raw: String, field: &'static str) -> Result<i64, ExtractError> {
    raw.trim()
        .parse()
        .map_err(|_| ExtractError::InvalidNumber { field, value: raw })
}

/// Like [`parse_int`], but rejects negatives.
fn parse_count(raw: String, field: &'static str) -> Result<i64, ExtractError> {
    match raw.trim().parse::<i64>() {
        Ok(n) if n >= 0 => Ok(n),
        _ => Err(ExtractError::InvalidNumber { field, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = include_str!("../tests/fixtures/page.html");

    fn wrap(stories: &str) -> String {
        format!("<html><body><div><div><div>{stories}</div></div></div></body></html>")
    }

    #[test]
    fn extracts_all_fields_in_document_order() {
        let stories = StoryExtractor::new().extract(PAGE.as_bytes());
        assert_eq!(stories.len(), 2);

        let first = &stories[0];
        assert_eq!(first.story_id, 101);
        assert_eq!(first.title, "Кот и <em>сервер</em>");
        assert_eq!(first.timestamp, 1_642_231_800);
        assert_eq!(first.tags, vec!["Кошки", "Админы"]);
        assert_eq!(first.text, "Наш кот спал на сервере.\nКот, кот и ещё раз кот!");
        assert_eq!(first.likes, 42);

        assert_eq!(stories[1].story_id, 100);
        assert_eq!(stories[1].tags, vec!["Люди"]);
    }

    #[test]
    fn falls_back_to_human_readable_date() {
        let stories = StoryExtractor::new().extract(PAGE.as_bytes());
        assert_eq!(stories[1].timestamp, 1_614_783_900);
    }

    #[test]
    fn page_without_containers_is_empty() {
        let extractor = StoryExtractor::new();
        assert!(extractor.extract(b"<html><body><p>404</p></body></html>").is_empty());
        assert!(extractor.extract(b"").is_empty());
    }

    #[test]
    fn broken_story_does_not_sink_the_page() {
        let good = r#"<div class="story"><div class="id"><span>5</span></div>
            <div class="meta"><div class="date-time">1 мая 2015, 09:00</div></div>
            <div class="actions"><div class="button-group like"><div><div>0</div></div></div></div></div>"#;
        let no_id = r#"<div class="story"><h2><a>без номера</a></h2>
            <div class="actions"><div class="button-group like"><div><div>3</div></div></div></div></div>"#;
        let page = StoryExtractor::new().extract_detailed(wrap(&format!("{no_id}{good}")).as_bytes());

        assert_eq!(page.stories.len(), 1);
        assert_eq!(page.stories[0].story_id, 5);
        assert!(page.stories[0].tags.is_empty());
        assert_eq!(page.stories[0].text, "");
        assert_eq!(page.failures.len(), 1);
        assert_eq!(page.failures[0].position, 0);
        assert!(matches!(
            page.failures[0].error,
            ExtractError::MissingField { field: "storyId" }
        ));
    }

    #[test]
    fn unknown_month_fails_only_that_story() {
        let story = r#"<div class="story"><div class="id"><span>9</span></div>
            <div class="meta"><div class="date-time">1 квинтилиса 2015, 09:00</div></div>
            <div class="actions"><div class="button-group like"><div><div>0</div></div></div></div></div>"#;
        let page = StoryExtractor::new().extract_detailed(wrap(story).as_bytes());
        assert!(page.stories.is_empty());
        assert!(matches!(page.failures[0].error, ExtractError::Date(_)));
    }

    #[test]
    fn non_numeric_likes_is_rejected() {
        let story = r#"<div class="story"><div class="id"><span>9</span></div>
            <div class="meta"><time datetime="2015-05-01T06:00:00Z"></time></div>
            <div class="actions"><div class="button-group like"><div><div>many</div></div></div></div></div>"#;
        let page = StoryExtractor::new().extract_detailed(wrap(story).as_bytes());
        assert!(matches!(
            page.failures[0].error,
            ExtractError::InvalidNumber { field: "likes", .. }
        ));
    }

    #[test]
    fn negative_likes_is_rejected() {
        let story = r#"<div class="story"><div class="id"><span>9</span></div>
            <div class="meta"><time datetime="2015-05-01T06:00:00Z"></time></div>
            <div class="actions"><div class="button-group like"><div><div>-5</div></div></div></div></div>"#;
        let page = StoryExtractor::new().extract_detailed(wrap(story).as_bytes());
        assert!(page.stories.is_empty());
        assert!(matches!(
            &page.failures[0].error,
            ExtractError::InvalidNumber { field: "likes", value } if value == "-5"
        ));
    }
}
