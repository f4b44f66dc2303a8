use std::fmt;
use std::str::FromStr;

use chrono::{TimeZone, Utc};
use digester_core::{metadata_keys, Article, Metadata, MetadataValue};
use digester_logging::{digester_debug, digester_warn};
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::fetch::Fetcher;
use crate::source::{fetch_linked_page, Source, SourceError};

pub const HN_SITE_URL: &str = "https://news.ycombinator.com";
pub const HN_API_URL: &str = "https://hacker-news.firebaseio.com/v0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HackerNewsPage {
    #[default]
    FrontPage,
    New,
    Past,
    Active,
    Jobs,
}

impl HackerNewsPage {
    fn path(self) -> &'static str {
        match self {
            HackerNewsPage::FrontPage => "",
            HackerNewsPage::New => "/newest",
            HackerNewsPage::Past => "/front",
            HackerNewsPage::Active => "/active",
            HackerNewsPage::Jobs => "/jobs",
        }
    }
}

impl FromStr for HackerNewsPage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "frontpage" | "front" => Ok(HackerNewsPage::FrontPage),
            "new" | "newest" => Ok(HackerNewsPage::New),
            "past" => Ok(HackerNewsPage::Past),
            "active" => Ok(HackerNewsPage::Active),
            "jobs" => Ok(HackerNewsPage::Jobs),
            other => Err(format!("unknown hacker news page: {other}")),
        }
    }
}

impl fmt::Display for HackerNewsPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HackerNewsPage::FrontPage => "frontpage",
            HackerNewsPage::New => "new",
            HackerNewsPage::Past => "past",
            HackerNewsPage::Active => "active",
            HackerNewsPage::Jobs => "jobs",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HackerNewsConfig {
    pub name: String,
    pub page: HackerNewsPage,
    pub max_articles: usize,
    /// Ignored on the jobs page, where postings carry no score.
    pub min_score: i64,
    pub show_dead: bool,
    pub show_deleted: bool,
    pub site_url: String,
    pub api_url: String,
}

impl Default for HackerNewsConfig {
    fn default() -> Self {
        Self {
            name: "hackernews".to_string(),
            page: HackerNewsPage::FrontPage,
            max_articles: 30,
            min_score: 10,
            show_dead: false,
            show_deleted: false,
            site_url: HN_SITE_URL.to_string(),
            api_url: HN_API_URL.to_string(),
        }
    }
}

/// Stories scraped from a Hacker News listing page, enriched from the
/// Firebase item API.
#[derive(Debug, Clone)]
pub struct HackerNewsSource {
    config: HackerNewsConfig,
}

/// One row pair (`tr.athing` + subtext row) of a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListedStory {
    pub id: u64,
    pub title: String,
    pub url: String,
    pub by: String,
    pub score: i64,
    pub comments: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct HnItem {
    title: String,
    url: String,
    text: String,
    by: String,
    score: i64,
    time: i64,
    dead: bool,
    deleted: bool,
    descendants: i64,
}

impl HackerNewsSource {
    pub fn new(config: HackerNewsConfig) -> Result<Self, SourceError> {
        if config.max_articles == 0 {
            return Err(SourceError::InvalidConfig(
                "max_articles must be positive".to_string(),
            ));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &HackerNewsConfig {
        &self.config
    }

    fn page_url(&self) -> String {
        format!(
            "{}{}",
            self.config.site_url.trim_end_matches('/'),
            self.config.page.path()
        )
    }

    fn item_url(&self, id: u64) -> String {
        format!("{}/item/{id}.json", self.config.api_url.trim_end_matches('/'))
    }

    fn comments_url(&self, id: u64) -> String {
        format!("{}/item?id={id}", self.config.site_url.trim_end_matches('/'))
    }

    async fn lookup_item(
        &self,
        fetcher: &dyn Fetcher,
        id: u64,
        cancel: &CancellationToken,
    ) -> Result<ItemLookup, SourceError> {
        let url = self.item_url(id);
        let body = match fetcher.fetch_as_string(&url, cancel).await {
            Ok(body) => body,
            Err(err) if err.is_cancelled() => return Err(SourceError::fetch(&url, err)),
            Err(err) => {
                digester_warn!("error fetching hn item {}: {}", id, err);
                return Ok(ItemLookup::Unavailable);
            }
        };
        let item = match serde_json::from_str::<Option<HnItem>>(&body) {
            Ok(Some(item)) => item,
            Ok(None) => return Ok(ItemLookup::Unavailable),
            Err(err) => {
                digester_warn!("error parsing hn item {}: {}", id, err);
                return Ok(ItemLookup::Unavailable);
            }
        };
        if (item.dead && !self.config.show_dead) || (item.deleted && !self.config.show_deleted) {
            return Ok(ItemLookup::Hidden);
        }
        Ok(ItemLookup::Found(item))
    }
}

/// API lookup result. `Unavailable` falls back to the listing data.
enum ItemLookup {
    Found(HnItem),
    Unavailable,
    Hidden,
}

#[async_trait::async_trait]
impl Source for HackerNewsSource {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn fetch(
        &self,
        fetcher: &dyn Fetcher,
        cancel: &CancellationToken,
    ) -> Result<Vec<Article>, SourceError> {
        let page_url = self.page_url();
        let listing = fetcher
            .fetch_as_string(&page_url, cancel)
            .await
            .map_err(|err| SourceError::fetch(&page_url, err))?;
        let stories = parse_listing(&listing, &self.config.site_url);
        digester_debug!("{} listed {} stories", page_url, stories.len());

        let mut articles = Vec::new();
        for story in stories {
            if articles.len() >= self.config.max_articles {
                break;
            }
            if self.config.page != HackerNewsPage::Jobs && story.score < self.config.min_score {
                continue;
            }
            let item = match self.lookup_item(fetcher, story.id, cancel).await? {
                ItemLookup::Hidden => {
                    digester_debug!("skipping hidden hn item {}", story.id);
                    continue;
                }
                ItemLookup::Unavailable => None,
                ItemLookup::Found(item) => Some(item),
            };

            let comments_url = self.comments_url(story.id);
            let mut article = Article {
                title: story.title,
                author: story.by,
                url: story.url,
                source_name: self.config.name.clone(),
                ..Article::default()
            };
            let (mut score, mut comments) = (story.score, story.comments);
            if let Some(item) = item {
                if !item.title.is_empty() {
                    article.title = item.title;
                }
                if !item.by.is_empty() {
                    article.author = item.by;
                }
                if item.time > 0 {
                    article.published_at = Utc.timestamp_opt(item.time, 0).single();
                }
                article.url = item.url;
                article.content = item.text;
                score = item.score;
                comments = item.descendants;
            }

            if article.url.is_empty() {
                article.url = comments_url.clone();
            } else if article.content.is_empty() {
                if let Some(page) = fetch_linked_page(fetcher, &article.url, cancel).await? {
                    article.content = page;
                }
            }

            article.summary = format!("{score} points, {comments} comments");
            article.metadata = story_metadata(story.id, score, comments, comments_url);
            articles.push(article);
        }
        Ok(articles)
    }
}

fn story_metadata(id: u64, score: i64, comments: i64, comments_url: String) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert(metadata_keys::SCORE.to_string(), MetadataValue::Int(score));
    metadata.insert(metadata_keys::COMMENTS.to_string(), MetadataValue::Int(comments));
    metadata.insert(
        metadata_keys::ID.to_string(),
        MetadataValue::Int(i64::try_from(id).unwrap_or(i64::MAX)),
    );
    metadata.insert(
        metadata_keys::COMMENTS_URL.to_string(),
        MetadataValue::Text(comments_url),
    );
    metadata
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Parse a listing page. Rows without a numeric id are skipped.
pub fn parse_listing(html: &str, site_url: &str) -> Vec<ListedStory> {
    let (Some(rows), Some(title_link), Some(score), Some(user), Some(link)) = (
        selector("tr.athing"),
        selector("td.title > span.titleline > a"),
        selector("span.score"),
        selector("a.hnuser"),
        selector("a"),
    ) else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let mut stories = Vec::new();
    for row in document.select(&rows) {
        let Some(id) = row.value().attr("id").and_then(|id| id.parse::<u64>().ok()) else {
            continue;
        };
        let mut story = ListedStory {
            id,
            ..ListedStory::default()
        };
        if let Some(anchor) = row.select(&title_link).next() {
            story.title = element_text(anchor);
            story.url = absolutize(anchor.value().attr("href").unwrap_or_default(), site_url);
        }

        let Some(meta) = row.next_siblings().find_map(ElementRef::wrap) else {
            continue;
        };
        story.score = meta
            .select(&score)
            .next()
            .and_then(|el| first_number(&element_text(el)))
            .unwrap_or(0);
        story.by = meta.select(&user).next().map(element_text).unwrap_or_default();
        story.comments = meta
            .select(&link)
            .map(element_text)
            .find(|text| text.contains("comment") || text.contains("discuss"))
            .and_then(|text| first_number(&text))
            .unwrap_or(0);
        stories.push(story);
    }
    stories
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn absolutize(href: &str, site_url: &str) -> String {
    if href.is_empty() || href.starts_with("http") || href.starts_with("//") {
        return href.to_string();
    }
    format!(
        "{}/{}",
        site_url.trim_end_matches('/'),
        href.trim_start_matches('/')
    )
}

fn first_number(text: &str) -> Option<i64> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const LISTING: &str = r#"<html><body><table>
        <tr class="athing" id="101">
          <td class="title"><span class="titleline"><a href="https://example.test/post">A post</a></span></td>
        </tr>
        <tr><td class="subtext">
          <span class="score">154 points</span> by <a class="hnuser">alice</a>
          <span class="age">3 hours ago</span> | <a href="item?id=101">42&nbsp;comments</a>
        </td></tr>
        <tr class="athing" id="102">
          <td class="title"><span class="titleline"><a href="item?id=102">Ask HN: anything?</a></span></td>
        </tr>
        <tr><td class="subtext">
          <span class="score">3 points</span> by <a class="hnuser">bob</a> | <a href="item?id=102">discuss</a>
        </td></tr>
        <tr class="athing" id="oops"><td class="title">bad row</td></tr>
    </table></body></html>"#;

    #[test]
    fn parses_story_rows() {
        let stories = parse_listing(LISTING, HN_SITE_URL);
        assert_eq!(
            stories,
            vec![
                ListedStory {
                    id: 101,
                    title: "A post".to_string(),
                    url: "https://example.test/post".to_string(),
                    by: "alice".to_string(),
                    score: 154,
                    comments: 42,
                },
                ListedStory {
                    id: 102,
                    title: "Ask HN: anything?".to_string(),
                    url: "https://news.ycombinator.com/item?id=102".to_string(),
                    by: "bob".to_string(),
                    score: 3,
                    comments: 0,
                },
            ]
        );
    }

    #[test]
    fn page_names_parse() {
        assert_eq!("Newest".parse::<HackerNewsPage>(), Ok(HackerNewsPage::New));
        assert!("best".parse::<HackerNewsPage>().is_err());
    }
}
