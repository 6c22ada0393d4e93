//! Read-only access to the blog hosted in a Sanity dataset.
//!
//! [`SanityClient`] speaks the HTTP query API; [`Blog`] owns the queries and
//! the shapes coming back. Anything implementing [`ContentSource`] can stand
//! in for the HTTP client.

use crate::config::ContentConfig;
use crate::error::{EstimatorError, Result};
use crate::paths;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

// ---------------------------------------------------------------------------
// ContentSource
// ---------------------------------------------------------------------------

pub trait ContentSource {
    /// Run a GROQ `query` with named `params` and return its `result`.
    fn fetch(&self, query: &str, params: &[(&str, Value)]) -> Result<Value>;
}

// ---------------------------------------------------------------------------
// SanityClient
// ---------------------------------------------------------------------------

pub struct SanityClient {
    http: reqwest::blocking::Client,
    endpoint: String,
}

impl SanityClient {
    pub fn new(cfg: &ContentConfig) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            http,
            endpoint: query_endpoint(cfg),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn query_endpoint(cfg: &ContentConfig) -> String {
    let host = cfg.base_url.clone().unwrap_or_else(|| {
        let api = if cfg.use_cdn { "apicdn" } else { "api" };
        format!("https://{}.{api}.sanity.io", cfg.project_id)
    });
    format!(
        "{}/v{}/data/query/{}",
        host.trim_end_matches('/'),
        cfg.api_version,
        cfg.dataset
    )
}

impl ContentSource for SanityClient {
    fn fetch(&self, query: &str, params: &[(&str, Value)]) -> Result<Value> {
        let mut pairs = vec![("query".to_string(), query.to_string())];
        for (name, value) in params {
            pairs.push((format!("${name}"), value.to_string()));
        }

        tracing::debug!(endpoint = %self.endpoint, "content query");
        let resp = self.http.get(&self.endpoint).query(&pairs).send()?;
        let status = resp.status();

        if !status.is_success() {
            // proxies in front of the API may answer with a non-JSON body
            let detail = resp.json::<Value>().ok().and_then(|body| {
                body.pointer("/error/description")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            });
            let message = detail
                .map_or_else(|| format!("HTTP {status}"), |d| format!("HTTP {status}: {d}"));
            return Err(EstimatorError::Content(message));
        }
        let mut body: Value = resp.json()?;
        Ok(body.get_mut("result").map(Value::take).unwrap_or(Value::Null))
    }
}

// ---------------------------------------------------------------------------
// Shapes
// ---------------------------------------------------------------------------

/// GROQ projects missing attributes as `null`.
fn null_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSummary {
    #[serde(default, deserialize_with = "null_default")]
    pub title: String,
    /// Empty for drafts that were never given a slug.
    #[serde(default, deserialize_with = "null_default")]
    pub slug: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub categories: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostPage {
    #[serde(default, deserialize_with = "null_default")]
    pub items: Vec<PostSummary>,
    #[serde(default)]
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(default, deserialize_with = "null_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_default")]
    pub slug: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default, deserialize_with = "null_default")]
    pub categories: Vec<String>,
    /// Portable Text blocks.
    #[serde(default)]
    pub body: Value,
    #[serde(default)]
    pub reading_minutes: Option<u32>,
}

impl Post {
    /// Text of each block, one entry per block that has any.
    pub fn paragraphs(&self) -> Vec<String> {
        let Some(blocks) = self.body.as_array() else {
            return Vec::new();
        };
        blocks
            .iter()
            .filter_map(|block| {
                let text: String = block
                    .get("children")?
                    .as_array()?
                    .iter()
                    .filter_map(|span| span.get("text").and_then(Value::as_str))
                    .collect();
                (!text.trim().is_empty()).then_some(text)
            })
            .collect()
    }

    fn word_count(&self) -> usize {
        self.paragraphs()
            .iter()
            .map(|p| p.split_whitespace().count())
            .sum()
    }
}

/// Minutes at 200 words per minute, rounded up.
pub fn reading_minutes(words: usize) -> u32 {
    u32::try_from(words.div_ceil(200)).unwrap_or(u32::MAX)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub title: String,
}

// ---------------------------------------------------------------------------
// Blog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub offset: u32,
}

const POST_MATCH: &str = r#"_type == "post" && defined(slug.current)
    && (($q == "" || title match $q || excerpt match $q)
        || (count(tags[references(^._id)]) > 0 && $q != "" && $q in tags[]->name))"#;

const SUMMARY_PROJECTION: &str = r#"{
    title,
    "slug": slug.current,
    "image_url": mainImage.asset->url,
    "published_at": publishedAt,
    excerpt,
    "categories": categories[]->title,
    "tags": tags[]->name
}"#;

const POST_QUERY: &str = r#"*[_type == "post" && slug.current == $slug][0]{
    title,
    "slug": slug.current,
    "image_url": mainImage.asset->url,
    "published_at": publishedAt,
    "author": author->{name, "image_url": image.asset->url},
    "categories": categories[]->title,
    body
}"#;

const CATEGORIES_QUERY: &str = r#"*[_type == "category"] | order(title asc){ _id, title }"#;

pub struct Blog<C> {
    source: C,
    page_size: u32,
}

impl<C: ContentSource> Blog<C> {
    pub fn new(source: C, page_size: u32) -> Self {
        Self {
            source,
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// One page of posts, newest first, plus the total number of matches.
    pub fn list(&self, filter: &PostFilter) -> Result<PostPage> {
        let term = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map_or_else(String::new, |t| format!("{t}*"));
        let category = filter.category.as_deref().filter(|c| !c.is_empty());

        let matcher = if category.is_some() {
            format!("{POST_MATCH} && references($categoryId)")
        } else {
            POST_MATCH.to_string()
        };
        let query = format!(
            "{{\n  \"items\": *[{matcher}] | order(publishedAt desc) [$offset...$end]{SUMMARY_PROJECTION},\n  \"total\": count(*[{matcher}])\n}}"
        );

        let params = [
            ("q", json!(term)),
            ("offset", json!(filter.offset)),
            ("end", json!(filter.offset.saturating_add(self.page_size))),
            ("categoryId", json!(category)),
        ];
        let mut page: PostPage = decode(self.source.fetch(&query, &params)?)?;
        page.items.retain(|post| !post.slug.is_empty());
        Ok(page)
    }

    /// A single post, or `None` when no post has that slug.
    pub fn post(&self, slug: &str) -> Result<Option<Post>> {
        paths::validate_slug(slug)?;
        let value = self.source.fetch(POST_QUERY, &[("slug", json!(slug))])?;
        let post: Option<Post> = decode(value)?;
        Ok(post.map(|mut post| {
            post.reading_minutes = (!post.body.is_null()).then(|| reading_minutes(post.word_count()));
            post
        }))
    }

    pub fn categories(&self) -> Result<Vec<Category>> {
        let value = self.source.fetch(CATEGORIES_QUERY, &[])?;
        let categories: Option<Vec<Category>> = decode(value)?;
        Ok(categories.unwrap_or_default())
    }

    /// Fetch the page following what `feed` already holds and merge it in.
    pub fn load_more(&self, feed: &mut PostFeed, filter: &PostFilter) -> Result<()> {
        let filter = PostFilter {
            offset: feed.offset,
            ..filter.clone()
        };
        let page = self.list(&filter)?;
        feed.absorb(filter.offset, page);
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| EstimatorError::Content(format!("unexpected response shape: {e}")))
}

// ---------------------------------------------------------------------------
// PostFeed
// ---------------------------------------------------------------------------

/// Posts accumulated across "load more" pages.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PostFeed {
    pub items: Vec<PostSummary>,
    pub offset: u32,
    pub total: u32,
    pub has_more: bool,
}

impl PostFeed {
    pub fn new() -> Self {
        Self {
            has_more: true,
            ..Self::default()
        }
    }

    /// Merge a page fetched at `start`. A slug seen before keeps its position
    /// and takes the newer data.
    pub fn absorb(&mut self, start: u32, page: PostPage) {
        let fetched = u32::try_from(page.items.len()).unwrap_or(u32::MAX);
        for post in page.items {
            match self.items.iter_mut().find(|p| p.slug == post.slug) {
                Some(existing) => *existing = post,
                None => self.items.push(post),
            }
        }
        self.offset = start.saturating_add(fetched);
        self.total = page.total;
        self.has_more = fetched > 0 && self.offset < page.total;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
