use crate::fetcher::{DocumentFetcher, FetchConfig};
use crate::parser;
use crate::types::{BriefingError, Category, FeedItem, FeedSource, Result};
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Seam the orchestrator drives: gather every available story for one
/// category. Implemented by [`Aggregator`] over HTTP and by canned
/// collectors in tests.
#[async_trait]
pub trait CollectStories: Send + Sync {
    async fn collect_for(&self, category: Category, feeds: &[FeedSource]) -> Vec<FeedItem>;
}

/// Trait for pulling stories from one feed endpoint. Implemented over
/// HTTP in production and by in-memory sources in tests.
#[async_trait]
pub trait FetchFeed: Send + Sync {
    /// Human-readable name of the source, used in logs and story bylines.
    fn source_name(&self) -> String;

    /// Fetch the source's current stories.
    async fn fetch(&self) -> Result<Vec<FeedItem>>;
}

/// A syndication endpoint fetched over HTTP and parsed with feed-rs.
pub struct HttpFeedSource {
    name: String,
    url: String,
    fetcher: Arc<DocumentFetcher>,
}

impl HttpFeedSource {
    pub fn new(name: String, url: String, fetcher: Arc<DocumentFetcher>) -> Self {
        Self { name, url, fetcher }
    }
}

#[async_trait]
impl FetchFeed for HttpFeedSource {
    fn source_name(&self) -> String {
        self.name.clone()
    }

    async fn fetch(&self) -> Result<Vec<FeedItem>> {
        let content = self.fetcher.fetch(&self.url).await.map_err(|e| {
            BriefingError::SourceUnavailable {
                source_name: self.name.clone(),
                reason: e.to_string(),
            }
        })?;

        parser::parse_feed(&content, &self.name)
    }
}

/// Collects stories for one category from all of its enabled feeds.
///
/// Feeds are fetched concurrently; a single feed's error, timeout, or
/// malformed payload is logged and skipped, so the aggregate wall-clock
/// time is bounded by the per-feed timeout rather than the sum of them.
/// An empty result is not an error here: "no stories" is decided by the
/// orchestrator, which distinguishes it from "feed unreachable."
pub struct Aggregator {
    fetcher: Arc<DocumentFetcher>,
    feed_timeout: Duration,
}

impl Aggregator {
    pub fn new(fetch_config: FetchConfig, feed_timeout_seconds: u64) -> Self {
        Self {
            fetcher: Arc::new(DocumentFetcher::new(fetch_config)),
            feed_timeout: Duration::from_secs(feed_timeout_seconds),
        }
    }

    /// Build HTTP sources for a category's enabled feeds. Categories with
    /// no configured feeds fall back to the compiled-in defaults; feeds
    /// with unparsable URLs are dropped with a warning.
    pub fn sources_for(&self, category: Category, feeds: &[FeedSource]) -> Vec<Arc<dyn FetchFeed>> {
        let configured: Vec<&FeedSource> = feeds
            .iter()
            .filter(|f| f.enabled)
            .filter(|f| match url::Url::parse(&f.url) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => true,
                _ => {
                    warn!("Feed {} has an invalid URL, skipping: {}", f.name, f.url);
                    false
                }
            })
            .collect();

        let effective: Vec<FeedSource> = if configured.is_empty() {
            let defaults = default_feeds(category);
            info!(
                "No enabled feeds configured for {}, using {} default feeds",
                category,
                defaults.len()
            );
            defaults
        } else {
            configured.into_iter().cloned().collect()
        };

        effective
            .into_iter()
            .map(|feed| {
                Arc::new(HttpFeedSource::new(feed.name, feed.url, self.fetcher.clone()))
                    as Arc<dyn FetchFeed>
            })
            .collect()
    }

    /// Fetch all sources concurrently and concatenate whatever succeeded,
    /// preserving source order. Each source gets the per-feed timeout.
    pub async fn collect(&self, sources: &[Arc<dyn FetchFeed>]) -> Vec<FeedItem> {
        let fetches = sources.iter().map(|source| {
            let source = source.clone();
            let timeout = self.feed_timeout;

            async move {
                let name = source.source_name();
                match tokio::time::timeout(timeout, source.fetch()).await {
                    Ok(Ok(items)) => {
                        info!("Feed {} contributed {} items", name, items.len());
                        items
                    }
                    Ok(Err(e)) => {
                        warn!("Feed {} failed, skipping: {}", name, e);
                        Vec::new()
                    }
                    Err(_) => {
                        warn!("Feed {} timed out after {:?}, skipping", name, timeout);
                        Vec::new()
                    }
                }
            }
        });

        let items: Vec<FeedItem> = join_all(fetches).await.into_iter().flatten().collect();
        info!("Aggregated {} items from {} sources", items.len(), sources.len());
        items
    }
}

#[async_trait]
impl CollectStories for Aggregator {
    async fn collect_for(&self, category: Category, feeds: &[FeedSource]) -> Vec<FeedItem> {
        let sources = self.sources_for(category, feeds);
        self.collect(&sources).await
    }
}

/// Fallback feeds compiled in per category, used when the settings store
/// has none configured.
pub fn default_feeds(category: Category) -> Vec<FeedSource> {
    let feeds: &[(&str, &str)] = match category {
        Category::National => &[
            ("NPR News", "https://feeds.npr.org/1001/rss.xml"),
            ("CNN US", "http://rss.cnn.com/rss/cnn_us.rss"),
        ],
        Category::International => &[
            ("BBC World", "http://feeds.bbci.co.uk/news/world/rss.xml"),
            ("Al Jazeera", "https://www.aljazeera.com/xml/rss/all.xml"),
        ],
        Category::Business => &[
            ("WSJ Markets", "https://feeds.content.dowjones.io/public/rss/RSSMarketsMain"),
            ("CNBC", "https://www.cnbc.com/id/100003114/device/rss/rss.html"),
        ],
        Category::Sports => &[
            ("ESPN", "https://www.espn.com/espn/rss/news"),
            ("BBC Sport", "http://feeds.bbci.co.uk/sport/rss.xml"),
        ],
        Category::Science => &[
            ("NASA", "https://www.nasa.gov/rss/dyn/breaking_news.rss"),
            ("ScienceDaily", "https://www.sciencedaily.com/rss/all.xml"),
        ],
    };

    feeds
        .iter()
        .map(|(name, url)| FeedSource {
            name: name.to_string(),
            url: url.to_string(),
            enabled: true,
        })
        .collect()
}
