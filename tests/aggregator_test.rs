use async_trait::async_trait;
use briefcast::aggregator::{default_feeds, Aggregator, FetchFeed};
use briefcast::fetcher::FetchConfig;
use briefcast::types::{BriefingError, Category, FeedItem, FeedSource, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .try_init();
}

fn item(title: &str, source: &str) -> FeedItem {
    FeedItem {
        title: title.to_string(),
        summary: format!("{} summary", title),
        source_name: source.to_string(),
        link: format!("https://example.com/{}", title.len()),
        published_at: None,
    }
}

/// Source that answers immediately with fixed items.
struct SteadySource {
    name: String,
    items: Vec<FeedItem>,
}

#[async_trait]
impl FetchFeed for SteadySource {
    fn source_name(&self) -> String {
        self.name.clone()
    }

    async fn fetch(&self) -> Result<Vec<FeedItem>> {
        Ok(self.items.clone())
    }
}

/// Source that hangs far past any sane per-feed timeout.
struct HangingSource;

#[async_trait]
impl FetchFeed for HangingSource {
    fn source_name(&self) -> String {
        "Hanging Feed".to_string()
    }

    async fn fetch(&self) -> Result<Vec<FeedItem>> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(vec![item("Too late", "Hanging Feed")])
    }
}

/// Source that fails outright.
struct BrokenSource;

#[async_trait]
impl FetchFeed for BrokenSource {
    fn source_name(&self) -> String {
        "Broken Feed".to_string()
    }

    async fn fetch(&self) -> Result<Vec<FeedItem>> {
        Err(BriefingError::SourceUnavailable {
            source_name: "Broken Feed".to_string(),
            reason: "connection refused".to_string(),
        })
    }
}

fn aggregator(feed_timeout_seconds: u64) -> Aggregator {
    Aggregator::new(
        FetchConfig {
            timeout_seconds: feed_timeout_seconds,
            max_retries: 0,
            ..FetchConfig::default()
        },
        feed_timeout_seconds,
    )
}

#[tokio::test]
async fn slow_and_broken_feeds_do_not_block_the_rest() {
    init_tracing();
    info!("Testing per-feed isolation and the aggregate time bound");

    let sources: Vec<Arc<dyn FetchFeed>> = vec![
        Arc::new(SteadySource {
            name: "Fast A".to_string(),
            items: vec![item("Alpha story", "Fast A"), item("Beta story", "Fast A")],
        }),
        Arc::new(HangingSource),
        Arc::new(BrokenSource),
        Arc::new(SteadySource {
            name: "Fast B".to_string(),
            items: vec![item("Gamma story", "Fast B")],
        }),
    ];

    let start = Instant::now();
    let items = aggregator(1).collect(&sources).await;
    let elapsed = start.elapsed();

    assert_eq!(items.len(), 3, "both healthy feeds must contribute");
    assert!(
        elapsed < Duration::from_secs(5),
        "wall-clock must be bounded by the per-feed timeout, took {:?}",
        elapsed
    );

    // Source order is preserved in the concatenation.
    assert_eq!(items[0].source_name, "Fast A");
    assert_eq!(items[2].source_name, "Fast B");
}

#[tokio::test]
async fn all_feeds_failing_yields_an_empty_list_not_an_error() {
    init_tracing();

    let sources: Vec<Arc<dyn FetchFeed>> = vec![Arc::new(BrokenSource), Arc::new(HangingSource)];
    let items = aggregator(1).collect(&sources).await;

    assert!(items.is_empty(), "aggregator reports emptiness, not failure");
}

#[tokio::test]
async fn unconfigured_category_falls_back_to_default_feeds() {
    init_tracing();

    let aggregator = aggregator(1);
    let sources = aggregator.sources_for(Category::Science, &[]);

    assert_eq!(sources.len(), default_feeds(Category::Science).len());
    assert!(!sources.is_empty());
}

#[tokio::test]
async fn disabled_and_malformed_feeds_are_skipped() {
    init_tracing();

    let feeds = vec![
        FeedSource {
            name: "Enabled".to_string(),
            url: "https://example.com/feed.xml".to_string(),
            enabled: true,
        },
        FeedSource {
            name: "Disabled".to_string(),
            url: "https://example.com/other.xml".to_string(),
            enabled: false,
        },
        FeedSource {
            name: "Garbage".to_string(),
            url: "not a url at all".to_string(),
            enabled: true,
        },
    ];

    let aggregator = aggregator(1);
    let sources = aggregator.sources_for(Category::Business, &feeds);

    assert_eq!(sources.len(), 1, "only the enabled, well-formed feed survives");
    assert_eq!(sources[0].source_name(), "Enabled");
}
