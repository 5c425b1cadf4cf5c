use crate::types::{BriefingError, FeedItem, Result};
use chrono::Utc;
use feed_rs::parser;
use tracing::{debug, info};

/// Parse an RSS/Atom document into feed items. Entries missing a title or
/// link are skipped rather than failing the whole document.
pub fn parse_feed(content: &str, source_name: &str) -> Result<Vec<FeedItem>> {
    let feed = parser::parse(content.as_bytes()).map_err(|e| BriefingError::SourceUnavailable {
        source_name: source_name.to_string(),
        reason: format!("unparsable feed: {}", e),
    })?;

    let mut items = Vec::new();

    for entry in feed.entries {
        if let Some(item) = parse_entry(entry, source_name) {
            items.push(item);
        } else {
            debug!("Skipping entry without title or link in {}", source_name);
        }
    }

    info!("Parsed {} items from {}", items.len(), source_name);
    Ok(items)
}

fn parse_entry(entry: feed_rs::model::Entry, source_name: &str) -> Option<FeedItem> {
    let title = entry.title.map(|t| t.content)?;
    let title = title.trim().to_string();
    if title.is_empty() {
        return None;
    }

    let link = entry.links.first()?.href.clone();

    // Prefer the summary; fall back to full content for feeds that only
    // ship a body.
    let summary = entry
        .summary
        .map(|s| s.content)
        .or_else(|| entry.content.and_then(|c| c.body))
        .map(|text| strip_html(&text))
        .unwrap_or_default();

    let published_at = entry
        .published
        .or(entry.updated)
        .map(|dt| dt.with_timezone(&Utc));

    Some(FeedItem {
        title,
        summary,
        source_name: source_name.to_string(),
        link,
        published_at,
    })
}

/// Drop markup from feed summaries, keeping readable text. Tags are
/// removed, entities for the common cases decoded, whitespace collapsed.
pub fn strip_html(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut in_tag = false;

    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => output.push(c),
            _ => {}
        }
    }

    let decoded = output
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ");

    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}
