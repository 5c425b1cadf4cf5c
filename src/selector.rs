use crate::types::FeedItem;
use std::collections::HashSet;
use tracing::{debug, info};

/// Titles are reduced to this many characters for duplicate detection, so
/// near-identical headlines from rival outlets collapse to one story.
const DEDUP_KEY_LENGTH: usize = 60;

/// Normalize a title into a dedup key: lowercase, alphanumerics only,
/// truncated to a fixed prefix.
pub fn dedup_key(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .take(DEDUP_KEY_LENGTH)
        .collect()
}

/// Reduce the aggregator's raw item list to at most `stories_per_category`
/// unique stories.
///
/// Dedup is stable: the first occurrence of a normalized title wins and
/// the aggregator's relative order is preserved. Fewer unique items than
/// requested is fine; the briefing just runs shorter.
pub fn select(items: Vec<FeedItem>, stories_per_category: usize) -> Vec<FeedItem> {
    let incoming = items.len();
    let mut seen: HashSet<String> = HashSet::new();
    let mut selected = Vec::with_capacity(stories_per_category);

    for item in items {
        if selected.len() >= stories_per_category {
            break;
        }

        let key = dedup_key(&item.title);
        // Titles that normalize to nothing carry no dedup signal; keep them.
        if !key.is_empty() && !seen.insert(key) {
            debug!("Dropping duplicate story: {}", item.title);
            continue;
        }

        selected.push(item);
    }

    info!(
        "Selected {} of {} aggregated stories (cap {})",
        selected.len(),
        incoming,
        stories_per_category
    );
    selected
}
