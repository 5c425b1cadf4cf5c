use crate::types::{BriefingSchedule, Category, CategorySettings, FeedSource, Result};
use async_trait::async_trait;
use chrono::NaiveTime;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Story caps outside this range are treated as admin typos and clamped.
const MIN_STORIES: usize = 1;
const MAX_STORIES: usize = 10;
const DEFAULT_STORIES: usize = 5;

/// Narrator voice assigned to a category when none is configured.
pub fn default_voice(category: Category) -> &'static str {
    match category {
        Category::National => "rachel",
        Category::International => "daniel",
        Category::Business => "matthew",
        Category::Sports => "josh",
        Category::Science => "bella",
    }
}

/// Read path of the per-category configuration and the global schedule.
/// The pipeline never writes here; an external admin surface owns writes,
/// so every read validates shape instead of trusting it.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn category_settings(&self, category: Category) -> Result<CategorySettings>;

    async fn schedule(&self) -> Result<BriefingSchedule>;

    /// Categories currently enabled for generation, in canonical order.
    async fn enabled_categories(&self) -> Result<Vec<Category>> {
        let mut enabled = Vec::new();
        for category in Category::ALL {
            if self.category_settings(category).await?.enabled {
                enabled.push(category);
            }
        }
        Ok(enabled)
    }
}

fn defaults_for(category: Category) -> CategorySettings {
    CategorySettings {
        category,
        enabled: true,
        feeds: Vec::new(),
        narrator_voice: default_voice(category).to_string(),
        stories_per_category: DEFAULT_STORIES,
    }
}

/// Sanitize a settings row: blank voice falls back to the category
/// default, the story cap is clamped into range.
fn validate(mut settings: CategorySettings) -> CategorySettings {
    if settings.narrator_voice.trim().is_empty() {
        warn!(
            "Blank narrator voice for {}, using default {}",
            settings.category,
            default_voice(settings.category)
        );
        settings.narrator_voice = default_voice(settings.category).to_string();
    }

    let clamped = settings.stories_per_category.clamp(MIN_STORIES, MAX_STORIES);
    if clamped != settings.stories_per_category {
        warn!(
            "Clamping stories_per_category for {} from {} to {}",
            settings.category, settings.stories_per_category, clamped
        );
        settings.stories_per_category = clamped;
    }

    settings
}

/// Postgres-backed settings store.
pub struct PgSettingsStore {
    pool: PgPool,
}

impl PgSettingsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsStore for PgSettingsStore {
    async fn category_settings(&self, category: Category) -> Result<CategorySettings> {
        let row = sqlx::query(
            "SELECT enabled, feeds, narrator_voice, stories_per_category \
             FROM category_settings WHERE category = $1",
        )
        .bind(category.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            debug!("No settings row for {}, using defaults", category);
            return Ok(defaults_for(category));
        };

        let feeds_json: serde_json::Value = row.try_get("feeds")?;
        let feeds: Vec<FeedSource> = match serde_json::from_value(feeds_json) {
            Ok(feeds) => feeds,
            Err(e) => {
                warn!("Malformed feeds column for {}, ignoring: {}", category, e);
                Vec::new()
            }
        };

        let stories: i32 = row.try_get("stories_per_category")?;
        Ok(validate(CategorySettings {
            category,
            enabled: row.try_get("enabled")?,
            feeds,
            narrator_voice: row.try_get("narrator_voice")?,
            stories_per_category: stories.max(0) as usize,
        }))
    }

    async fn schedule(&self) -> Result<BriefingSchedule> {
        let row = sqlx::query(
            "SELECT time_1, time_2, time_3, timezone, auto_generate FROM briefing_schedule LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            debug!("No schedule row, using defaults");
            return Ok(BriefingSchedule::default());
        };

        let times: [NaiveTime; 3] = [
            row.try_get("time_1")?,
            row.try_get("time_2")?,
            row.try_get("time_3")?,
        ];

        let zone_name: String = row.try_get("timezone")?;
        let timezone = match zone_name.parse::<chrono_tz::Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                warn!(
                    "Unknown timezone {:?} in schedule, using {}",
                    zone_name,
                    BriefingSchedule::default().timezone
                );
                BriefingSchedule::default().timezone
            }
        };

        Ok(BriefingSchedule {
            times,
            timezone,
            auto_generate: row.try_get("auto_generate")?,
        })
    }
}

/// In-memory settings store for tests and local demos.
pub struct MemorySettingsStore {
    categories: HashMap<Category, CategorySettings>,
    schedule: BriefingSchedule,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self {
            categories: HashMap::new(),
            schedule: BriefingSchedule::default(),
        }
    }

    pub fn with_category(mut self, settings: CategorySettings) -> Self {
        self.categories.insert(settings.category, settings);
        self
    }

    pub fn with_schedule(mut self, schedule: BriefingSchedule) -> Self {
        self.schedule = schedule;
        self
    }
}

impl Default for MemorySettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn category_settings(&self, category: Category) -> Result<CategorySettings> {
        Ok(self
            .categories
            .get(&category)
            .cloned()
            .map(validate)
            .unwrap_or_else(|| defaults_for(category)))
    }

    async fn schedule(&self) -> Result<BriefingSchedule> {
        Ok(self.schedule.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_category_gets_defaults() {
        let store = MemorySettingsStore::new();
        let settings = store.category_settings(Category::Science).await.unwrap();
        assert!(settings.enabled);
        assert_eq!(settings.stories_per_category, DEFAULT_STORIES);
        assert_eq!(settings.narrator_voice, "bella");
    }

    #[tokio::test]
    async fn absurd_story_cap_is_clamped() {
        let store = MemorySettingsStore::new().with_category(CategorySettings {
            category: Category::Business,
            enabled: true,
            feeds: Vec::new(),
            narrator_voice: String::new(),
            stories_per_category: 500,
        });

        let settings = store.category_settings(Category::Business).await.unwrap();
        assert_eq!(settings.stories_per_category, MAX_STORIES);
        assert_eq!(settings.narrator_voice, "matthew", "blank voice falls back");
    }

    #[tokio::test]
    async fn disabled_categories_are_excluded_from_run_all() {
        let store = MemorySettingsStore::new().with_category(CategorySettings {
            category: Category::Sports,
            enabled: false,
            feeds: Vec::new(),
            narrator_voice: "josh".to_string(),
            stories_per_category: 5,
        });

        let enabled = store.enabled_categories().await.unwrap();
        assert!(!enabled.contains(&Category::Sports));
        assert_eq!(enabled.len(), Category::ALL.len() - 1);
    }
}
