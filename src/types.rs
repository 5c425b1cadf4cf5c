use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed content verticals. Settings, feeds, and episodes are all
/// partitioned by category; the set is closed by design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    National,
    International,
    Business,
    Sports,
    Science,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::National,
        Category::International,
        Category::Business,
        Category::Sports,
        Category::Science,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::National => "national",
            Category::International => "international",
            Category::Business => "business",
            Category::Sports => "sports",
            Category::Science => "science",
        }
    }

    /// Human-readable name used in narration prompts and titles.
    pub fn display_name(&self) -> &'static str {
        match self {
            Category::National => "National",
            Category::International => "International",
            Category::Business => "Business",
            Category::Sports => "Sports",
            Category::Science => "Science",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = BriefingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "national" => Ok(Category::National),
            "international" => Ok(Category::International),
            "business" => Ok(Category::Business),
            "sports" => Ok(Category::Sports),
            "science" => Ok(Category::Science),
            other => Err(BriefingError::Configuration(format!(
                "unknown category: {}",
                other
            ))),
        }
    }
}

/// Morning or evening instance of a category's briefing for a given date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edition {
    Morning,
    Evening,
}

impl Edition {
    /// Derive the edition from a local hour of day. Anything before noon
    /// is a morning briefing.
    pub fn for_hour(hour: u32) -> Self {
        if hour < 12 {
            Edition::Morning
        } else {
            Edition::Evening
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Edition::Morning => "morning",
            Edition::Evening => "evening",
        }
    }
}

impl std::fmt::Display for Edition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Edition {
    type Err = BriefingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "morning" => Ok(Edition::Morning),
            "evening" => Ok(Edition::Evening),
            other => Err(BriefingError::Configuration(format!(
                "unknown edition: {}",
                other
            ))),
        }
    }
}

/// One external syndication endpoint contributing stories to a category.
/// Feeds can be disabled individually without being removed from the list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Per-category configuration, owned by an external admin surface and
/// read-only to the pipeline. Validated on read by the settings store.
#[derive(Debug, Clone)]
pub struct CategorySettings {
    pub category: Category,
    pub enabled: bool,
    pub feeds: Vec<FeedSource>,
    pub narrator_voice: String,
    pub stories_per_category: usize,
}

/// Global generation schedule: three local times of day in an IANA zone.
/// Only the scheduler loop consults this; manual runs ignore it.
#[derive(Debug, Clone)]
pub struct BriefingSchedule {
    pub times: [NaiveTime; 3],
    pub timezone: chrono_tz::Tz,
    pub auto_generate: bool,
}

impl Default for BriefingSchedule {
    fn default() -> Self {
        Self {
            times: [
                NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            ],
            timezone: chrono_tz::America::New_York,
            auto_generate: false,
        }
    }
}

/// A raw story pulled from a feed. Lives only within one pipeline run and
/// is never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedItem {
    pub title: String,
    pub summary: String,
    pub source_name: String,
    pub link: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// Narration text plus a title, as returned by the script generator.
#[derive(Debug, Clone)]
pub struct GeneratedScript {
    pub script_text: String,
    pub title: String,
}

/// Rendered audio plus a word-count-based duration estimate. The estimate
/// assumes roughly 150 spoken words per minute and must not be treated as
/// the measured length of the encoded audio.
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub audio: Vec<u8>,
    pub estimated_duration_minutes: f64,
}

/// Input to episode publication. Identity for upsert purposes is
/// `(category, brief_date, edition)`.
#[derive(Debug, Clone)]
pub struct NewEpisode {
    pub category: Category,
    pub edition: Edition,
    pub brief_date: NaiveDate,
    pub title: String,
    pub script_text: String,
    pub audio_url: Option<String>,
    pub duration_minutes: f64,
}

/// The durable artifact of a pipeline run. At most one episode per
/// category is live at any observable instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub id: Uuid,
    pub category: Category,
    pub edition: Edition,
    pub brief_date: NaiveDate,
    pub title: String,
    pub script_text: String,
    pub audio_url: Option<String>,
    pub duration_minutes: f64,
    pub is_live: bool,
    pub created_at: DateTime<Utc>,
    pub published_at: DateTime<Utc>,
}

/// Trimmed episode view reported back to the trigger caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub id: Uuid,
    pub category: Category,
    pub edition: Edition,
    pub title: String,
    pub audio_url: Option<String>,
    pub duration_minutes: f64,
}

impl From<&Episode> for EpisodeSummary {
    fn from(episode: &Episode) -> Self {
        Self {
            id: episode.id,
            category: episode.category,
            edition: episode.edition,
            title: episode.title.clone(),
            audio_url: episode.audio_url.clone(),
            duration_minutes: episode.duration_minutes,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BriefingError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Source unavailable: {source_name}: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    #[error("No stories available for category {category}")]
    NoContent { category: Category },

    #[error("Script generation failed: {0}")]
    Generation(String),

    #[error("Audio synthesis failed: {0}")]
    Synthesis(String),

    #[error("Publication failed: {0}")]
    Publish(String),

    #[error("Run exceeded {seconds}s wall-clock limit")]
    Timeout { seconds: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BriefingError>;
