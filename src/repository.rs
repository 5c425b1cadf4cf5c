use crate::types::{Category, Episode, NewEpisode, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// Trait over the episode datastore.
///
/// `publish_live` carries the pipeline's one invariant: after it returns,
/// the new episode is live and no other episode of that category is. The
/// upsert identity is `(category, brief_date, edition)`, so rerunning a
/// slot replaces its row instead of duplicating it.
#[async_trait]
pub trait EpisodeRepository: Send + Sync {
    /// Upsert the episode for its slot and make it the category's only
    /// live episode, atomically with respect to concurrent publications
    /// for the same category.
    async fn publish_live(&self, episode: NewEpisode) -> Result<Episode>;

    /// The currently live episode for one category, if any.
    async fn live_episode(&self, category: Category) -> Result<Option<Episode>>;

    /// All currently live episodes across categories.
    async fn live_episodes(&self) -> Result<Vec<Episode>>;

    /// Recent episodes for a category, newest first. Non-live episodes
    /// are retained for transcript viewing, never resurrected.
    async fn recent_episodes(&self, category: Category, limit: usize) -> Result<Vec<Episode>>;
}

/// Postgres-backed repository.
pub struct PgEpisodeRepository {
    pool: PgPool,
}

impl PgEpisodeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_episode(row: &PgRow) -> Result<Episode> {
    let category: String = row.try_get("category")?;
    let edition: String = row.try_get("edition")?;

    Ok(Episode {
        id: row.try_get("id")?,
        category: Category::from_str(&category)?,
        edition: edition.parse()?,
        brief_date: row.try_get("brief_date")?,
        title: row.try_get("title")?,
        script_text: row.try_get("script_text")?,
        audio_url: row.try_get("audio_url")?,
        duration_minutes: row.try_get("duration_minutes")?,
        is_live: row.try_get("is_live")?,
        created_at: row.try_get("created_at")?,
        published_at: row.try_get("published_at")?,
    })
}

#[async_trait]
impl EpisodeRepository for PgEpisodeRepository {
    async fn publish_live(&self, episode: NewEpisode) -> Result<Episode> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // Serialize publications per category. Two concurrent runs for
        // the same category queue on this lock, so neither can observe
        // the other's half-finished promotion.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(episode.category.as_str())
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query(
            r#"
            INSERT INTO episodes
                (id, category, edition, brief_date, title, script_text,
                 audio_url, duration_minutes, is_live, created_at, published_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, true, $9, $9)
            ON CONFLICT (category, brief_date, edition) DO UPDATE SET
                title = EXCLUDED.title,
                script_text = EXCLUDED.script_text,
                audio_url = EXCLUDED.audio_url,
                duration_minutes = EXCLUDED.duration_minutes,
                is_live = true,
                published_at = EXCLUDED.published_at
            RETURNING id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(episode.category.as_str())
        .bind(episode.edition.as_str())
        .bind(episode.brief_date)
        .bind(&episode.title)
        .bind(&episode.script_text)
        .bind(&episode.audio_url)
        .bind(episode.duration_minutes)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let id: Uuid = row.try_get("id")?;
        let created_at = row.try_get("created_at")?;

        let demoted = sqlx::query(
            "UPDATE episodes SET is_live = false WHERE category = $1 AND id <> $2 AND is_live = true",
        )
        .bind(episode.category.as_str())
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        info!(
            "Published live episode {} for {} ({} demoted)",
            id, episode.category, demoted
        );

        Ok(Episode {
            id,
            category: episode.category,
            edition: episode.edition,
            brief_date: episode.brief_date,
            title: episode.title,
            script_text: episode.script_text,
            audio_url: episode.audio_url,
            duration_minutes: episode.duration_minutes,
            is_live: true,
            created_at,
            published_at: now,
        })
    }

    async fn live_episode(&self, category: Category) -> Result<Option<Episode>> {
        let row = sqlx::query("SELECT * FROM episodes WHERE category = $1 AND is_live = true")
            .bind(category.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(map_episode).transpose()
    }

    async fn live_episodes(&self) -> Result<Vec<Episode>> {
        let rows = sqlx::query("SELECT * FROM episodes WHERE is_live = true ORDER BY category")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(map_episode).collect()
    }

    async fn recent_episodes(&self, category: Category, limit: usize) -> Result<Vec<Episode>> {
        let rows = sqlx::query(
            "SELECT * FROM episodes WHERE category = $1 ORDER BY published_at DESC LIMIT $2",
        )
        .bind(category.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_episode).collect()
    }
}

/// In-memory repository with the same promotion semantics, used by tests
/// to prove the one-live invariant without a database. The whole
/// publication happens under one mutex guard, mirroring the per-category
/// transaction of the Postgres implementation.
pub struct MemoryEpisodeRepository {
    fail: bool,
    episodes: tokio::sync::Mutex<Vec<Episode>>,
}

impl MemoryEpisodeRepository {
    pub fn new() -> Self {
        Self {
            fail: false,
            episodes: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            episodes: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    pub async fn episode_count(&self) -> usize {
        self.episodes.lock().await.len()
    }

    pub async fn all_episodes(&self) -> Vec<Episode> {
        self.episodes.lock().await.clone()
    }
}

impl Default for MemoryEpisodeRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EpisodeRepository for MemoryEpisodeRepository {
    async fn publish_live(&self, episode: NewEpisode) -> Result<Episode> {
        if self.fail {
            return Err(crate::types::BriefingError::Publish(
                "mock repository failure".to_string(),
            ));
        }

        let now = Utc::now();
        let mut episodes = self.episodes.lock().await;

        // Demote everything else in the category before inserting, all
        // under the same lock.
        for existing in episodes.iter_mut() {
            if existing.category == episode.category {
                existing.is_live = false;
            }
        }

        let slot = episodes.iter_mut().find(|e| {
            e.category == episode.category
                && e.brief_date == episode.brief_date
                && e.edition == episode.edition
        });

        let published = match slot {
            Some(existing) => {
                debug!("Upserting existing slot for {}", episode.category);
                existing.title = episode.title;
                existing.script_text = episode.script_text;
                existing.audio_url = episode.audio_url;
                existing.duration_minutes = episode.duration_minutes;
                existing.is_live = true;
                existing.published_at = now;
                existing.clone()
            }
            None => {
                let created = Episode {
                    id: Uuid::new_v4(),
                    category: episode.category,
                    edition: episode.edition,
                    brief_date: episode.brief_date,
                    title: episode.title,
                    script_text: episode.script_text,
                    audio_url: episode.audio_url,
                    duration_minutes: episode.duration_minutes,
                    is_live: true,
                    created_at: now,
                    published_at: now,
                };
                episodes.push(created.clone());
                created
            }
        };

        Ok(published)
    }

    async fn live_episode(&self, category: Category) -> Result<Option<Episode>> {
        let episodes = self.episodes.lock().await;
        Ok(episodes
            .iter()
            .find(|e| e.category == category && e.is_live)
            .cloned())
    }

    async fn live_episodes(&self) -> Result<Vec<Episode>> {
        let episodes = self.episodes.lock().await;
        Ok(episodes.iter().filter(|e| e.is_live).cloned().collect())
    }

    async fn recent_episodes(&self, category: Category, limit: usize) -> Result<Vec<Episode>> {
        let episodes = self.episodes.lock().await;
        let mut matching: Vec<Episode> = episodes
            .iter()
            .filter(|e| e.category == category)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        matching.truncate(limit);
        Ok(matching)
    }
}
