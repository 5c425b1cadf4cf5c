use crate::aggregator::CollectStories;
use crate::generator::{GenerateScript, ScriptRequest};
use crate::publisher::Publisher;
use crate::repository::EpisodeRepository;
use crate::selector;
use crate::settings::SettingsStore;
use crate::synthesizer::Synthesizer;
use crate::types::{BriefingError, Category, Edition, Episode, EpisodeSummary, Result};
use chrono::{DateTime, Timelike, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Stages of one category run, in execution order. Used for log
/// narration; the terminal states live in [`RunOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Fetching,
    Selecting,
    Scripting,
    Synthesizing,
    Publishing,
}

impl std::fmt::Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunStage::Fetching => "fetching",
            RunStage::Selecting => "selecting",
            RunStage::Scripting => "scripting",
            RunStage::Synthesizing => "synthesizing",
            RunStage::Publishing => "publishing",
        };
        f.write_str(name)
    }
}

/// Terminal state of one category run.
#[derive(Debug)]
pub enum RunOutcome {
    /// Script and audio both published.
    Succeeded,
    /// Script published without audio (synthesis or upload failed).
    SucceededDegraded,
    Failed(BriefingError),
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, RunOutcome::Failed(_))
    }
}

/// What the trigger caller gets back for one category run.
#[derive(Debug)]
pub struct RunReport {
    pub category: Category,
    pub outcome: RunOutcome,
    pub episode: Option<EpisodeSummary>,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

/// Sequences the five pipeline stages for one category and bounds the
/// whole run with a hard wall-clock timeout. Categories are independent;
/// only same-category publications contend, and they serialize inside the
/// repository.
pub struct Orchestrator {
    settings: Arc<dyn SettingsStore>,
    aggregator: Arc<dyn CollectStories>,
    generator: Arc<dyn GenerateScript>,
    synthesizer: Synthesizer,
    publisher: Publisher,
    repository: Arc<dyn EpisodeRepository>,
    run_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        aggregator: Arc<dyn CollectStories>,
        generator: Arc<dyn GenerateScript>,
        synthesizer: Synthesizer,
        publisher: Publisher,
        repository: Arc<dyn EpisodeRepository>,
        run_timeout_seconds: u64,
    ) -> Self {
        Self {
            settings,
            aggregator,
            generator,
            synthesizer,
            publisher,
            repository,
            run_timeout: Duration::from_secs(run_timeout_seconds),
        }
    }

    /// Run the full pipeline for one category and report the outcome.
    /// Never panics and never returns Err; failures land in the report.
    pub async fn run_category(&self, category: Category) -> RunReport {
        let started_at = Utc::now();
        let start = Instant::now();
        info!("Starting briefing run for {}", category);

        let outcome = match tokio::time::timeout(self.run_timeout, self.execute(category)).await {
            Ok(Ok(episode)) => {
                let degraded = episode.audio_url.is_none();
                let summary = EpisodeSummary::from(&episode);
                if degraded {
                    warn!("Run for {} completed degraded (script only)", category);
                    (RunOutcome::SucceededDegraded, Some(summary))
                } else {
                    info!("Run for {} completed", category);
                    (RunOutcome::Succeeded, Some(summary))
                }
            }
            Ok(Err(e)) => {
                error!("Run for {} failed: {}", category, e);
                (RunOutcome::Failed(e), None)
            }
            Err(_) => {
                // A partial upload left behind here is overwritten by the
                // next successful rerun of the same slot.
                let seconds = self.run_timeout.as_secs();
                error!("Run for {} timed out after {}s", category, seconds);
                (RunOutcome::Failed(BriefingError::Timeout { seconds }), None)
            }
        };

        RunReport {
            category,
            outcome: outcome.0,
            episode: outcome.1,
            started_at,
            elapsed: start.elapsed(),
        }
    }

    async fn execute(&self, category: Category) -> Result<Episode> {
        let settings = self.settings.category_settings(category).await?;
        if !settings.enabled {
            return Err(BriefingError::Configuration(format!(
                "category {} is disabled",
                category
            )));
        }

        // Edition and date come from the configured zone, not the host's.
        let schedule = self.settings.schedule().await?;
        let now_local = Utc::now().with_timezone(&schedule.timezone);
        let edition = Edition::for_hour(now_local.hour());
        let brief_date = now_local.date_naive();

        info!("[{}] stage: {}", category, RunStage::Fetching);
        let items = self.aggregator.collect_for(category, &settings.feeds).await;

        info!("[{}] stage: {}", category, RunStage::Selecting);
        let stories = selector::select(items, settings.stories_per_category);
        if stories.is_empty() {
            return Err(BriefingError::NoContent { category });
        }

        info!("[{}] stage: {}", category, RunStage::Scripting);
        let script = self
            .generator
            .generate(&ScriptRequest {
                category,
                edition,
                brief_date,
                stories,
            })
            .await?;

        info!("[{}] stage: {}", category, RunStage::Synthesizing);
        let audio = match self
            .synthesizer
            .render(&script.script_text, &settings.narrator_voice)
            .await
        {
            Ok(audio) => Some(audio),
            Err(e) => {
                // Degraded path: a script-only episode still publishes.
                warn!("[{}] synthesis failed, continuing without audio: {}", category, e);
                None
            }
        };

        info!("[{}] stage: {}", category, RunStage::Publishing);
        self.publisher
            .publish(category, edition, brief_date, script, audio)
            .await
    }

    /// Run every enabled category sequentially. One category's failure is
    /// recorded in its report and the iteration continues; bounding
    /// simultaneous load on the external services is the point of going
    /// one at a time.
    pub async fn run_all(&self) -> Result<Vec<RunReport>> {
        let categories = self.settings.enabled_categories().await?;
        info!("Running all {} enabled categories", categories.len());

        let mut reports = Vec::with_capacity(categories.len());
        for category in categories {
            reports.push(self.run_category(category).await);
        }

        let failures = reports.iter().filter(|r| !r.outcome.is_success()).count();
        info!(
            "Run-all finished: {}/{} categories succeeded",
            reports.len() - failures,
            reports.len()
        );
        Ok(reports)
    }

    /// Read-only trigger companion: the current live episode(s).
    pub async fn live_episodes(&self, category: Option<Category>) -> Result<Vec<Episode>> {
        match category {
            Some(category) => Ok(self
                .repository
                .live_episode(category)
                .await?
                .into_iter()
                .collect()),
            None => self.repository.live_episodes().await,
        }
    }
}
