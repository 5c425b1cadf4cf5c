use async_trait::async_trait;
use briefcast::aggregator::CollectStories;
use briefcast::config::SynthesisConfig;
use briefcast::generator::MockScriptGenerator;
use briefcast::orchestrator::{Orchestrator, RunOutcome};
use briefcast::publisher::Publisher;
use briefcast::repository::{EpisodeRepository, MemoryEpisodeRepository};
use briefcast::settings::MemorySettingsStore;
use briefcast::storage::{MemoryObjectStorage, ObjectStorage};
use briefcast::synthesizer::{MockSpeechClient, SynthesizeSpeech, Synthesizer};
use briefcast::types::{BriefingError, Category, FeedItem, NewEpisode};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::info;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .try_init();
}

fn stories(count: usize) -> Vec<FeedItem> {
    (0..count)
        .map(|i| FeedItem {
            title: format!("Story number {} makes headlines", i),
            summary: format!("Detailed summary of story number {} with several facts.", i),
            source_name: "Test Wire".to_string(),
            link: format!("https://example.com/story/{}", i),
            published_at: None,
        })
        .collect()
}

/// Collector returning canned items, with an optional category that
/// yields nothing.
struct CannedStories {
    items: Vec<FeedItem>,
    empty_for: Option<Category>,
}

#[async_trait]
impl CollectStories for CannedStories {
    async fn collect_for(&self, category: Category, _feeds: &[briefcast::types::FeedSource]) -> Vec<FeedItem> {
        if self.empty_for == Some(category) {
            Vec::new()
        } else {
            self.items.clone()
        }
    }
}

/// Collector that hangs long enough to trip the run timeout.
struct StalledCollector;

#[async_trait]
impl CollectStories for StalledCollector {
    async fn collect_for(&self, _category: Category, _feeds: &[briefcast::types::FeedSource]) -> Vec<FeedItem> {
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        Vec::new()
    }
}

fn synthesis_config() -> SynthesisConfig {
    SynthesisConfig {
        api_url: "https://tts.invalid/v1/text-to-speech".to_string(),
        api_key: "test-key".to_string(),
        max_words_per_request: 600,
        inter_request_delay_ms: 0,
    }
}

fn orchestrator_with(
    collector: Arc<dyn CollectStories>,
    speech: Arc<dyn SynthesizeSpeech>,
    repository: Arc<MemoryEpisodeRepository>,
    storage: Arc<MemoryObjectStorage>,
    run_timeout_seconds: u64,
) -> Orchestrator {
    let settings = Arc::new(MemorySettingsStore::new());
    let repo_dyn: Arc<dyn EpisodeRepository> = repository;
    let storage_dyn: Arc<dyn ObjectStorage> = storage;

    Orchestrator::new(
        settings,
        collector,
        Arc::new(MockScriptGenerator::new()),
        Synthesizer::new(speech, &synthesis_config()),
        Publisher::new(storage_dyn, repo_dyn.clone()),
        repo_dyn,
        run_timeout_seconds,
    )
}

#[tokio::test]
async fn successful_run_publishes_one_live_episode() {
    init_tracing();
    info!("Testing a plain successful run");

    let repository = Arc::new(MemoryEpisodeRepository::new());
    let storage = Arc::new(MemoryObjectStorage::new());
    let orchestrator = orchestrator_with(
        Arc::new(CannedStories { items: stories(6), empty_for: None }),
        Arc::new(MockSpeechClient::new()),
        repository.clone(),
        storage.clone(),
        30,
    );

    let report = orchestrator.run_category(Category::Business).await;

    assert!(matches!(report.outcome, RunOutcome::Succeeded), "outcome: {:?}", report.outcome);
    let episode = report.episode.expect("successful run should carry an episode summary");
    assert!(episode.audio_url.is_some(), "audio should be uploaded");
    assert!(episode.duration_minutes > 0.0);
    assert_eq!(storage.object_count().await, 1);

    let live = repository.live_episode(Category::Business).await.unwrap();
    assert!(live.is_some(), "exactly one episode should be live");
}

#[tokio::test]
async fn concurrent_same_category_runs_leave_exactly_one_live() {
    init_tracing();
    info!("Testing the one-live invariant under concurrent runs");

    let repository = Arc::new(MemoryEpisodeRepository::new());
    let storage = Arc::new(MemoryObjectStorage::new());
    let orchestrator = orchestrator_with(
        Arc::new(CannedStories { items: stories(5), empty_for: None }),
        Arc::new(MockSpeechClient::new()),
        repository.clone(),
        storage.clone(),
        30,
    );

    let (first, second) = tokio::join!(
        orchestrator.run_category(Category::Science),
        orchestrator.run_category(Category::Science),
    );
    assert!(first.outcome.is_success() && second.outcome.is_success());

    let live: Vec<_> = repository
        .all_episodes()
        .await
        .into_iter()
        .filter(|e| e.category == Category::Science && e.is_live)
        .collect();
    assert_eq!(live.len(), 1, "two concurrent runs must not leave two live episodes");
}

#[tokio::test]
async fn concurrent_publications_for_different_slots_keep_one_live() {
    init_tracing();

    let repository = Arc::new(MemoryEpisodeRepository::new());
    let episode = |date: NaiveDate, edition| NewEpisode {
        category: Category::National,
        edition,
        brief_date: date,
        title: "Test briefing".to_string(),
        script_text: "A short script.".to_string(),
        audio_url: None,
        duration_minutes: 1.0,
    };

    let monday = NaiveDate::from_ymd_opt(2026, 8, 3).unwrap();
    let tuesday = NaiveDate::from_ymd_opt(2026, 8, 4).unwrap();
    let (a, b) = tokio::join!(
        repository.publish_live(episode(monday, briefcast::types::Edition::Morning)),
        repository.publish_live(episode(tuesday, briefcast::types::Edition::Evening)),
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(repository.episode_count().await, 2, "distinct slots keep distinct rows");
    let live = repository.live_episodes().await.unwrap();
    assert_eq!(live.len(), 1, "only the later promotion stays live");
}

#[tokio::test]
async fn no_stories_fails_the_run_and_writes_nothing() {
    init_tracing();
    info!("Testing the no-content failure path");

    let repository = Arc::new(MemoryEpisodeRepository::new());
    let storage = Arc::new(MemoryObjectStorage::new());
    let orchestrator = orchestrator_with(
        Arc::new(CannedStories { items: Vec::new(), empty_for: None }),
        Arc::new(MockSpeechClient::new()),
        repository.clone(),
        storage.clone(),
        30,
    );

    let report = orchestrator.run_category(Category::Sports).await;

    assert!(
        matches!(report.outcome, RunOutcome::Failed(BriefingError::NoContent { .. })),
        "outcome: {:?}",
        report.outcome
    );
    assert_eq!(repository.episode_count().await, 0, "no episode may be written");
    assert_eq!(storage.object_count().await, 0);
}

#[tokio::test]
async fn synthesis_failure_degrades_to_script_only_episode() {
    init_tracing();
    info!("Testing the degraded (script-only) path");

    let repository = Arc::new(MemoryEpisodeRepository::new());
    let storage = Arc::new(MemoryObjectStorage::new());
    let orchestrator = orchestrator_with(
        Arc::new(CannedStories { items: stories(4), empty_for: None }),
        Arc::new(MockSpeechClient::failing()),
        repository.clone(),
        storage.clone(),
        30,
    );

    let report = orchestrator.run_category(Category::International).await;

    assert!(matches!(report.outcome, RunOutcome::SucceededDegraded), "outcome: {:?}", report.outcome);

    let episode = repository
        .live_episode(Category::International)
        .await
        .unwrap()
        .expect("degraded run still publishes");
    assert!(episode.audio_url.is_none(), "degraded episode has no audio URL");
    assert!(!episode.script_text.is_empty(), "script must survive");
    assert_eq!(storage.object_count().await, 0, "nothing should reach storage");
}

#[tokio::test]
async fn failed_upload_still_publishes_script_only() {
    init_tracing();

    let repository = Arc::new(MemoryEpisodeRepository::new());
    let storage = Arc::new(MemoryObjectStorage::failing());
    let orchestrator = orchestrator_with(
        Arc::new(CannedStories { items: stories(4), empty_for: None }),
        Arc::new(MockSpeechClient::new()),
        repository.clone(),
        storage.clone(),
        30,
    );

    let report = orchestrator.run_category(Category::National).await;

    assert!(matches!(report.outcome, RunOutcome::SucceededDegraded), "outcome: {:?}", report.outcome);
    let episode = repository.live_episode(Category::National).await.unwrap().unwrap();
    assert!(episode.audio_url.is_none());
}

#[tokio::test]
async fn rerunning_the_same_slot_replaces_instead_of_duplicating() {
    init_tracing();
    info!("Testing rerun idempotency per (category, date, edition)");

    let repository = Arc::new(MemoryEpisodeRepository::new());
    let storage = Arc::new(MemoryObjectStorage::new());
    let orchestrator = orchestrator_with(
        Arc::new(CannedStories { items: stories(5), empty_for: None }),
        Arc::new(MockSpeechClient::new()),
        repository.clone(),
        storage.clone(),
        30,
    );

    let first = orchestrator.run_category(Category::Business).await;
    let second = orchestrator.run_category(Category::Business).await;
    assert!(first.outcome.is_success() && second.outcome.is_success());

    assert_eq!(
        repository.episode_count().await,
        1,
        "rerun of the same slot must upsert, not insert"
    );
    assert_eq!(
        storage.object_count().await,
        1,
        "rerun must overwrite the same storage key"
    );

    let first_id = first.episode.unwrap().id;
    let second_id = second.episode.unwrap().id;
    assert_eq!(first_id, second_id, "the slot keeps its row identity across reruns");
}

#[tokio::test]
async fn repository_failure_is_a_fatal_publish_error() {
    init_tracing();

    let repository = Arc::new(MemoryEpisodeRepository::failing());
    let storage = Arc::new(MemoryObjectStorage::new());
    let orchestrator = orchestrator_with(
        Arc::new(CannedStories { items: stories(3), empty_for: None }),
        Arc::new(MockSpeechClient::new()),
        repository,
        storage.clone(),
        30,
    );

    let report = orchestrator.run_category(Category::Science).await;
    assert!(
        matches!(report.outcome, RunOutcome::Failed(BriefingError::Publish(_))),
        "outcome: {:?}",
        report.outcome
    );
    // The orphaned upload is acceptable; its deterministic key is
    // overwritten by the next successful rerun.
    assert_eq!(storage.object_count().await, 1);
}

#[tokio::test]
async fn stalled_run_times_out() {
    init_tracing();
    info!("Testing the hard wall-clock timeout");

    let repository = Arc::new(MemoryEpisodeRepository::new());
    let storage = Arc::new(MemoryObjectStorage::new());
    let orchestrator = orchestrator_with(
        Arc::new(StalledCollector),
        Arc::new(MockSpeechClient::new()),
        repository.clone(),
        storage,
        1,
    );

    let report = orchestrator.run_category(Category::Sports).await;

    assert!(
        matches!(report.outcome, RunOutcome::Failed(BriefingError::Timeout { seconds: 1 })),
        "outcome: {:?}",
        report.outcome
    );
    assert!(report.elapsed.as_secs() < 5, "timeout must cut the run short");
    assert_eq!(repository.episode_count().await, 0);
}

#[tokio::test]
async fn run_all_continues_past_a_failing_category() {
    init_tracing();
    info!("Testing run-all isolation between categories");

    let repository = Arc::new(MemoryEpisodeRepository::new());
    let storage = Arc::new(MemoryObjectStorage::new());
    let orchestrator = orchestrator_with(
        Arc::new(CannedStories {
            items: stories(5),
            empty_for: Some(Category::Sports),
        }),
        Arc::new(MockSpeechClient::new()),
        repository.clone(),
        storage,
        30,
    );

    let reports = orchestrator.run_all().await.unwrap();
    assert_eq!(reports.len(), Category::ALL.len());

    for report in &reports {
        if report.category == Category::Sports {
            assert!(
                matches!(report.outcome, RunOutcome::Failed(BriefingError::NoContent { .. })),
                "sports should fail with no content"
            );
        } else {
            assert!(report.outcome.is_success(), "{} should succeed", report.category);
        }
    }

    let live = repository.live_episodes().await.unwrap();
    assert_eq!(live.len(), Category::ALL.len() - 1, "every succeeding category goes live");
}
