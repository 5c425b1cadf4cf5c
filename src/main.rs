use anyhow::Context;
use briefcast::aggregator::{Aggregator, CollectStories};
use briefcast::config::AppConfig;
use briefcast::fetcher::FetchConfig;
use briefcast::generator::{GenerateScript, HttpScriptGenerator};
use briefcast::orchestrator::{Orchestrator, RunOutcome, RunReport};
use briefcast::publisher::Publisher;
use briefcast::repository::{EpisodeRepository, PgEpisodeRepository};
use briefcast::schedule::Scheduler;
use briefcast::settings::{PgSettingsStore, SettingsStore};
use briefcast::storage::{HttpObjectStorage, ObjectStorage};
use briefcast::synthesizer::{HttpSpeechClient, Synthesizer};
use briefcast::types::{Category, EpisodeSummary};
use clap::{Parser, Subcommand};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "briefcast", about = "Generates daily audio news briefings per category")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a briefing now, for one category or for all enabled ones
    Run {
        #[arg(long)]
        category: Option<Category>,
    },
    /// Show the currently live episode(s)
    Live {
        #[arg(long)]
        category: Option<Category>,
    },
    /// Run the timer-driven scheduler until interrupted
    Scheduled,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("configuration")?;

    let pool = PgPool::connect(&config.database_url)
        .await
        .context("connecting to database")?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("applying migrations")?;

    let settings: Arc<dyn SettingsStore> = Arc::new(PgSettingsStore::new(pool.clone()));
    let repository: Arc<dyn EpisodeRepository> = Arc::new(PgEpisodeRepository::new(pool));
    let storage: Arc<dyn ObjectStorage> = Arc::new(HttpObjectStorage::new(&config.storage));
    let generator: Arc<dyn GenerateScript> =
        Arc::new(HttpScriptGenerator::new(config.generation.clone()));
    let aggregator: Arc<dyn CollectStories> = Arc::new(Aggregator::new(
        FetchConfig {
            timeout_seconds: config.feed_timeout_seconds,
            ..FetchConfig::default()
        },
        config.feed_timeout_seconds,
    ));
    let synthesizer = Synthesizer::new(
        Arc::new(HttpSpeechClient::new(&config.synthesis)),
        &config.synthesis,
    );
    let publisher = Publisher::new(storage, repository.clone());

    let orchestrator = Arc::new(Orchestrator::new(
        settings.clone(),
        aggregator,
        generator,
        synthesizer,
        publisher,
        repository,
        config.run_timeout_seconds,
    ));

    match cli.command {
        Command::Run { category } => {
            let reports = match category {
                Some(category) => vec![orchestrator.run_category(category).await],
                None => orchestrator.run_all().await?,
            };
            print_reports(&reports);

            if reports.iter().any(|r| !r.outcome.is_success()) {
                anyhow::bail!("one or more briefing runs failed");
            }
        }
        Command::Live { category } => {
            let episodes = orchestrator.live_episodes(category).await?;
            let summaries: Vec<EpisodeSummary> = episodes.iter().map(EpisodeSummary::from).collect();
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        Command::Scheduled => {
            info!("Starting scheduled generation loop");
            Scheduler::new(orchestrator, settings).run_forever().await?;
        }
    }

    Ok(())
}

fn print_reports(reports: &[RunReport]) {
    for report in reports {
        match &report.outcome {
            RunOutcome::Succeeded => {
                let title = report.episode.as_ref().map(|e| e.title.as_str()).unwrap_or("?");
                println!(
                    "{}: succeeded in {:.1}s ({})",
                    report.category,
                    report.elapsed.as_secs_f64(),
                    title
                );
            }
            RunOutcome::SucceededDegraded => {
                let title = report.episode.as_ref().map(|e| e.title.as_str()).unwrap_or("?");
                println!(
                    "{}: succeeded without audio in {:.1}s ({})",
                    report.category,
                    report.elapsed.as_secs_f64(),
                    title
                );
            }
            RunOutcome::Failed(e) => {
                println!(
                    "{}: failed in {:.1}s: {}",
                    report.category,
                    report.elapsed.as_secs_f64(),
                    e
                );
            }
        }
    }
}
