pub mod aggregator;
pub mod config;
pub mod fetcher;
pub mod generator;
pub mod orchestrator;
pub mod parser;
pub mod publisher;
pub mod repository;
pub mod schedule;
pub mod selector;
pub mod settings;
pub mod storage;
pub mod synthesizer;
pub mod types;

pub use aggregator::{Aggregator, CollectStories, FetchFeed, HttpFeedSource};
pub use config::AppConfig;
pub use fetcher::{DocumentFetcher, FetchConfig};
pub use generator::{GenerateScript, HttpScriptGenerator, MockScriptGenerator, ScriptRequest};
pub use orchestrator::{Orchestrator, RunOutcome, RunReport, RunStage};
pub use publisher::Publisher;
pub use repository::{EpisodeRepository, MemoryEpisodeRepository, PgEpisodeRepository};
pub use schedule::Scheduler;
pub use settings::{MemorySettingsStore, PgSettingsStore, SettingsStore};
pub use storage::{HttpObjectStorage, MemoryObjectStorage, ObjectStorage};
pub use synthesizer::{HttpSpeechClient, MockSpeechClient, SynthesizeSpeech, Synthesizer};
pub use types::*;
