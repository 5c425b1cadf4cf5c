use crate::types::{BriefingError, Result};
use std::env;
use tracing::debug;

/// Language-model service settings. The endpoint is any OpenAI-compatible
/// chat-completions URL.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f64,
    /// Allow the service to ground the script with live web search.
    pub web_search: bool,
}

/// Text-to-speech service settings.
#[derive(Debug, Clone)]
pub struct SynthesisConfig {
    pub api_url: String,
    pub api_key: String,
    /// Scripts longer than this are split into section chunks and
    /// synthesized per chunk.
    pub max_words_per_request: usize,
    /// Pause between chunk requests so third-party rate limits hold.
    pub inter_request_delay_ms: u64,
}

/// Durable object storage settings (S3-compatible REST surface).
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_token: String,
    /// Base for publicly resolvable URLs; falls back to the endpoint.
    pub public_base_url: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub generation: GenerationConfig,
    pub synthesis: SynthesisConfig,
    pub storage: StorageConfig,
    /// Hard wall-clock limit for one category run.
    pub run_timeout_seconds: u64,
    /// Budget for a single feed fetch inside the aggregator.
    pub feed_timeout_seconds: u64,
}

impl AppConfig {
    /// Build the configuration from the environment, failing before any
    /// external call when a required credential is missing.
    pub fn from_env() -> Result<Self> {
        let database_url = require_env("DATABASE_URL")?;

        let generation = GenerationConfig {
            api_url: env_or("LLM_API_URL", "https://api.openai.com/v1/chat/completions"),
            api_key: require_env("LLM_API_KEY")?,
            model: env_or("LLM_MODEL", "gpt-4o"),
            temperature: parse_env_or("LLM_TEMPERATURE", 0.7)?,
            web_search: parse_env_or("LLM_WEB_SEARCH", false)?,
        };

        let synthesis = SynthesisConfig {
            api_url: env_or("TTS_API_URL", "https://api.elevenlabs.io/v1/text-to-speech"),
            api_key: require_env("TTS_API_KEY")?,
            max_words_per_request: parse_env_or("TTS_MAX_WORDS_PER_REQUEST", 600)?,
            inter_request_delay_ms: parse_env_or("TTS_INTER_REQUEST_DELAY_MS", 500)?,
        };

        let storage_endpoint = require_env("STORAGE_ENDPOINT")?;
        let storage = StorageConfig {
            public_base_url: env_or("STORAGE_PUBLIC_URL", &storage_endpoint),
            endpoint: storage_endpoint,
            bucket: env_or("STORAGE_BUCKET", "briefings"),
            access_token: require_env("STORAGE_ACCESS_TOKEN")?,
        };

        // Endpoints must at least parse; a typo here should fail the run
        // before any external call, not during one.
        url::Url::parse(&generation.api_url)?;
        url::Url::parse(&synthesis.api_url)?;
        url::Url::parse(&storage.endpoint)?;

        let config = Self {
            database_url,
            generation,
            synthesis,
            storage,
            run_timeout_seconds: parse_env_or("RUN_TIMEOUT_SECONDS", 300)?,
            feed_timeout_seconds: parse_env_or("FEED_TIMEOUT_SECONDS", 10)?,
        };

        debug!(
            "Loaded configuration (model: {}, bucket: {})",
            config.generation.model, config.storage.bucket
        );
        Ok(config)
    }
}

fn require_env(name: &str) -> Result<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(BriefingError::Configuration(format!(
            "missing required environment variable: {}",
            name
        ))),
    }
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).ok().filter(|v| !v.trim().is_empty()).unwrap_or_else(|| default.to_string())
}

fn parse_env_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|e| {
            BriefingError::Configuration(format!("invalid value for {}: {}", name, e))
        }),
        Err(_) => Ok(default),
    }
}
