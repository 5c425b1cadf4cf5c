use crate::config::SynthesisConfig;
use crate::types::{BriefingError, Result, SynthesizedAudio};
use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::exponential::ExponentialBackoff;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Spoken-word rate used to estimate briefing length from the script.
/// The estimate is approximate; nothing downstream may treat it as the
/// measured length of the encoded audio.
const WORDS_PER_MINUTE: f64 = 150.0;

/// Trait for rendering one block of text to audio bytes with a given
/// narrator voice.
#[async_trait]
pub trait SynthesizeSpeech: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>>;
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
}

/// Text-to-speech client over an ElevenLabs-style REST endpoint: one POST
/// per request, voice id in the path, raw audio bytes back.
pub struct HttpSpeechClient {
    client: Client,
    api_url: String,
    api_key: String,
}

impl HttpSpeechClient {
    pub fn new(config: &SynthesisConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl SynthesizeSpeech for HttpSpeechClient {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>> {
        let url = format!("{}/{}", self.api_url.trim_end_matches('/'), voice);

        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: Duration::from_millis(750),
            initial_interval: Duration::from_millis(750),
            max_interval: Duration::from_secs(6),
            multiplier: 2.0,
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        let mut last_reason = String::from("no synthesis attempt completed");

        for attempt in 0..3 {
            let result = self
                .client
                .post(&url)
                .header("xi-api-key", &self.api_key)
                .json(&SpeechRequest { text })
                .send()
                .await;

            match result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let bytes = response
                            .bytes()
                            .await
                            .map_err(|e| BriefingError::Synthesis(e.to_string()))?;
                        debug!("Synthesized {} chars into {} bytes", text.len(), bytes.len());
                        return Ok(bytes.to_vec());
                    }

                    let retryable = status.is_server_error()
                        || status == reqwest::StatusCode::TOO_MANY_REQUESTS;
                    last_reason = format!("service returned {}", status);
                    if !retryable {
                        break;
                    }
                }
                Err(e) => {
                    last_reason = e.to_string();
                }
            }

            if attempt < 2 {
                if let Some(delay) = backoff.next_backoff() {
                    warn!("Synthesis attempt {} failed ({}), retrying in {:?}", attempt + 1, last_reason, delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }

        Err(BriefingError::Synthesis(last_reason))
    }
}

/// Renders a full script to audio, splitting long scripts into section
/// chunks that each fit the per-request word limit and concatenating the
/// resulting buffers in order.
pub struct Synthesizer {
    client: Arc<dyn SynthesizeSpeech>,
    max_words_per_request: usize,
    inter_request_delay: Duration,
}

impl Synthesizer {
    pub fn new(client: Arc<dyn SynthesizeSpeech>, config: &SynthesisConfig) -> Self {
        Self {
            client,
            max_words_per_request: config.max_words_per_request.max(1),
            inter_request_delay: Duration::from_millis(config.inter_request_delay_ms),
        }
    }

    pub async fn render(&self, script_text: &str, voice: &str) -> Result<SynthesizedAudio> {
        let chunks = split_into_chunks(script_text, self.max_words_per_request);
        info!(
            "Rendering script ({} words) in {} chunk(s) with voice {}",
            word_count(script_text),
            chunks.len(),
            voice
        );

        let mut audio = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i > 0 {
                // Space out chunk requests for third-party rate limits.
                tokio::time::sleep(self.inter_request_delay).await;
            }

            let bytes = self.client.synthesize(chunk, voice).await?;
            debug!("Chunk {}/{} rendered ({} bytes)", i + 1, chunks.len(), bytes.len());
            audio.extend_from_slice(&bytes);
        }

        Ok(SynthesizedAudio {
            audio,
            estimated_duration_minutes: estimate_duration_minutes(script_text),
        })
    }
}

/// Estimate spoken duration from word count at roughly 150 words/minute.
pub fn estimate_duration_minutes(text: &str) -> f64 {
    word_count(text) as f64 / WORDS_PER_MINUTE
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Split a script into chunks of at most `max_words` words.
///
/// Paragraphs are the preferred section boundary; a paragraph that alone
/// exceeds the limit is split at sentence boundaries, and a run-on
/// sentence is hard-split by words as a last resort. Chunk order follows
/// script order so the concatenated audio reads straight through.
pub fn split_into_chunks(text: &str, max_words: usize) -> Vec<String> {
    if word_count(text) <= max_words {
        return vec![text.trim().to_string()];
    }

    let mut pieces: Vec<String> = Vec::new();
    for paragraph in text.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }

        if word_count(paragraph) <= max_words {
            pieces.push(paragraph.to_string());
        } else {
            pieces.extend(split_sentences(paragraph, max_words));
        }
    }

    // Greedily regroup pieces so each request carries as much of the
    // script as the limit allows.
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_words = 0;

    for piece in pieces {
        let piece_words = word_count(&piece);

        if current_words > 0 && current_words + piece_words > max_words {
            chunks.push(current.clone());
            current.clear();
            current_words = 0;
        }

        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(&piece);
        current_words += piece_words;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

fn split_sentences(paragraph: &str, max_words: usize) -> Vec<String> {
    let mut sentences: Vec<String> = Vec::new();

    for sentence in paragraph.split_inclusive(['.', '!', '?']) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }

        if word_count(sentence) <= max_words {
            sentences.push(sentence.to_string());
        } else {
            // Run-on text with no usable boundaries; split by raw words.
            let words: Vec<&str> = sentence.split_whitespace().collect();
            for window in words.chunks(max_words) {
                sentences.push(window.join(" "));
            }
        }
    }

    sentences
}

/// Test double that returns a fixed byte marker per request, records the
/// chunks it was asked to render, or fails on demand.
pub struct MockSpeechClient {
    fail: bool,
    bytes_per_request: Vec<u8>,
    pub requests: tokio::sync::Mutex<Vec<String>>,
}

impl MockSpeechClient {
    pub fn new() -> Self {
        Self {
            fail: false,
            bytes_per_request: vec![0xAA, 0xBB, 0xCC],
            requests: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            bytes_per_request: Vec::new(),
            requests: tokio::sync::Mutex::new(Vec::new()),
        }
    }
}

impl Default for MockSpeechClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SynthesizeSpeech for MockSpeechClient {
    async fn synthesize(&self, text: &str, _voice: &str) -> Result<Vec<u8>> {
        if self.fail {
            return Err(BriefingError::Synthesis("mock synthesis failure".to_string()));
        }

        self.requests.lock().await.push(text.to_string());
        Ok(self.bytes_per_request.clone())
    }
}
