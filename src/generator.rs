use crate::config::GenerationConfig;
use crate::types::{BriefingError, Category, Edition, FeedItem, GeneratedScript, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Everything the generator needs to narrate one briefing.
#[derive(Debug, Clone)]
pub struct ScriptRequest {
    pub category: Category,
    pub edition: Edition,
    pub brief_date: NaiveDate,
    pub stories: Vec<FeedItem>,
}

/// Trait for producing a narration script from selected stories. A
/// service error or empty response is fatal to the run; there is no
/// fallback script.
#[async_trait]
pub trait GenerateScript: Send + Sync {
    async fn generate(&self, request: &ScriptRequest) -> Result<GeneratedScript>;
}

/// Script generator backed by an OpenAI-compatible chat-completions
/// endpoint.
pub struct HttpScriptGenerator {
    client: Client,
    config: GenerationConfig,
}

impl HttpScriptGenerator {
    pub fn new(config: GenerationConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }
}

#[async_trait]
impl GenerateScript for HttpScriptGenerator {
    async fn generate(&self, request: &ScriptRequest) -> Result<GeneratedScript> {
        info!(
            "Generating {} {} script for {} stories",
            request.category,
            request.edition,
            request.stories.len()
        );

        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: build_prompt(request),
                },
            ],
            temperature: self.config.temperature,
            web_search_options: self.config.web_search.then(|| serde_json::json!({})),
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| BriefingError::Generation(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(BriefingError::Generation(format!(
                "service returned {}: {}",
                status,
                detail.chars().take(200).collect::<String>()
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| BriefingError::Generation(format!("unreadable response: {}", e)))?;

        let raw = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        finish_script(&raw, request)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    web_search_options: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

const SYSTEM_PROMPT: &str = "You are the narrator of a short daily audio news briefing. \
Write plain spoken prose only: no markdown, no lists, no stage directions, no sound cues. \
The script will be read aloud verbatim by a text-to-speech voice.";

/// Compose the structured prompt: fixed-form greeting, the selected
/// stories with their source material, narration rules, fixed-form
/// sign-off, and the one-line title header we parse back out.
fn build_prompt(request: &ScriptRequest) -> String {
    let date_text = request.brief_date.format("%A, %B %-d, %Y");
    let mut prompt = String::new();

    prompt.push_str(&format!(
        "Write the {} edition of the {} news briefing for {}.\n\n",
        request.edition,
        request.category.display_name(),
        date_text
    ));

    prompt.push_str("Stories to cover, in this order:\n\n");
    for (i, story) in request.stories.iter().enumerate() {
        prompt.push_str(&format!(
            "{}. {} (source: {})\n{}\n\n",
            i + 1,
            story.title,
            story.source_name,
            story.summary
        ));
    }

    prompt.push_str(&format!(
        "Rules:\n\
         - Begin the first line with \"TITLE: \" followed by a short headline-style title for this briefing, then a blank line.\n\
         - Open the narration with a greeting that names the {} briefing and says it is the {} edition for {}.\n\
         - Narrate each story in two to three sentences using the factual detail provided.\n\
         - Use a different transition phrase between each pair of stories.\n\
         - Close with a brief sign-off thanking the listener and naming the {} briefing.\n",
        request.category.display_name(),
        request.edition,
        date_text,
        request.category.display_name()
    ));

    prompt
}

/// Sanitize the model output and split off the title header. Models echo
/// formatting despite instructions, so this is defensive by contract.
fn finish_script(raw: &str, request: &ScriptRequest) -> Result<GeneratedScript> {
    let cleaned = sanitize_script(raw);

    if cleaned.trim().is_empty() {
        return Err(BriefingError::Generation(
            "service returned an empty script".to_string(),
        ));
    }

    let (title, script_text) = match cleaned.trim_start().strip_prefix("TITLE:") {
        Some(rest) => {
            let mut lines = rest.splitn(2, '\n');
            let title = lines.next().unwrap_or("").trim().to_string();
            let body = lines.next().unwrap_or("").trim().to_string();
            if title.is_empty() || body.is_empty() {
                (fallback_title(request), cleaned.trim().to_string())
            } else {
                (title, body)
            }
        }
        None => {
            warn!("Model omitted the title header, deriving one");
            (fallback_title(request), cleaned.trim().to_string())
        }
    };

    if script_text.split_whitespace().count() < 20 {
        return Err(BriefingError::Generation(format!(
            "script implausibly short ({} words)",
            script_text.split_whitespace().count()
        )));
    }

    debug!("Script ready: {} ({} chars)", title, script_text.len());
    Ok(GeneratedScript { script_text, title })
}

fn fallback_title(request: &ScriptRequest) -> String {
    format!(
        "{} Briefing: {} Edition, {}",
        request.category.display_name(),
        match request.edition {
            Edition::Morning => "Morning",
            Edition::Evening => "Evening",
        },
        request.brief_date.format("%B %-d, %Y")
    )
}

/// Strip the formatting a chat model tends to emit even when told not to:
/// code fences, bold/italic markers, heading markers, bracketed stage
/// directions, and runs of blank lines.
pub fn sanitize_script(raw: &str) -> String {
    let mut lines: Vec<String> = Vec::new();

    for line in raw.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with("```") {
            continue;
        }

        let mut text = trimmed.trim_start_matches('#').trim().to_string();
        text = text.replace("**", "").replace("__", "");
        text = strip_bracketed(&text);

        lines.push(text.trim().to_string());
    }

    // Collapse runs of blank lines into single paragraph breaks.
    let mut collapsed = String::new();
    let mut previous_blank = true;
    for line in &lines {
        if line.is_empty() {
            if !previous_blank {
                collapsed.push('\n');
                collapsed.push('\n');
            }
            previous_blank = true;
        } else {
            if !previous_blank {
                collapsed.push('\n');
            }
            collapsed.push_str(line);
            previous_blank = false;
        }
    }

    collapsed.trim().to_string()
}

/// Remove bracketed stage directions such as "[pause]" or "[sound of rain]".
fn strip_bracketed(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut depth = 0usize;

    for c in text.chars() {
        match c {
            '[' => depth += 1,
            ']' if depth > 0 => depth -= 1,
            _ if depth == 0 => output.push(c),
            _ => {}
        }
    }

    output
}

/// Deterministic generator for tests: narrates from the request alone, or
/// fails on demand to exercise the fatal-generation path.
pub struct MockScriptGenerator {
    fail: bool,
    canned_output: Option<String>,
}

impl MockScriptGenerator {
    pub fn new() -> Self {
        Self {
            fail: false,
            canned_output: None,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            canned_output: None,
        }
    }

    /// Return this exact raw output instead of the synthesized narration,
    /// still passing through sanitization.
    pub fn with_output(output: String) -> Self {
        Self {
            fail: false,
            canned_output: Some(output),
        }
    }
}

impl Default for MockScriptGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerateScript for MockScriptGenerator {
    async fn generate(&self, request: &ScriptRequest) -> Result<GeneratedScript> {
        if self.fail {
            return Err(BriefingError::Generation(
                "mock generation failure".to_string(),
            ));
        }

        if let Some(canned) = &self.canned_output {
            return finish_script(canned, request);
        }

        let mut raw = format!(
            "TITLE: {} {} briefing\n\nGood day, and welcome to the {} briefing, your {} edition for {}.\n\n",
            request.category.display_name(),
            request.edition,
            request.category.display_name(),
            request.edition,
            request.brief_date.format("%B %-d, %Y")
        );
        for story in &request.stories {
            raw.push_str(&format!(
                "In our next story, {}. According to {}, {}\n\n",
                story.title, story.source_name, story.summary
            ));
        }
        raw.push_str("That wraps up this briefing. Thank you for listening.\n");

        finish_script(&raw, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn story(title: &str) -> FeedItem {
        FeedItem {
            title: title.to_string(),
            summary: format!("{} happened today with several notable consequences.", title),
            source_name: "Test Wire".to_string(),
            link: "https://example.com/story".to_string(),
            published_at: None,
        }
    }

    fn request() -> ScriptRequest {
        ScriptRequest {
            category: Category::Business,
            edition: Edition::Morning,
            brief_date: NaiveDate::from_ymd_opt(2026, 8, 4).unwrap(),
            stories: vec![story("Markets rally"), story("Rates hold steady")],
        }
    }

    #[test]
    fn sanitize_removes_fences_bold_and_stage_directions() {
        let raw = "```\nTITLE: Test\n```\n**Good morning.** [pause] Here is the news.\n\n\n\nMore news __today__.";
        let cleaned = sanitize_script(raw);
        assert!(!cleaned.contains("```"));
        assert!(!cleaned.contains("**"));
        assert!(!cleaned.contains("[pause]"));
        assert!(!cleaned.contains("\n\n\n"));
        assert!(cleaned.contains("Good morning.  Here is the news.") || cleaned.contains("Good morning."));
    }

    #[test]
    fn prompt_names_category_edition_and_stories() {
        let prompt = build_prompt(&request());
        assert!(prompt.contains("Business"));
        assert!(prompt.contains("morning"));
        assert!(prompt.contains("Markets rally"));
        assert!(prompt.contains("Test Wire"));
    }

    #[tokio::test]
    async fn mock_generator_produces_title_and_script() {
        let generated = MockScriptGenerator::new().generate(&request()).await.unwrap();
        assert_eq!(generated.title, "Business morning briefing");
        assert!(generated.script_text.contains("Markets rally"));
        assert!(generated.script_text.contains("Thank you for listening."));
        assert!(!generated.script_text.starts_with("TITLE:"));
    }

    #[tokio::test]
    async fn missing_title_header_falls_back() {
        let canned = "Good morning and welcome to the briefing. Markets rallied strongly today \
                      across every major index while rates held steady, which analysts called a \
                      welcome surprise for households and lenders alike. Thanks for listening."
            .to_string();
        let generated = MockScriptGenerator::with_output(canned)
            .generate(&request())
            .await
            .unwrap();
        assert_eq!(generated.title, "Business Briefing: Morning Edition, August 4, 2026");
    }

    #[tokio::test]
    async fn empty_output_is_a_generation_error() {
        let result = MockScriptGenerator::with_output("```\n```".to_string())
            .generate(&request())
            .await;
        assert!(matches!(result, Err(BriefingError::Generation(_))));
    }

    #[tokio::test]
    async fn failing_mock_reports_generation_error() {
        let result = MockScriptGenerator::failing().generate(&request()).await;
        assert!(matches!(result, Err(BriefingError::Generation(_))));
    }
}
