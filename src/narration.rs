use crate::catalog::Topic;
use crate::error::{ReelError, Result, Stage};
use crate::utils::clamp_words;
use async_trait::async_trait;
use clap::ValueEnum;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Everything the composer needs to know about today's reel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Story {
    pub title: String,
    pub narration: String,
    pub search_phrase: String,
    pub hashtags: Vec<String>,
}

impl Story {
    /// Assembles the story for `topic`, clamping the narration to `max_words`.
    pub fn build(topic: &Topic, narration: &str, max_words: usize) -> Self {
        Story {
            title: topic.title.clone(),
            narration: clamp_words(narration, max_words),
            search_phrase: topic.search_phrase.clone(),
            hashtags: topic.hashtags_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum NarratorKind {
    #[default]
    Gemini,
    Template,
}

#[async_trait]
pub trait NarrationProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Plain narration text for `topic`.
    async fn narrate(&self, topic: &Topic) -> Result<String>;
}

pub fn build_prompt(topic: &str) -> String {
    format!(
        "Create a short, engaging 30-second Instagram Reel script about {topic}.\n\n\
         Requirements:\n\
         - Write in British English\n\
         - 60-80 words maximum (for 30 seconds of speech)\n\
         - Start with a hook question or surprising fact\n\
         - Include specific details about Salford\n\
         - End with a call-to-action or interesting point\n\
         - Write in a casual, conversational tone\n\
         - Use simple, clear sentences\n\
         - Focus on one main idea\n\n\
         Format: Write only the narration text, no headings or extra formatting."
    )
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

pub struct GeminiNarrator {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiNarrator {
    pub fn new(client: Client, api_key: String, model: String, base_url: String) -> Self {
        GeminiNarrator {
            client,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl NarrationProvider for GeminiNarrator {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn narrate(&self, topic: &Topic) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: build_prompt(&topic.title),
                }],
            }],
        };
        info!("Requesting narration from {} ({})", self.model, topic.title);

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| ReelError::provider(Stage::Narration, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ReelError::provider(
                Stage::Narration,
                format!("Gemini returned {}: {}", status, body.trim()),
            ));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ReelError::provider(Stage::Narration, e))?;

        let text = parsed
            .candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<String>()
            })
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ReelError::provider(Stage::Narration, "no text in Gemini response"))?;

        debug!("Gemini narration: {}", text);
        Ok(text)
    }
}

/// Offline narrator that fills a fixed script with the topic.
pub struct TemplateNarrator;

#[async_trait]
impl NarrationProvider for TemplateNarrator {
    fn name(&self) -> &'static str {
        "template"
    }

    async fn narrate(&self, topic: &Topic) -> Result<String> {
        Ok(format!(
            "Ever wondered what makes {title} so special? \
             Locals will tell you it is one of the best stories in Salford. \
             From its past to the people who shape it today, there is always something new to find. \
             Next time you are nearby, stop and take a proper look. \
             Follow for a new Salford story every day.",
            title = topic.title
        ))
    }
}
