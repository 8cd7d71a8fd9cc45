/// OpenAI chat-completions recommender
///
/// Asks the model for a plain newline-separated list of titles and strips
/// list markers and years from the reply.
use regex::Regex;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;
use std::time::Duration;

use crate::{
    error::{AppError, AppResult},
    services::providers::Recommender,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const TEMPERATURE: f32 = 0.7;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatContent,
}

#[derive(Debug, Deserialize)]
struct ChatContent {
    #[serde(default)]
    content: Option<String>,
}

struct ListPatterns {
    bullet: Regex,
    numbering: Regex,
    year_parens: Regex,
    year_dash: Regex,
}

fn patterns() -> &'static ListPatterns {
    static PATTERNS: OnceLock<ListPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| ListPatterns {
        bullet: Regex::new(r"^\s*[-*\x{2022}]\s*").expect("valid regex"),
        numbering: Regex::new(r"^\s*\d+[.)]\s*").expect("valid regex"),
        year_parens: Regex::new(r"\(\s*\d{4}\s*\)\s*$").expect("valid regex"),
        year_dash: Regex::new(r"\s*[-\x{2013}\x{2014}]\s*\d{4}\s*$").expect("valid regex"),
    })
}

/// Best-guess title from one line of model output, `None` for blank lines
fn clean_title(line: &str) -> Option<String> {
    let p = patterns();
    let s = line.trim();
    if s.is_empty() {
        return None;
    }

    let s = p.bullet.replace(s, "");
    let s = p.numbering.replace(&s, "");
    let s = p.year_parens.replace(&s, "");
    let s = p.year_dash.replace(&s, "");

    let s = s.trim().trim_matches('"').trim_matches('\'').trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Parses model text into at most `limit` distinct titles (case-insensitive)
pub fn parse_recommendations(text: &str, limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for line in text.lines() {
        let Some(title) = clean_title(line) else {
            continue;
        };
        if !seen.insert(title.to_lowercase()) {
            continue;
        }
        out.push(title);
        if out.len() >= limit {
            break;
        }
    }

    out
}

fn build_prompt(seed: &str, limit: usize) -> String {
    format!(
        "Recommend {limit} movies similar in tone, themes, atmosphere, or cinematic style to '{seed}'. \
         About 80% should already be released and about 20% upcoming. \
         Mix well-known films with lesser-known indie, international and festival favorites. \
         Avoid low-effort franchise entries unless genuinely relevant. \
         Return ONLY a plain newline-separated list of movie titles (no extra text, no numbering). \
         Do not include years unless necessary to disambiguate titles."
    )
}

#[derive(Clone)]
pub struct OpenAiRecommender {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    model: String,
}

impl OpenAiRecommender {
    pub fn new(api_key: String, api_url: String, model: String) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http_client,
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
            model,
        })
    }
}

#[async_trait::async_trait]
impl Recommender for OpenAiRecommender {
    async fn recommend(&self, seed: &str, limit: usize) -> AppResult<Vec<String>> {
        if seed.trim().is_empty() {
            return Err(AppError::InvalidInput("Seed title cannot be empty".to_string()));
        }

        let prompt = build_prompt(seed, limit);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "You are a movie recommendation engine.",
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: TEMPERATURE,
        };

        let response = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "OpenAI API returned status {}: {}",
                status, body
            )));
        }

        let chat: ChatResponse = response.json().await?;
        let text = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        let titles = parse_recommendations(&text, limit);
        tracing::info!(seed = %seed, returned = titles.len(), provider = "openai", "Model recommendations parsed");
        Ok(titles)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
