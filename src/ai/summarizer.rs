use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::{Provider, SummarizerConfig};
use crate::error::{AppError, Result};
use crate::pipeline::Summarize;

const ANTHROPIC_VERSION: &str = "2023-06-01";

const SYSTEM_PROMPT: &str = r#"You summarise official government publications for members of the public.
Stay strictly neutral: report what the document says without opinion, praise, criticism or speculation.
Do not add facts that are not in the document. If something is not stated, write "Not stated".
Use plain, accessible language."#;

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct MessageRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
    system: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

pub struct Summarizer {
    client: Client,
    provider: Provider,
    api_key: String,
    api_url: String,
    model: String,
    max_tokens: u32,
    max_input_chars: usize,
}

impl Summarizer {
    /// `None` when no API key is configured.
    pub fn from_config(config: &SummarizerConfig, timeout_secs: u64) -> Result<Option<Self>> {
        let Some(api_key) = config.api_key.clone().filter(|k| !k.trim().is_empty()) else {
            return Ok(None);
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(60)))
            .build()?;

        Ok(Some(Self {
            client,
            provider: config.provider,
            api_key,
            api_url: config.api_url().to_string(),
            model: config.model().to_string(),
            max_tokens: config.max_tokens,
            max_input_chars: config.max_input_chars,
        }))
    }

    pub async fn generate_summary(&self, title: &str, text: &str) -> Result<String> {
        let user_message = user_prompt(title, truncate_chars(text, self.max_input_chars));

        let request = match self.provider {
            Provider::Anthropic => self
                .client
                .post(&self.api_url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&MessageRequest {
                    model: self.model.clone(),
                    max_tokens: self.max_tokens,
                    messages: vec![Message {
                        role: "user".to_string(),
                        content: user_message,
                    }],
                    system: Some(SYSTEM_PROMPT.to_string()),
                }),
            Provider::OpenAi => self
                .client
                .post(&self.api_url)
                .bearer_auth(&self.api_key)
                .json(&ChatRequest {
                    model: self.model.clone(),
                    max_tokens: self.max_tokens,
                    temperature: 0.2,
                    messages: vec![
                        Message {
                            role: "system".to_string(),
                            content: SYSTEM_PROMPT.to_string(),
                        },
                        Message {
                            role: "user".to_string(),
                            content: user_message,
                        },
                    ],
                }),
        };

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(AppError::SummarizerApi(format!("HTTP {status}: {error_text}")));
        }

        let body = response.text().await?;
        match self.provider {
            Provider::Anthropic => parse_anthropic_response(&body),
            Provider::OpenAi => parse_openai_response(&body),
        }
    }
}

impl Summarize for Summarizer {
    fn model_version(&self) -> &str {
        &self.model
    }

    async fn summarize(&self, title: &str, text: &str) -> Result<String> {
        self.generate_summary(title, text).await
    }
}

fn user_prompt(title: &str, text: &str) -> String {
    format!(
        r#"Summarise the following government publication.

Return this markdown:

### Key points
Three to five bullets.

### What changed
One or two bullets.

### Who is affected
A short list.

Title: {title}

Document text:
{text}"#
    )
}

/// At most `max` characters, cut on a char boundary.
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn non_empty(summary: String) -> Result<String> {
    let summary = summary.trim().to_string();
    if summary.is_empty() {
        Err(AppError::EmptySummary)
    } else {
        Ok(summary)
    }
}

fn parse_anthropic_response(body: &str) -> Result<String> {
    let response: MessageResponse = serde_json::from_str(body)?;
    let summary = response
        .content
        .into_iter()
        .filter_map(|block| block.text)
        .collect::<Vec<_>>()
        .join("\n");
    non_empty(summary)
}

fn parse_openai_response(body: &str) -> Result<String> {
    let response: ChatResponse = serde_json::from_str(body)?;
    let summary = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .unwrap_or_default();
    non_empty(summary)
}
