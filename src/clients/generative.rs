use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{http_client, send_json, ClientError};
use crate::config::GenerativeConfig;

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Sends a single-prompt request and returns the reply text.
    async fn generate(&self, prompt: &str) -> Result<String, ClientError>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [PartText<'a>; 1],
}

#[derive(Debug, Serialize)]
struct PartText<'a> {
    text: &'a str,
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

fn request_body(prompt: &str) -> GenerateRequest<'_> {
    GenerateRequest {
        contents: [Content {
            parts: [PartText { text: prompt }],
        }],
    }
}

fn first_text(resp: GenerateResponse) -> Option<String> {
    resp.candidates
        .into_iter()
        .next()
        .and_then(|c| c.content.parts.into_iter().next())
        .map(|p| p.text)
}

/// Gemini `generateContent` client; the API key rides in the query string.
pub struct GeminiClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
    timeout: Duration,
}

impl GeminiClient {
    pub fn new(cfg: &GenerativeConfig, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            url: cfg.url.clone(),
            api_key: cfg.api_key.clone(),
            timeout,
        })
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    #[instrument(skip(self, prompt), fields(prompt_len = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<String, ClientError> {
        if self.api_key.is_empty() {
            return Err(ClientError::Unconfigured("GENERATIVE_API_KEY"));
        }
        let req = self
            .http
            .post(&self.url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request_body(prompt));

        let resp: GenerateResponse = send_json(req, self.timeout).await?;
        let text = first_text(resp).ok_or_else(|| ClientError::InvalidResponse {
            status: 200,
            message: "reply carried no candidates".into(),
        })?;
        debug!(reply_len = text.len(), "generation finished");
        Ok(text)
    }
}
