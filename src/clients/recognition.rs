use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{http_client, send_json, ClientError};
use crate::config::RecognitionConfig;

/// One guess from the recognition service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoodCandidate {
    pub label: String,
    pub confidence: f64,
}

#[async_trait]
pub trait FoodRecognizer: Send + Sync {
    /// Candidates in upstream order; the first is the most confident.
    async fn recognize(&self, jpeg: Bytes) -> Result<Vec<FoodCandidate>, ClientError>;
}

#[derive(Debug, Deserialize)]
struct AnalysisResponse {
    #[serde(default)]
    items: Vec<AnalysisItem>,
}

#[derive(Debug, Deserialize)]
struct AnalysisItem {
    #[serde(default)]
    food: Vec<FoodElement>,
}

#[derive(Debug, Deserialize)]
struct FoodElement {
    confidence: f64,
    food_info: FoodInfo,
}

#[derive(Debug, Deserialize)]
struct FoodInfo {
    display_name: String,
}

fn candidates(resp: AnalysisResponse) -> Vec<FoodCandidate> {
    resp.items
        .into_iter()
        .flat_map(|item| item.food)
        .filter(|f| !f.food_info.display_name.trim().is_empty())
        .map(|f| FoodCandidate {
            label: f.food_info.display_name.trim().to_string(),
            confidence: f.confidence.clamp(0.0, 1.0),
        })
        .collect()
}

/// Foodvisor-style analysis endpoint: multipart JPEG in, ranked foods out.
pub struct FoodvisorClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
    timeout: Duration,
}

impl FoodvisorClient {
    pub fn new(cfg: &RecognitionConfig, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            url: cfg.url.clone(),
            api_key: cfg.api_key.clone(),
            timeout,
        })
    }
}

#[async_trait]
impl FoodRecognizer for FoodvisorClient {
    #[instrument(skip(self, jpeg), fields(bytes = jpeg.len()))]
    async fn recognize(&self, jpeg: Bytes) -> Result<Vec<FoodCandidate>, ClientError> {
        if self.api_key.is_empty() {
            return Err(ClientError::Unconfigured("RECOGNITION_API_KEY"));
        }
        let part = Part::bytes(jpeg.to_vec())
            .file_name("image.jpg")
            .mime_str("image/jpeg")?;
        let form = Form::new().part("image", part);

        let req = self
            .http
            .post(&self.url)
            .header("Authorization", format!("Api-Key {}", self.api_key))
            .multipart(form);

        let resp: AnalysisResponse = send_json(req, self.timeout).await?;
        let out = candidates(resp);
        debug!(candidates = out.len(), "recognition finished");
        Ok(out)
    }
}
