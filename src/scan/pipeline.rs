use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::capture::{CaptureSource, CapturedImage};
use super::estimate::{build_prompt, parse_estimate, ParseError, ShelfLifeEstimate};
use super::image::{prepare_jpeg, ImageError};
use crate::clients::generative::TextGenerator;
use crate::clients::recognition::FoodRecognizer;
use crate::clients::ClientError;
use crate::inventory::model::{ScanResult, TrackedItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Recognition,
    Estimate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Recognition => "recognition",
            Stage::Estimate => "estimate",
        })
    }
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("no image was captured")]
    NoCapture,

    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("image is still {smallest} bytes at the lowest quality (limit {limit})")]
    ImageTooLarge { smallest: usize, limit: usize },

    #[error("image encoding failed: {0}")]
    Encoding(String),

    #[error("food recognition unavailable: {0}")]
    RecognitionUnavailable(#[source] ClientError),

    #[error("no food detected in the image")]
    NoFoodDetected,

    #[error("shelf-life estimate unavailable: {0}")]
    GenerationUnavailable(#[source] ClientError),

    #[error("{stage} timed out after {}s", .after.as_secs())]
    Timeout { stage: Stage, after: Duration },

    #[error("malformed estimate: {0}")]
    MalformedEstimate(#[from] ParseError),

    #[error("scan was cancelled")]
    Cancelled,

    #[error("scan {0} is already in progress")]
    ScanInFlight(Uuid),

    #[error("scan {0} not found")]
    UnknownScan(Uuid),
}

impl From<ImageError> for ScanError {
    fn from(e: ImageError) -> Self {
        match e {
            ImageError::Undecodable(msg) => ScanError::InvalidImage(msg),
            ImageError::TooLarge { smallest, limit } => ScanError::ImageTooLarge { smallest, limit },
        }
    }
}

/// Label picked from the recognition service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recognition {
    pub label: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableKind {
    Generation,
    Timeout,
    Malformed,
}

/// Stage 2/3 result. Failure here never discards the recognition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EstimateOutcome {
    Resolved(ShelfLifeEstimate),
    Unavailable { kind: UnavailableKind, reason: String },
}

impl EstimateOutcome {
    fn unavailable(err: &ScanError) -> Self {
        let kind = match err {
            ScanError::Timeout { .. } => UnavailableKind::Timeout,
            ScanError::MalformedEstimate(_) => UnavailableKind::Malformed,
            _ => UnavailableKind::Generation,
        };
        EstimateOutcome::Unavailable {
            kind,
            reason: err.to_string(),
        }
    }

    pub fn resolved(&self) -> Option<&ShelfLifeEstimate> {
        match self {
            EstimateOutcome::Resolved(e) => Some(e),
            EstimateOutcome::Unavailable { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanReport {
    pub recognition: Recognition,
    pub estimate: EstimateOutcome,
    /// JPEG quality used for upload; `None` if the capture was sent untouched.
    pub image_quality: Option<u8>,
}

impl ScanReport {
    /// Complete result, only when every stage succeeded.
    pub fn scan_result(&self) -> Option<ScanResult> {
        let est = self.estimate.resolved()?;
        Some(ScanResult {
            recognized_label: self.recognition.label.clone(),
            confidence: self.recognition.confidence,
            storage_condition: est.storage_condition.clone(),
            estimated_duration_seconds: est.duration_seconds,
        })
    }

    /// Turns the report into an item. A manual date wins over the estimate;
    /// without either there is nothing to track.
    pub fn to_item(
        &self,
        now: OffsetDateTime,
        manual_expiry: Option<OffsetDateTime>,
        name: Option<&str>,
    ) -> Option<TrackedItem> {
        let mut item = match (manual_expiry, self.scan_result()) {
            (Some(at), _) => TrackedItem::new(self.recognition.label.clone(), at),
            (None, Some(scan)) => TrackedItem::from_scan(&scan, now),
            (None, None) => return None,
        };
        if let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) {
            item.name = name.to_string();
        }
        Some(item)
    }
}

/// Image → recognized label → shelf-life estimate.
pub struct Pipeline {
    recognizer: Arc<dyn FoodRecognizer>,
    generator: Arc<dyn TextGenerator>,
    max_image_bytes: usize,
    timeout: Duration,
}

impl Pipeline {
    pub fn new(
        recognizer: Arc<dyn FoodRecognizer>,
        generator: Arc<dyn TextGenerator>,
        max_image_bytes: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            recognizer,
            generator,
            max_image_bytes,
            timeout,
        }
    }

    /// Runs the pipeline on the next capture of `source`.
    pub async fn resolve_capture(
        &self,
        source: &CaptureSource,
        cancel: &CancellationToken,
    ) -> Result<ScanReport, ScanError> {
        let capture = source.captures().next().ok_or(ScanError::NoCapture)?;
        self.resolve(capture, cancel).await
    }

    #[instrument(skip_all, fields(bytes = capture.bytes.len(), content_type = ?capture.content_type))]
    pub async fn resolve(
        &self,
        capture: CapturedImage,
        cancel: &CancellationToken,
    ) -> Result<ScanReport, ScanError> {
        let limit = self.max_image_bytes;
        let raw = capture.bytes;
        let encode = tokio::task::spawn_blocking(move || prepare_jpeg(&raw, limit));
        let prepared = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ScanError::Cancelled),
            joined = encode => joined.map_err(|e| ScanError::Encoding(e.to_string()))??,
        };
        debug!(bytes = prepared.jpeg.len(), quality = ?prepared.quality, "image prepared");

        let candidates = match self
            .bounded(Stage::Recognition, cancel, self.recognizer.recognize(prepared.jpeg))
            .await?
        {
            Ok(c) => c,
            Err(ClientError::Timeout(after)) => {
                return Err(ScanError::Timeout {
                    stage: Stage::Recognition,
                    after,
                })
            }
            Err(e) => return Err(ScanError::RecognitionUnavailable(e)),
        };
        let top = candidates.into_iter().next().ok_or(ScanError::NoFoodDetected)?;
        let recognition = Recognition {
            label: top.label,
            confidence: top.confidence.clamp(0.0, 1.0),
        };
        info!(label = %recognition.label, confidence = recognition.confidence, "food recognized");

        let estimate = match self.estimate(&recognition.label, cancel).await {
            Ok(est) => EstimateOutcome::Resolved(est),
            Err(ScanError::Cancelled) => return Err(ScanError::Cancelled),
            Err(e) => {
                warn!(error = %e, label = %recognition.label, "estimate unavailable; manual date needed");
                EstimateOutcome::unavailable(&e)
            }
        };

        // A result that lands after dismissal is dropped.
        if cancel.is_cancelled() {
            return Err(ScanError::Cancelled);
        }

        Ok(ScanReport {
            recognition,
            estimate,
            image_quality: prepared.quality,
        })
    }

    async fn estimate(
        &self,
        label: &str,
        cancel: &CancellationToken,
    ) -> Result<ShelfLifeEstimate, ScanError> {
        let prompt = build_prompt(label);
        let reply = match self
            .bounded(Stage::Estimate, cancel, self.generator.generate(&prompt))
            .await?
        {
            Ok(text) => text,
            Err(ClientError::Timeout(after)) => {
                return Err(ScanError::Timeout {
                    stage: Stage::Estimate,
                    after,
                })
            }
            Err(e) => return Err(ScanError::GenerationUnavailable(e)),
        };
        debug!(reply = %reply, "estimate reply");
        Ok(parse_estimate(&reply)?)
    }

    /// Races one remote call against the timeout and the cancellation token.
    async fn bounded<T>(
        &self,
        stage: Stage,
        cancel: &CancellationToken,
        call: impl Future<Output = Result<T, ClientError>>,
    ) -> Result<Result<T, ClientError>, ScanError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ScanError::Cancelled),
            res = tokio::time::timeout(self.timeout, call) => res.map_err(|_| ScanError::Timeout {
                stage,
                after: self.timeout,
            }),
        }
    }
}
