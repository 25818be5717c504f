use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::pipeline::{EstimateOutcome, Recognition, ScanReport};
use super::registry::Dismissed;

#[derive(Debug, Deserialize)]
pub struct ScanQuery {
    pub scan_id: Option<Uuid>,
}

/// POST /scans/base64 { image_b64, content_type?, scan_id? }
#[derive(Debug, Deserialize)]
pub struct ScanBase64Request {
    pub image_b64: String,
    pub content_type: Option<String>,
    pub scan_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub scan_id: Uuid,
    pub recognition: Recognition,
    pub estimate: EstimateOutcome,
    pub estimated_days: Option<u64>,
    /// Expiry the item would get if confirmed right now.
    #[serde(with = "time::serde::rfc3339::option")]
    pub suggested_expires_at: Option<OffsetDateTime>,
    pub image_quality: Option<u8>,
}

impl ScanResponse {
    pub fn new(scan_id: Uuid, report: &ScanReport, now: OffsetDateTime) -> Self {
        Self {
            scan_id,
            recognition: report.recognition.clone(),
            estimate: report.estimate.clone(),
            estimated_days: report.estimate.resolved().map(|e| e.estimated_days()),
            suggested_expires_at: report.to_item(now, None, None).map(|i| i.expires_at),
            image_quality: report.image_quality,
        }
    }
}

/// Body of POST /scans/:id/confirm. Both fields are optional; `expires_at`
/// is required when the scan has no shelf-life estimate.
#[derive(Debug, Default, Deserialize)]
pub struct ConfirmRequest {
    pub name: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
}

#[derive(Debug, Serialize)]
pub struct DismissResponse {
    pub scan_id: Uuid,
    pub outcome: &'static str,
}

impl DismissResponse {
    pub fn new(scan_id: Uuid, d: Dismissed) -> Self {
        let outcome = match d {
            Dismissed::Cancelled => "cancelled",
            Dismissed::Discarded => "discarded",
        };
        Self { scan_id, outcome }
    }
}
