use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use bytes::Bytes;
use time::OffsetDateTime;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::capture::CaptureSource;
use super::dto::{ConfirmRequest, DismissResponse, ScanBase64Request, ScanQuery, ScanResponse};
use super::image::format_from_mime;
use super::pipeline::ScanError;
use crate::clients::ClientError;
use crate::inventory::dto::ItemResponse;
use crate::inventory::handlers::inventory_error;
use crate::inventory::repo::ClassifiedItem;
use crate::state::AppState;

/// Raw upload cap; the re-encoded JPEG has its own, smaller limit.
const UPLOAD_LIMIT: usize = 20 * 1024 * 1024;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/scans", post(scan_multipart))
        .route("/scans/base64", post(scan_base64))
        .route("/scans/:id", get(get_scan).delete(dismiss_scan))
        .route("/scans/:id/confirm", post(confirm_scan))
        .layer(DefaultBodyLimit::max(UPLOAD_LIMIT))
}

pub(crate) fn scan_error(e: ScanError) -> (StatusCode, String) {
    let status = match &e {
        ScanError::NoCapture => StatusCode::BAD_REQUEST,
        ScanError::InvalidImage(_) | ScanError::NoFoodDetected => StatusCode::UNPROCESSABLE_ENTITY,
        ScanError::ImageTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        ScanError::Encoding(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ScanError::RecognitionUnavailable(ClientError::Unconfigured(_))
        | ScanError::GenerationUnavailable(ClientError::Unconfigured(_)) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        ScanError::RecognitionUnavailable(_)
        | ScanError::GenerationUnavailable(_)
        | ScanError::MalformedEstimate(_) => StatusCode::BAD_GATEWAY,
        ScanError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        ScanError::Cancelled | ScanError::ScanInFlight(_) => StatusCode::CONFLICT,
        ScanError::UnknownScan(_) => StatusCode::NOT_FOUND,
    };
    (status, e.to_string())
}

/// Claims the scan id, runs the pipeline and parks the report for confirmation.
async fn run_scan(
    state: &AppState,
    scan_id: Uuid,
    source: CaptureSource,
) -> Result<Json<ScanResponse>, (StatusCode, String)> {
    let ticket = state.scans.begin(scan_id).map_err(scan_error)?;
    // Cancels and releases the run if the request future is dropped mid-flight.
    let guard = state.scans.guard(&ticket);

    let result = state.pipeline.resolve_capture(&source, &ticket.token).await;
    guard.disarm();

    match result {
        Ok(report) => {
            let response = ScanResponse::new(scan_id, &report, OffsetDateTime::now_utc());
            if !state.scans.complete(&ticket, report) {
                return Err(scan_error(ScanError::Cancelled));
            }
            info!(%scan_id, label = %response.recognition.label, "scan ready for confirmation");
            Ok(Json(response))
        }
        Err(e) => {
            state.scans.fail(&ticket);
            let (status, msg) = scan_error(e);
            if status.is_server_error() {
                error!(%scan_id, %status, error = %msg, "scan failed");
            } else {
                warn!(%scan_id, %status, error = %msg, "scan rejected");
            }
            Err((status, msg))
        }
    }
}

/// POST /scans (multipart, field `image`)
#[instrument(skip(state, mp))]
pub async fn scan_multipart(
    State(state): State<AppState>,
    Query(q): Query<ScanQuery>,
    mut mp: Multipart,
) -> Result<Json<ScanResponse>, (StatusCode, String)> {
    let mut source = CaptureSource::empty();
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
    {
        if !matches!(field.name(), Some("image" | "file")) {
            continue;
        }
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
        debug!(
            bytes = data.len(),
            format = content_type.as_deref().and_then(format_from_mime).unwrap_or("unknown"),
            "image uploaded"
        );
        source = CaptureSource::from_bytes(data, content_type);
        break;
    }
    run_scan(&state, q.scan_id.unwrap_or_else(Uuid::new_v4), source).await
}

/// Accepts plain base64 or a `data:image/...;base64,` URL.
fn decode_image_b64(input: &str) -> Result<(Bytes, Option<String>), (StatusCode, String)> {
    let input = input.trim();
    let (mime, payload) = match input.strip_prefix("data:").and_then(|rest| rest.split_once(',')) {
        Some((meta, payload)) => (meta.strip_suffix(";base64").map(str::to_string), payload),
        None => (None, input),
    };
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|_| (StatusCode::BAD_REQUEST, "invalid base64".to_string()))?;
    Ok((Bytes::from(bytes), mime))
}

/// POST /scans/base64 { image_b64, content_type?, scan_id? }
#[instrument(skip(state, body))]
pub async fn scan_base64(
    State(state): State<AppState>,
    Json(body): Json<ScanBase64Request>,
) -> Result<Json<ScanResponse>, (StatusCode, String)> {
    let (bytes, mime) = decode_image_b64(&body.image_b64)?;
    let content_type = body.content_type.or(mime);
    debug!(
        bytes = bytes.len(),
        format = content_type.as_deref().and_then(format_from_mime).unwrap_or("unknown"),
        "image decoded"
    );
    let source = CaptureSource::from_bytes(bytes, content_type);
    run_scan(&state, body.scan_id.unwrap_or_else(Uuid::new_v4), source).await
}

#[instrument(skip(state))]
pub async fn get_scan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ScanResponse>, (StatusCode, String)> {
    let report = state
        .scans
        .pending(id)
        .ok_or_else(|| scan_error(ScanError::UnknownScan(id)))?;
    Ok(Json(ScanResponse::new(id, &report, OffsetDateTime::now_utc())))
}

/// Cancels an in-flight scan or discards a pending one.
#[instrument(skip(state))]
pub async fn dismiss_scan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DismissResponse>, (StatusCode, String)> {
    let outcome = state.scans.dismiss(id).map_err(scan_error)?;
    info!(scan_id = %id, ?outcome, "scan dismissed");
    Ok(Json(DismissResponse::new(id, outcome)))
}

#[instrument(skip(state, body))]
pub async fn confirm_scan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ConfirmRequest>,
) -> Result<(StatusCode, Json<ItemResponse>), (StatusCode, String)> {
    let report = state.scans.take(id).map_err(scan_error)?;
    let now = OffsetDateTime::now_utc();

    let Some(item) = report.to_item(now, body.expires_at, body.name.as_deref()) else {
        state.scans.restore(id, report);
        return Err((
            StatusCode::BAD_REQUEST,
            "no shelf-life estimate for this scan; expires_at is required".into(),
        ));
    };

    let added = {
        let mut inv = state.inventory.write().await;
        inv.add(item.clone()).map(|_| inv.classify(&item, now))
    };
    let status = match added {
        Ok(status) => status,
        Err(e) => {
            state.scans.restore(id, report);
            return Err(inventory_error(e));
        }
    };

    info!(scan_id = %id, item_id = %item.id, name = %item.name, "scan confirmed");
    Ok((
        StatusCode::CREATED,
        Json(ItemResponse::new(ClassifiedItem { item, status }, now)),
    ))
}
