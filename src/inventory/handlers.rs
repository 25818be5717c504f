use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use time::{Month, OffsetDateTime};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{
    CalendarQuery, CalendarResponse, CreateItemRequest, ItemResponse, ListQuery, StatsResponse,
};
use super::model::{Status, TrackedItem};
use super::repo::{ClassifiedItem, InventoryError};
use super::services;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/items", get(list_items).post(add_item))
        .route("/items/:id", get(get_item).delete(remove_item))
        .route("/calendar", get(calendar))
        .route("/stats", get(stats))
}

pub(crate) fn inventory_error(e: InventoryError) -> (StatusCode, String) {
    match e {
        InventoryError::DuplicateId(_) => (StatusCode::CONFLICT, e.to_string()),
        InventoryError::NotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
    }
}

#[instrument(skip(state))]
pub async fn list_items(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<ItemResponse>>, (StatusCode, String)> {
    let filter = match q.status.as_deref() {
        Some(s) => Some(s.parse::<Status>().map_err(|e| {
            warn!(status = %s, "bad status filter");
            (StatusCode::BAD_REQUEST, e)
        })?),
        None => None,
    };
    let now = OffsetDateTime::now_utc();
    let inv = state.inventory.read().await;
    let items = match filter {
        Some(status) => inv.by_status(status, now),
        None => inv.list(now),
    };
    Ok(Json(
        items.into_iter().map(|c| ItemResponse::new(c, now)).collect(),
    ))
}

#[instrument(skip(state, payload), fields(name = %payload.name))]
pub async fn add_item(
    State(state): State<AppState>,
    Json(payload): Json<CreateItemRequest>,
) -> Result<(StatusCode, Json<ItemResponse>), (StatusCode, String)> {
    let name = payload.name.trim();
    if name.is_empty() {
        warn!("empty item name");
        return Err((StatusCode::BAD_REQUEST, "name is required".into()));
    }
    let item = match payload.id {
        Some(id) => TrackedItem::with_id(id, name, payload.expires_at),
        None => TrackedItem::new(name, payload.expires_at),
    };
    let now = OffsetDateTime::now_utc();
    let status = {
        let mut inv = state.inventory.write().await;
        inv.add(item.clone()).map_err(|e| {
            warn!(error = %e, "add item rejected");
            inventory_error(e)
        })?;
        inv.classify(&item, now)
    };
    info!(item_id = %item.id, status = status.as_str(), "item added");
    Ok((
        StatusCode::CREATED,
        Json(ItemResponse::new(ClassifiedItem { item, status }, now)),
    ))
}

#[instrument(skip(state))]
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ItemResponse>, (StatusCode, String)> {
    let now = OffsetDateTime::now_utc();
    let inv = state.inventory.read().await;
    let item = inv
        .get(id)
        .cloned()
        .ok_or_else(|| inventory_error(InventoryError::NotFound(id)))?;
    let status = inv.classify(&item, now);
    Ok(Json(ItemResponse::new(ClassifiedItem { item, status }, now)))
}

#[instrument(skip(state))]
pub async fn remove_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    let removed = state
        .inventory
        .write()
        .await
        .remove(id)
        .map_err(inventory_error)?;
    info!(item_id = %removed.id, name = %removed.name, "item removed");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn calendar(
    State(state): State<AppState>,
    Query(q): Query<CalendarQuery>,
) -> Result<Json<CalendarResponse>, (StatusCode, String)> {
    let now = OffsetDateTime::now_utc();
    let year = q.year.unwrap_or(now.year());
    let month = match q.month {
        Some(m) => Month::try_from(m)
            .map_err(|_| (StatusCode::BAD_REQUEST, format!("invalid month {m}")))?,
        None => now.month(),
    };
    let inv = state.inventory.read().await;
    let cal = services::calendar(&inv, year, month, now)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    Ok(Json(CalendarResponse::new(cal, |item| inv.classify(item, now), now)))
}

#[instrument(skip(state))]
pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let now = OffsetDateTime::now_utc();
    let inv = state.inventory.read().await;
    Json(StatsResponse::new(services::aggregate(&inv, now), inv.window()))
}
