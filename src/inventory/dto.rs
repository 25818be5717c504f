use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use super::model::{Status, TrackedItem};
use super::repo::ClassifiedItem;
use super::services::{Aggregate, CalendarDay, CalendarMonth};

/// Tracked item as returned to clients.
#[derive(Debug, Serialize)]
pub struct ItemResponse {
    pub id: Uuid,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    pub status: Status,
    pub days_left: i64, // negative once expired
}

impl ItemResponse {
    pub fn new(c: ClassifiedItem, now: OffsetDateTime) -> Self {
        Self {
            id: c.item.id,
            name: c.item.name,
            days_left: (c.item.expires_at - now).whole_days(),
            expires_at: c.item.expires_at,
            status: c.status,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

/// Request body for adding an item by hand (barcode flow or manual entry).
#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub id: Option<Uuid>,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub year: Option<i32>,
    pub month: Option<u8>,
}

#[derive(Debug, Serialize)]
pub struct CalendarDayResponse {
    pub date: String,
    pub day: u8,
    pub weekend: bool,
    pub today: bool,
    pub items: Vec<ItemResponse>,
}

#[derive(Debug, Serialize)]
pub struct CalendarResponse {
    pub year: i32,
    pub month: u8,
    pub days: Vec<CalendarDayResponse>,
}

impl CalendarResponse {
    pub fn new(
        cal: CalendarMonth,
        classify: impl Fn(&TrackedItem) -> Status,
        now: OffsetDateTime,
    ) -> Self {
        let days = cal
            .days
            .into_iter()
            .map(|d: CalendarDay| CalendarDayResponse {
                date: d.date.to_string(),
                day: d.date.day(),
                weekend: d.weekend,
                today: d.today,
                items: d
                    .items
                    .into_iter()
                    .map(|item| {
                        let status = classify(&item);
                        ItemResponse::new(ClassifiedItem { item, status }, now)
                    })
                    .collect(),
            })
            .collect();
        Self {
            year: cal.year,
            month: cal.month,
            days,
        }
    }
}

/// Statistics view. `consumption_ratio` is a heuristic: non-expired items
/// count as consumed, expired ones as wasted.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total: usize,
    pub expired: usize,
    pub expiring_soon: usize,
    pub active: usize,
    pub consumed: usize,
    pub wasted: usize,
    pub consumption_ratio: f64,
    pub consumption_percent: f64,
    pub expiring_soon_days: i64,
}

impl StatsResponse {
    pub fn new(a: Aggregate, window: Duration) -> Self {
        Self {
            total: a.total,
            expired: a.expired,
            expiring_soon: a.expiring_soon,
            active: a.active,
            consumed: a.consumed(),
            wasted: a.wasted(),
            consumption_ratio: a.consumption_ratio,
            consumption_percent: (a.consumption_percent() * 10.0).round() / 10.0,
            expiring_soon_days: window.whole_days(),
        }
    }
}
