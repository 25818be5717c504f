use serde::Serialize;
use time::{Date, Month, OffsetDateTime, UtcOffset, Weekday};

use super::model::{Status, TrackedItem};
use super::repo::Inventory;

/// Bucket counts plus the consumption ratio.
///
/// The ratio treats every non-expired item as "consumed" and every expired
/// item as "wasted". Nothing actually records consumption, so this is a
/// heuristic proxy for food waste, not a measurement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Aggregate {
    pub total: usize,
    pub expired: usize,
    pub expiring_soon: usize,
    pub active: usize,
    pub consumption_ratio: f64,
}

impl Aggregate {
    pub fn consumed(&self) -> usize {
        self.total - self.expired
    }

    pub fn wasted(&self) -> usize {
        self.expired
    }

    pub fn consumption_percent(&self) -> f64 {
        self.consumption_ratio * 100.0
    }
}

pub fn aggregate(inv: &Inventory, now: OffsetDateTime) -> Aggregate {
    if inv.is_empty() {
        return Aggregate::default();
    }
    let (mut expired, mut expiring_soon, mut active) = (0usize, 0usize, 0usize);
    for item in inv.items() {
        match inv.classify(item, now) {
            Status::Expired => expired += 1,
            Status::ExpiringSoon => expiring_soon += 1,
            Status::Active => active += 1,
        }
    }
    let total = expired + expiring_soon + active;
    Aggregate {
        total,
        expired,
        expiring_soon,
        active,
        consumption_ratio: consumption_ratio(total - expired, expired),
    }
}

/// `consumed / (consumed + wasted)`, or 0.0 when there is nothing to count.
pub fn consumption_ratio(consumed: usize, wasted: usize) -> f64 {
    let total = consumed + wasted;
    if total == 0 {
        return 0.0;
    }
    consumed as f64 / total as f64
}

#[derive(Debug, Clone)]
pub struct CalendarDay {
    pub date: Date,
    pub weekend: bool,
    pub today: bool,
    pub items: Vec<TrackedItem>,
}

#[derive(Debug, Clone)]
pub struct CalendarMonth {
    pub year: i32,
    pub month: u8,
    pub days: Vec<CalendarDay>,
}

/// One UTC calendar month with the items expiring on each day.
pub fn calendar(
    inv: &Inventory,
    year: i32,
    month: Month,
    now: OffsetDateTime,
) -> Result<CalendarMonth, time::error::ComponentRange> {
    let first = Date::from_calendar_date(year, month, 1)?;
    let today = now.to_offset(UtcOffset::UTC).date();
    let day_count = time::util::days_in_year_month(year, month);

    let mut days = Vec::with_capacity(day_count as usize);
    let mut date = first;
    for _ in 0..day_count {
        let mut items: Vec<TrackedItem> = inv
            .items()
            .iter()
            .filter(|i| i.expires_at.to_offset(UtcOffset::UTC).date() == date)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.expires_at.cmp(&b.expires_at).then_with(|| a.name.cmp(&b.name)));
        days.push(CalendarDay {
            date,
            weekend: matches!(date.weekday(), Weekday::Saturday | Weekday::Sunday),
            today: date == today,
            items,
        });
        match date.next_day() {
            Some(next) => date = next,
            None => break,
        }
    }

    Ok(CalendarMonth {
        year,
        month: month as u8,
        days,
    })
}
