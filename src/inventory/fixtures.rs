use time::{Duration, OffsetDateTime};

use super::model::TrackedItem;

/// Demo pantry, laid out relative to `now` so the buckets stay meaningful
/// whenever the service is started.
pub fn demo(now: OffsetDateTime) -> Vec<TrackedItem> {
    vec![
        TrackedItem::new("Milk", now + Duration::days(1)),
        TrackedItem::new("Bread", now + Duration::days(2)),
        TrackedItem::new("Tomatoes", now + Duration::days(3)),
        TrackedItem::new("Eggs", now + Duration::days(10)),
        TrackedItem::new("Butter", now + Duration::days(12)),
        TrackedItem::new("Cheese", now + Duration::days(15)),
        TrackedItem::new("Yoghurt", now - Duration::days(4)),
        TrackedItem::new("Spoiled Milk", now - Duration::days(9)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{model::EXPIRING_SOON_WINDOW, repo::Inventory, services::aggregate};

    #[test]
    fn demo_fills_every_bucket() {
        let now = OffsetDateTime::now_utc();
        let inv = Inventory::with_items(EXPIRING_SOON_WINDOW, demo(now)).unwrap();
        let agg = aggregate(&inv, now);
        assert_eq!(agg.total, 8);
        assert_eq!(agg.expiring_soon, 3);
        assert_eq!(agg.active, 3);
        assert_eq!(agg.expired, 2);
    }
}
