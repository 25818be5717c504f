use thiserror::Error;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use super::model::{Status, TrackedItem, EXPIRING_SOON_WINDOW};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InventoryError {
    #[error("item {0} is already tracked")]
    DuplicateId(Uuid),
    #[error("item {0} not found")]
    NotFound(Uuid),
}

/// An item paired with the status it had at read time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedItem {
    pub item: TrackedItem,
    pub status: Status,
}

/// The single authoritative collection of tracked items.
///
/// Status is never stored: every read classifies against the `now` the caller
/// passes in, so an item crosses from current to expired without any migration.
#[derive(Debug, Clone)]
pub struct Inventory {
    items: Vec<TrackedItem>,
    window: Duration,
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new(EXPIRING_SOON_WINDOW)
    }
}

impl Inventory {
    pub fn new(window: Duration) -> Self {
        Self {
            items: Vec::new(),
            window,
        }
    }

    /// Seeds the collection from explicit fixtures.
    pub fn with_items(
        window: Duration,
        fixtures: impl IntoIterator<Item = TrackedItem>,
    ) -> Result<Self, InventoryError> {
        let mut inv = Self::new(window);
        for item in fixtures {
            inv.add(item)?;
        }
        Ok(inv)
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn add(&mut self, item: TrackedItem) -> Result<(), InventoryError> {
        if self.items.iter().any(|i| i.id == item.id) {
            return Err(InventoryError::DuplicateId(item.id));
        }
        self.items.push(item);
        Ok(())
    }

    pub fn remove(&mut self, id: Uuid) -> Result<TrackedItem, InventoryError> {
        let pos = self
            .items
            .iter()
            .position(|i| i.id == id)
            .ok_or(InventoryError::NotFound(id))?;
        Ok(self.items.remove(pos))
    }

    pub fn get(&self, id: Uuid) -> Option<&TrackedItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn items(&self) -> &[TrackedItem] {
        &self.items
    }

    pub fn classify(&self, item: &TrackedItem, now: OffsetDateTime) -> Status {
        item.status(now, self.window)
    }

    /// All items with their status, soonest expiry first.
    pub fn list(&self, now: OffsetDateTime) -> Vec<ClassifiedItem> {
        let mut out: Vec<ClassifiedItem> = self
            .items
            .iter()
            .map(|item| ClassifiedItem {
                status: self.classify(item, now),
                item: item.clone(),
            })
            .collect();
        out.sort_by(|a, b| {
            a.item
                .expires_at
                .cmp(&b.item.expires_at)
                .then_with(|| a.item.name.cmp(&b.item.name))
        });
        out
    }

    pub fn by_status(&self, status: Status, now: OffsetDateTime) -> Vec<ClassifiedItem> {
        self.list(now)
            .into_iter()
            .filter(|c| c.status == status)
            .collect()
    }

    /// Names of items about to expire, in expiry order, without repeats.
    pub fn expiring_names(&self, now: OffsetDateTime) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for c in self.by_status(Status::ExpiringSoon, now) {
            if !names.iter().any(|n| n.eq_ignore_ascii_case(&c.item.name)) {
                names.push(c.item.name);
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const T: OffsetDateTime = datetime!(2024-10-05 09:30 UTC);

    #[test]
    fn add_rejects_duplicate_ids() {
        let mut inv = Inventory::default();
        let item = TrackedItem::new("Milk", T + Duration::days(1));
        let dup = TrackedItem::with_id(item.id, "Other milk", T + Duration::days(3));
        inv.add(item.clone()).unwrap();
        assert_eq!(inv.add(dup), Err(InventoryError::DuplicateId(item.id)));
        assert_eq!(inv.len(), 1);
        assert_eq!(inv.get(item.id).unwrap().name, "Milk");
    }

    #[test]
    fn remove_reports_missing_ids() {
        let mut inv = Inventory::default();
        let item = TrackedItem::new("Bread", T);
        inv.add(item.clone()).unwrap();
        assert_eq!(inv.remove(item.id).unwrap(), item);
        assert_eq!(inv.remove(item.id), Err(InventoryError::NotFound(item.id)));
        assert!(inv.is_empty());
    }

    #[test]
    fn items_move_between_buckets_without_migration() {
        let mut inv = Inventory::default();
        let item = TrackedItem::new("Yoghurt", T + Duration::days(2));
        inv.add(item.clone()).unwrap();
        assert_eq!(inv.by_status(Status::ExpiringSoon, T).len(), 1);
        let later = T + Duration::days(3);
        let expired = inv.by_status(Status::Expired, later);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].item.id, item.id);
    }

    #[test]
    fn list_sorted_by_expiry() {
        let inv = Inventory::with_items(
            EXPIRING_SOON_WINDOW,
            vec![
                TrackedItem::new("Eggs", T + Duration::days(10)),
                TrackedItem::new("Cheese", T - Duration::days(3)),
                TrackedItem::new("Milk", T + Duration::days(1)),
            ],
        )
        .unwrap();
        let listed: Vec<(String, Status)> = inv
            .list(T)
            .into_iter()
            .map(|c| (c.item.name, c.status))
            .collect();
        assert_eq!(
            listed,
            vec![
                ("Cheese".to_string(), Status::Expired),
                ("Milk".to_string(), Status::ExpiringSoon),
                ("Eggs".to_string(), Status::Active),
            ]
        );
    }

    #[test]
    fn fixtures_with_duplicate_ids_are_rejected() {
        let a = TrackedItem::new("Milk", T);
        let b = TrackedItem::with_id(a.id, "Milk again", T);
        let err = Inventory::with_items(EXPIRING_SOON_WINDOW, vec![a.clone(), b]).unwrap_err();
        assert_eq!(err, InventoryError::DuplicateId(a.id));
    }

    #[test]
    fn expiring_names_dedupes_case_insensitively() {
        let inv = Inventory::with_items(
            EXPIRING_SOON_WINDOW,
            vec![
                TrackedItem::new("Tomatoes", T + Duration::days(3)),
                TrackedItem::new("Milk", T + Duration::days(1)),
                TrackedItem::new("milk", T + Duration::days(2)),
                TrackedItem::new("Butter", T + Duration::days(12)),
            ],
        )
        .unwrap();
        assert_eq!(inv.expiring_names(T), vec!["Milk", "Tomatoes"]);
    }
}
