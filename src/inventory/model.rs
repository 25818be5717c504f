use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Items expiring within this window (inclusive) are flagged as expiring soon.
pub const EXPIRING_SOON_WINDOW: Duration = Duration::days(5);

/// A food item under management.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedItem {
    pub id: Uuid,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl TrackedItem {
    pub fn new(name: impl Into<String>, expires_at: OffsetDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            expires_at,
        }
    }

    pub fn with_id(id: Uuid, name: impl Into<String>, expires_at: OffsetDateTime) -> Self {
        Self {
            id,
            name: name.into(),
            expires_at,
        }
    }

    /// Builds an item from a resolved scan; expiry counts from `created_at`.
    pub fn from_scan(scan: &ScanResult, created_at: OffsetDateTime) -> Self {
        Self::new(
            scan.recognized_label.clone(),
            created_at.saturating_add(scan.estimated_duration()),
        )
    }

    pub fn status(&self, now: OffsetDateTime, window: Duration) -> Status {
        classify(self.expires_at, now, window)
    }
}

/// Derived lifecycle status. Never stored; recomputed on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Active,
    ExpiringSoon,
    Expired,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Active => "active",
            Status::ExpiringSoon => "expiring_soon",
            Status::Expired => "expired",
        }
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Status::Active),
            "expiring_soon" | "expiring-soon" | "soon" => Ok(Status::ExpiringSoon),
            "expired" => Ok(Status::Expired),
            other => Err(format!("unknown status `{other}`")),
        }
    }
}

/// `Expired` strictly before `now`; `ExpiringSoon` when `0 <= expires_at - now <= window`.
pub fn classify(expires_at: OffsetDateTime, now: OffsetDateTime, window: Duration) -> Status {
    if expires_at < now {
        return Status::Expired;
    }
    if expires_at - now <= window {
        Status::ExpiringSoon
    } else {
        Status::Active
    }
}

/// Output of a fully resolved scan, before the user confirms it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub recognized_label: String,
    pub confidence: f64,
    pub storage_condition: String,
    pub estimated_duration_seconds: u64,
}

impl ScanResult {
    pub fn estimated_duration(&self) -> Duration {
        Duration::seconds(i64::try_from(self.estimated_duration_seconds).unwrap_or(i64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2024-10-05 12:00 UTC);

    #[test]
    fn boundaries() {
        assert_eq!(classify(NOW + Duration::days(5), NOW, EXPIRING_SOON_WINDOW), Status::ExpiringSoon);
        assert_eq!(
            classify(NOW + Duration::days(5) + Duration::seconds(1), NOW, EXPIRING_SOON_WINDOW),
            Status::Active
        );
        assert_eq!(classify(NOW - Duration::seconds(1), NOW, EXPIRING_SOON_WINDOW), Status::Expired);
        assert_eq!(classify(NOW, NOW, EXPIRING_SOON_WINDOW), Status::ExpiringSoon);
    }

    #[test]
    fn classification_is_deterministic() {
        let samples = [
            NOW - Duration::days(400),
            NOW - Duration::seconds(1),
            NOW,
            NOW + Duration::hours(30),
            NOW + Duration::days(5),
            NOW + Duration::days(90),
        ];
        for expires_at in samples {
            let first = classify(expires_at, NOW, EXPIRING_SOON_WINDOW);
            for _ in 0..3 {
                assert_eq!(classify(expires_at, NOW, EXPIRING_SOON_WINDOW), first);
            }
        }
    }

    #[test]
    fn custom_window() {
        let window = Duration::days(1);
        assert_eq!(classify(NOW + Duration::days(2), NOW, window), Status::Active);
        assert_eq!(classify(NOW + Duration::hours(23), NOW, window), Status::ExpiringSoon);
        assert_eq!(classify(NOW + Duration::days(2), NOW, Duration::ZERO), Status::Active);
    }

    #[test]
    fn item_from_scan_round_trip() {
        let scan = ScanResult {
            recognized_label: "Carrot".into(),
            confidence: 0.91,
            storage_condition: "fridge".into(),
            estimated_duration_seconds: 14 * 86_400,
        };
        let item = TrackedItem::from_scan(&scan, NOW);
        assert_eq!(item.name, "Carrot");
        assert_eq!(item.status(NOW, EXPIRING_SOON_WINDOW), Status::Active);

        let at_expiry = NOW + scan.estimated_duration();
        assert_eq!(item.status(at_expiry, EXPIRING_SOON_WINDOW), Status::ExpiringSoon);
        assert_eq!(item.status(at_expiry + Duration::seconds(1), EXPIRING_SOON_WINDOW), Status::Expired);
    }

    #[test]
    fn status_parses_loosely() {
        assert_eq!("Expired".parse::<Status>(), Ok(Status::Expired));
        assert_eq!("expiring-soon".parse::<Status>(), Ok(Status::ExpiringSoon));
        assert!("stale".parse::<Status>().is_err());
    }

    #[test]
    fn item_serializes_rfc3339() {
        let item = TrackedItem::with_id(Uuid::nil(), "Milk", NOW);
        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains("2024-10-05T12:00:00Z"));
        assert_eq!(serde_json::to_string(&Status::ExpiringSoon).unwrap(), "\"expiring_soon\"");
    }
}
