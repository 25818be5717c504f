use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use super::pipeline::{ScanError, ScanReport};

pub const DEFAULT_PENDING_TTL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_MAX_PENDING: usize = 256;

enum Entry {
    InFlight { run: u64, token: CancellationToken },
    Pending { report: ScanReport, parked_at: Instant },
}

/// Handle for one pipeline run, returned by [`ScanRegistry::begin`].
#[derive(Debug, Clone)]
pub struct ScanTicket {
    pub id: Uuid,
    run: u64,
    pub token: CancellationToken,
}

/// Outcome of [`ScanRegistry::dismiss`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dismissed {
    Cancelled,
    Discarded,
}

/// Cancels and releases a run when dropped before [`RunGuard::disarm`],
/// e.g. when the request driving it goes away.
pub struct RunGuard<'a> {
    registry: &'a ScanRegistry,
    ticket: Option<ScanTicket>,
}

impl RunGuard<'_> {
    pub fn disarm(mut self) {
        self.ticket = None;
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            ticket.token.cancel();
            self.registry.fail(&ticket);
            debug!(scan_id = %ticket.id, "abandoned scan released");
        }
    }
}

/// Tracks scans between upload and confirmation.
///
/// An id is either in flight (pipeline running) or pending (report waiting
/// for the user). Pending reports expire after a TTL and only the newest
/// `max_pending` are kept. The lock is never held across an await.
pub struct ScanRegistry {
    entries: Mutex<HashMap<Uuid, Entry>>,
    runs: AtomicU64,
    ttl: Duration,
    max_pending: usize,
}

impl Default for ScanRegistry {
    fn default() -> Self {
        Self::with_limits(DEFAULT_PENDING_TTL, DEFAULT_MAX_PENDING)
    }
}

impl ScanRegistry {
    pub fn with_limits(ttl: Duration, max_pending: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            runs: AtomicU64::new(0),
            ttl,
            max_pending,
        }
    }

    /// Drops cancelled runs, expired reports and the oldest reports over the cap.
    fn sweep(&self, entries: &mut HashMap<Uuid, Entry>) {
        let before = entries.len();
        entries.retain(|_, e| match e {
            Entry::InFlight { token, .. } => !token.is_cancelled(),
            Entry::Pending { parked_at, .. } => parked_at.elapsed() < self.ttl,
        });

        let mut pending: Vec<(Instant, Uuid)> = entries
            .iter()
            .filter_map(|(id, e)| match e {
                Entry::Pending { parked_at, .. } => Some((*parked_at, *id)),
                Entry::InFlight { .. } => None,
            })
            .collect();
        if pending.len() > self.max_pending {
            pending.sort();
            let excess = pending.len() - self.max_pending;
            for (_, id) in pending.into_iter().take(excess) {
                entries.remove(&id);
            }
        }

        let swept = before - entries.len();
        if swept > 0 {
            debug!(swept, remaining = entries.len(), "stale scans swept");
        }
    }

    /// Claims `id` for a new pipeline run.
    pub fn begin(&self, id: Uuid) -> Result<ScanTicket, ScanError> {
        let mut entries = self.entries.lock();
        self.sweep(&mut entries);
        if matches!(entries.get(&id), Some(Entry::InFlight { .. })) {
            return Err(ScanError::ScanInFlight(id));
        }
        let run = self.runs.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        // Re-running a pending scan replaces its old report.
        entries.insert(
            id,
            Entry::InFlight {
                run,
                token: token.clone(),
            },
        );
        Ok(ScanTicket { id, run, token })
    }

    pub fn guard(&self, ticket: &ScanTicket) -> RunGuard<'_> {
        RunGuard {
            registry: self,
            ticket: Some(ticket.clone()),
        }
    }

    fn owns(entries: &HashMap<Uuid, Entry>, ticket: &ScanTicket) -> bool {
        matches!(entries.get(&ticket.id), Some(Entry::InFlight { run, .. }) if *run == ticket.run)
    }

    /// Parks a finished report. Returns false when the scan was dismissed
    /// meanwhile, in which case the report is dropped.
    pub fn complete(&self, ticket: &ScanTicket, report: ScanReport) -> bool {
        let mut entries = self.entries.lock();
        if ticket.token.is_cancelled() || !Self::owns(&entries, ticket) {
            debug!(scan_id = %ticket.id, "late scan result discarded");
            return false;
        }
        entries.insert(
            ticket.id,
            Entry::Pending {
                report,
                parked_at: Instant::now(),
            },
        );
        self.sweep(&mut entries);
        true
    }

    /// Drops the in-flight marker after a failed run.
    pub fn fail(&self, ticket: &ScanTicket) {
        let mut entries = self.entries.lock();
        if Self::owns(&entries, ticket) {
            entries.remove(&ticket.id);
        }
    }

    pub fn dismiss(&self, id: Uuid) -> Result<Dismissed, ScanError> {
        match self.entries.lock().remove(&id) {
            Some(Entry::InFlight { token, .. }) => {
                token.cancel();
                Ok(Dismissed::Cancelled)
            }
            Some(Entry::Pending { .. }) => Ok(Dismissed::Discarded),
            None => Err(ScanError::UnknownScan(id)),
        }
    }

    /// Removes and returns a pending report.
    pub fn take(&self, id: Uuid) -> Result<ScanReport, ScanError> {
        let mut entries = self.entries.lock();
        self.sweep(&mut entries);
        match entries.remove(&id) {
            Some(Entry::Pending { report, .. }) => Ok(report),
            Some(inflight @ Entry::InFlight { .. }) => {
                entries.insert(id, inflight);
                Err(ScanError::ScanInFlight(id))
            }
            None => Err(ScanError::UnknownScan(id)),
        }
    }

    /// Puts a report back, e.g. when confirmation was rejected.
    pub fn restore(&self, id: Uuid, report: ScanReport) {
        self.entries.lock().entry(id).or_insert(Entry::Pending {
            report,
            parked_at: Instant::now(),
        });
    }

    pub fn pending(&self, id: Uuid) -> Option<ScanReport> {
        let mut entries = self.entries.lock();
        self.sweep(&mut entries);
        match entries.get(&id) {
            Some(Entry::Pending { report, .. }) => Some(report.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::pipeline::{EstimateOutcome, Recognition, UnavailableKind};

    fn report(label: &str) -> ScanReport {
        ScanReport {
            recognition: Recognition {
                label: label.into(),
                confidence: 0.5,
            },
            estimate: EstimateOutcome::Unavailable {
                kind: UnavailableKind::Generation,
                reason: "offline".into(),
            },
            image_quality: None,
        }
    }

    #[test]
    fn second_concurrent_scan_is_rejected() {
        let reg = ScanRegistry::default();
        let id = Uuid::new_v4();
        let _t = reg.begin(id).unwrap();
        assert!(matches!(reg.begin(id), Err(ScanError::ScanInFlight(x)) if x == id));
        assert!(reg.begin(Uuid::new_v4()).is_ok());
    }

    #[test]
    fn complete_then_take() {
        let reg = ScanRegistry::default();
        let id = Uuid::new_v4();
        let t = reg.begin(id).unwrap();
        assert!(reg.complete(&t, report("Pear")));
        assert_eq!(reg.pending(id).unwrap().recognition.label, "Pear");
        assert_eq!(reg.take(id).unwrap().recognition.label, "Pear");
        assert!(matches!(reg.take(id), Err(ScanError::UnknownScan(_))));
    }

    #[test]
    fn dismissing_in_flight_cancels_and_drops_late_result() {
        let reg = ScanRegistry::default();
        let id = Uuid::new_v4();
        let t = reg.begin(id).unwrap();
        assert_eq!(reg.dismiss(id).unwrap(), Dismissed::Cancelled);
        assert!(t.token.is_cancelled());
        assert!(!reg.complete(&t, report("Pear")));
        assert!(reg.pending(id).is_none());
    }

    #[test]
    fn dismissing_pending_discards() {
        let reg = ScanRegistry::default();
        let id = Uuid::new_v4();
        let t = reg.begin(id).unwrap();
        reg.complete(&t, report("Pear"));
        assert_eq!(reg.dismiss(id).unwrap(), Dismissed::Discarded);
        assert!(matches!(reg.dismiss(id), Err(ScanError::UnknownScan(_))));
    }

    #[test]
    fn take_while_in_flight_keeps_the_run() {
        let reg = ScanRegistry::default();
        let id = Uuid::new_v4();
        let t = reg.begin(id).unwrap();
        assert!(matches!(reg.take(id), Err(ScanError::ScanInFlight(_))));
        assert!(reg.complete(&t, report("Plum")));
    }

    #[test]
    fn stale_run_cannot_overwrite_newer_one() {
        let reg = ScanRegistry::default();
        let id = Uuid::new_v4();
        let old = reg.begin(id).unwrap();
        reg.fail(&old);
        let new = reg.begin(id).unwrap();
        assert!(!reg.complete(&old, report("Old")));
        reg.fail(&old);
        assert!(reg.complete(&new, report("New")));
        assert_eq!(reg.take(id).unwrap().recognition.label, "New");
    }

    #[test]
    fn failed_run_frees_the_id() {
        let reg = ScanRegistry::default();
        let id = Uuid::new_v4();
        let t = reg.begin(id).unwrap();
        reg.fail(&t);
        assert!(reg.begin(id).is_ok());
    }

    #[test]
    fn abandoned_run_frees_the_id() {
        let reg = ScanRegistry::default();
        let id = Uuid::new_v4();
        let t = reg.begin(id).unwrap();
        t.token.cancel();
        assert!(matches!(reg.take(id), Err(ScanError::UnknownScan(_))));
        let again = reg.begin(id).unwrap();
        assert!(!reg.complete(&t, report("Old")));
        assert!(reg.complete(&again, report("New")));
    }

    #[test]
    fn dropped_guard_releases_the_run() {
        let reg = ScanRegistry::default();
        let id = Uuid::new_v4();
        let t = reg.begin(id).unwrap();
        drop(reg.guard(&t));
        assert!(t.token.is_cancelled());
        assert!(reg.entries.lock().is_empty());
        assert!(!reg.complete(&t, report("Late")));
    }

    #[test]
    fn disarmed_guard_keeps_the_run() {
        let reg = ScanRegistry::default();
        let id = Uuid::new_v4();
        let t = reg.begin(id).unwrap();
        reg.guard(&t).disarm();
        assert!(!t.token.is_cancelled());
        assert!(reg.complete(&t, report("Pear")));
    }

    #[test]
    fn abandoned_runs_do_not_accumulate() {
        let reg = ScanRegistry::default();
        for _ in 0..1000 {
            reg.begin(Uuid::new_v4()).unwrap().token.cancel();
        }
        reg.begin(Uuid::new_v4()).unwrap();
        assert_eq!(reg.entries.lock().len(), 1);
    }

    #[test]
    fn expired_reports_are_swept() {
        let reg = ScanRegistry::with_limits(Duration::ZERO, 10);
        let ids: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            let t = reg.begin(*id).unwrap();
            reg.complete(&t, report("Old"));
        }
        assert!(reg.pending(ids[0]).is_none());
        assert!(matches!(reg.take(ids[1]), Err(ScanError::UnknownScan(_))));
        reg.begin(Uuid::new_v4()).unwrap();
        assert_eq!(reg.entries.lock().len(), 1);
    }

    #[test]
    fn unconfirmed_reports_are_capped() {
        let reg = ScanRegistry::with_limits(DEFAULT_PENDING_TTL, 3);
        let mut last = Uuid::nil();
        for _ in 0..1000 {
            last = Uuid::new_v4();
            let t = reg.begin(last).unwrap();
            assert!(reg.complete(&t, report("Fig")));
        }
        assert_eq!(reg.entries.lock().len(), 3);
        assert!(reg.pending(last).is_some());
    }

    #[test]
    fn restore_puts_report_back() {
        let reg = ScanRegistry::default();
        let id = Uuid::new_v4();
        reg.restore(id, report("Fig"));
        assert_eq!(reg.take(id).unwrap().recognition.label, "Fig");
    }
}
