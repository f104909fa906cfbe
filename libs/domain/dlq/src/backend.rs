// [libs/domain/dlq/src/backend.rs]
use crate::entry::DlqEntry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gateway_error::GatewayError;
use std::collections::HashMap;
use std::sync::Mutex;

/// Backing storage for the dead-letter queue. The abstract state store
/// (`gateway-state-store`) exposes only `get`/`set`/sorted-set
/// cardinality and two fixed scripts — enough for the budget and x402
/// paths, but not for enumerating "which entries are due now", which the
/// replay worker needs. `DlqBackend` is therefore its own seam: a
/// production implementation backs it with whatever the deployment's
/// store supports for range queries (e.g. `ZRANGEBYSCORE` against
/// redis), while `InMemoryDlqBackend` is the in-process double used in
/// tests and by a single-node deployment.
#[async_trait]
pub trait DlqBackend: Send + Sync {
    async fn put(&self, entry: DlqEntry) -> Result<(), GatewayError>;

    /// Claims the earliest entry whose `next_attempt_at` has passed and
    /// that is not already under an unexpired lease, and holds it under
    /// `lease` so a concurrent claimer does not also pick it up.
    async fn claim_ready(&self, now: DateTime<Utc>, lease: std::time::Duration) -> Result<Option<DlqEntry>, GatewayError>;

    /// Acknowledges successful replay: removes the entry permanently.
    async fn ack(&self, reservation_id: &str) -> Result<(), GatewayError>;

    /// Releases a claimed entry back to the ready pool with updated
    /// attempt bookkeeping (used after a retryable replay failure).
    async fn release(&self, entry: DlqEntry) -> Result<(), GatewayError>;

    /// Moves an entry to the terminal poison partition for operator
    /// review after it has exhausted its retry budget.
    async fn poison(&self, entry: DlqEntry) -> Result<(), GatewayError>;

    async fn depth(&self) -> Result<usize, GatewayError>;

    async fn oldest_created_at(&self) -> Result<Option<DateTime<Utc>>, GatewayError>;

    async fn poison_depth(&self) -> Result<usize, GatewayError>;
}

#[derive(Clone)]
enum Slot {
    Ready(DlqEntry),
    Leased(DlqEntry, DateTime<Utc>),
}

impl Slot {
    fn entry(&self) -> &DlqEntry {
        match self {
            Slot::Ready(e) | Slot::Leased(e, _) => e,
        }
    }
}

#[derive(Default)]
pub struct InMemoryDlqBackend {
    live: Mutex<HashMap<String, Slot>>,
    poisoned: Mutex<HashMap<String, DlqEntry>>,
}

impl InMemoryDlqBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DlqBackend for InMemoryDlqBackend {
    async fn put(&self, entry: DlqEntry) -> Result<(), GatewayError> {
        self.live.lock().unwrap().insert(entry.reservation_id.clone(), Slot::Ready(entry));
        Ok(())
    }

    async fn claim_ready(&self, now: DateTime<Utc>, lease: std::time::Duration) -> Result<Option<DlqEntry>, GatewayError> {
        let mut live = self.live.lock().unwrap();
        let candidate_id = live
        .iter()
        .filter(|(_, slot)| match slot {
            Slot::Ready(e) => e.next_attempt_at <= now,
            Slot::Leased(_, until) => *until <= now,
        })
        .min_by_key(|(_, slot)| slot.entry().next_attempt_at)
        .map(|(id, _)| id.clone());

        let Some(id) = candidate_id else { return Ok(None) };
        let entry = live.get(&id).unwrap().entry().clone();
        let lease_until = now + chrono::Duration::from_std(lease).unwrap_or_default();
        live.insert(id, Slot::Leased(entry.clone(), lease_until));
        Ok(Some(entry))
    }

    async fn ack(&self, reservation_id: &str) -> Result<(), GatewayError> {
        self.live.lock().unwrap().remove(reservation_id);
        Ok(())
    }

    async fn release(&self, entry: DlqEntry) -> Result<(), GatewayError> {
        self.live.lock().unwrap().insert(entry.reservation_id.clone(), Slot::Ready(entry));
        Ok(())
    }

    async fn poison(&self, entry: DlqEntry) -> Result<(), GatewayError> {
        let id = entry.reservation_id.clone();
        self.live.lock().unwrap().remove(&id);
        self.poisoned.lock().unwrap().insert(id, entry);
        Ok(())
    }

    async fn depth(&self) -> Result<usize, GatewayError> {
        Ok(self.live.lock().unwrap().len())
    }

    async fn oldest_created_at(&self) -> Result<Option<DateTime<Utc>>, GatewayError> {
        Ok(self.live.lock().unwrap().values().map(|s| s.entry().created_at).min())
    }

    async fn poison_depth(&self) -> Result<usize, GatewayError> {
        Ok(self.poisoned.lock().unwrap().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn claim_skips_entries_not_yet_due() {
        let backend = InMemoryDlqBackend::new();
        let now = Utc::now();
        let mut entry = DlqEntry::new("r1", "tenant-a", "100", "trace-1", "store_down");
        entry.next_attempt_at = now + chrono::Duration::seconds(60);
        backend.put(entry).await.unwrap();

        assert!(backend.claim_ready(now, std::time::Duration::from_secs(30)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn claimed_entry_is_not_claimable_again_until_lease_expires() {
        let backend = InMemoryDlqBackend::new();
        let now = Utc::now();
        let entry = DlqEntry::new("r1", "tenant-a", "100", "trace-1", "store_down");
        backend.put(entry).await.unwrap();

        let claimed = backend.claim_ready(now, std::time::Duration::from_secs(30)).await.unwrap();
        assert!(claimed.is_some());
        assert!(backend.claim_ready(now, std::time::Duration::from_secs(30)).await.unwrap().is_none());

        let later = now + chrono::Duration::seconds(31);
        assert!(backend.claim_ready(later, std::time::Duration::from_secs(30)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn ack_removes_entry_permanently() {
        let backend = InMemoryDlqBackend::new();
        let now = Utc::now();
        backend.put(DlqEntry::new("r1", "tenant-a", "100", "trace-1", "store_down")).await.unwrap();
        backend.claim_ready(now, std::time::Duration::from_secs(30)).await.unwrap();
        backend.ack("r1").await.unwrap();
        assert_eq!(backend.depth().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn poison_moves_out_of_the_live_pool() {
        let backend = InMemoryDlqBackend::new();
        let entry = DlqEntry::new("r1", "tenant-a", "100", "trace-1", "store_down");
        backend.put(entry.clone()).await.unwrap();
        backend.poison(entry).await.unwrap();
        assert_eq!(backend.depth().await.unwrap(), 0);
        assert_eq!(backend.poison_depth().await.unwrap(), 1);
    }
}
