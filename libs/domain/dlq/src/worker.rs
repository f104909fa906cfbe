// [libs/domain/dlq/src/worker.rs]
use crate::backend::DlqBackend;
use crate::entry::DlqEntry;
use async_trait::async_trait;
use chrono::Utc;
use gateway_error::GatewayError;
use std::sync::Arc;
use std::time::Duration;

/// The downstream billing endpoint a poisoned or pending commit is
/// replayed against. Distinct from `gateway-budget`'s `BudgetCommitter`
/// so the worker can be pointed at a remote billing service in a
/// multi-node deployment without this crate depending on `gateway-ledger`
/// or `gateway-state-store` directly.
#[async_trait]
pub trait ReplayTarget: Send + Sync {
    async fn replay(&self, entry: &DlqEntry) -> Result<(), GatewayError>;
}

#[derive(Debug, Clone, Copy)]
pub struct ReplaySettings {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub lease: Duration,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            base_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(900),
            lease: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// Nothing was due; the worker has no work this tick.
    Idle,
    /// The claimed entry replayed successfully and was acknowledged.
    Replayed,
    /// The claimed entry failed again and was released with a longer
    /// backoff for the next attempt.
    Retrying,
    /// The claimed entry exhausted its retry budget and moved to the
    /// poison partition.
    Poisoned,
}

/// Periodically claims ready dead-letter entries and replays them
/// against `target`. One `run_once` call does at most one claim; callers
/// drive the interval (a `tokio::time::interval` loop in production, a
/// direct call per tick in tests).
pub struct ReplayWorker {
    backend: Arc<dyn DlqBackend>,
    target: Arc<dyn ReplayTarget>,
    settings: ReplaySettings,
}

impl ReplayWorker {
    pub fn new(backend: Arc<dyn DlqBackend>, target: Arc<dyn ReplayTarget>, settings: ReplaySettings) -> Self {
        Self { backend, target, settings }
    }

    pub async fn run_once(&self) -> Result<ReplayOutcome, GatewayError> {
        let now = Utc::now();
        let Some(entry) = self.backend.claim_ready(now, self.settings.lease).await? else {
            return Ok(ReplayOutcome::Idle);
        };

        match self.target.replay(&entry).await {
            Ok(()) => {
                self.backend.ack(&entry.reservation_id).await?;
                Ok(ReplayOutcome::Replayed)
            }
            Err(err) => {
                let attempt_count = entry.attempt_count + 1;
                if attempt_count >= self.settings.max_attempts {
                    tracing::error!(
                        reservation_id = %entry.reservation_id,
                        tenant = %entry.tenant,
                        attempts = attempt_count,
                        error = %err,
                        "dead-letter entry exhausted its retry budget, moving to poison partition"
                    );
                    let mut poisoned = entry;
                    poisoned.attempt_count = attempt_count;
                    poisoned.reason = err.to_string();
                    self.backend.poison(poisoned).await?;
                    Ok(ReplayOutcome::Poisoned)
                } else {
                    let mut retry = entry;
                    retry.attempt_count = attempt_count;
                    retry.reason = err.to_string();
                    retry.next_attempt_at = now + chrono::Duration::from_std(backoff_for(attempt_count, self.settings)).unwrap_or_default();
                    self.backend.release(retry).await?;
                    Ok(ReplayOutcome::Retrying)
                }
            }
        }
    }
}

fn backoff_for(attempt_count: u32, settings: ReplaySettings) -> Duration {
    let multiplier = 1u32.checked_shl(attempt_count.saturating_sub(1)).unwrap_or(u32::MAX);
    settings.base_backoff.saturating_mul(multiplier).min(settings.max_backoff)
}

/// Point-in-time queue health. Every field is `None` rather than an error
/// when the backend is unreachable — health surfaces never throw.
#[derive(Debug, Clone, Copy, Default)]
pub struct DlqHealth {
    pub depth: Option<usize>,
    pub oldest_age: Option<Duration>,
    pub poison_depth: Option<usize>,
}

pub async fn health(backend: &dyn DlqBackend) -> DlqHealth {
    let depth = backend.depth().await.ok();
    let poison_depth = backend.poison_depth().await.ok();
    let oldest_age = match backend.oldest_created_at().await {
        Ok(Some(oldest)) => (Utc::now() - oldest).to_std().ok(),
        _ => None,
    };
    DlqHealth { depth, oldest_age, poison_depth }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryDlqBackend;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct AlwaysFails;
    #[async_trait]
    impl ReplayTarget for AlwaysFails {
        async fn replay(&self, _entry: &DlqEntry) -> Result<(), GatewayError> {
            Err(GatewayError::new(gateway_error::ErrorKind::Io, "downstream unreachable"))
        }
    }

    struct SucceedsAfter {
        remaining_failures: AtomicU32,
    }
    #[async_trait]
    impl ReplayTarget for SucceedsAfter {
        async fn replay(&self, _entry: &DlqEntry) -> Result<(), GatewayError> {
            if self.remaining_failures.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| if n > 0 { Some(n - 1) } else { None }).is_ok() {
                Err(GatewayError::new(gateway_error::ErrorKind::Io, "still unreachable"))
            } else {
                Ok(())
            }
        }
    }

    struct RecordingTarget {
        seen: Mutex<Vec<String>>,
    }
    #[async_trait]
    impl ReplayTarget for RecordingTarget {
        async fn replay(&self, entry: &DlqEntry) -> Result<(), GatewayError> {
            self.seen.lock().unwrap().push(entry.reservation_id.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn idle_when_nothing_is_due() {
        let backend = Arc::new(InMemoryDlqBackend::new());
        let worker = ReplayWorker::new(backend, Arc::new(RecordingTarget { seen: Mutex::new(Vec::new()) }), ReplaySettings::default());
        assert_eq!(worker.run_once().await.unwrap(), ReplayOutcome::Idle);
    }

    #[tokio::test]
    async fn successful_replay_acknowledges_the_entry() {
        let backend = Arc::new(InMemoryDlqBackend::new());
        backend.put(DlqEntry::new("r1", "tenant-a", "100", "trace-1", "store_down")).await.unwrap();
        let target = Arc::new(RecordingTarget { seen: Mutex::new(Vec::new()) });
        let worker = ReplayWorker::new(backend.clone(), target.clone(), ReplaySettings::default());

        assert_eq!(worker.run_once().await.unwrap(), ReplayOutcome::Replayed);
        assert_eq!(backend.depth().await.unwrap(), 0);
        assert_eq!(target.seen.lock().unwrap().as_slice(), &["r1".to_string()]);
    }

    #[tokio::test]
    async fn repeated_failure_past_max_attempts_moves_to_poison() {
        let backend = Arc::new(InMemoryDlqBackend::new());
        backend.put(DlqEntry::new("r1", "tenant-a", "100", "trace-1", "store_down")).await.unwrap();
        let settings = ReplaySettings { max_attempts: 2, base_backoff: Duration::from_millis(1), max_backoff: Duration::from_millis(1), lease: Duration::from_millis(1) };
        let worker = ReplayWorker::new(backend.clone(), Arc::new(AlwaysFails), settings);

        assert_eq!(worker.run_once().await.unwrap(), ReplayOutcome::Retrying);
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(worker.run_once().await.unwrap(), ReplayOutcome::Poisoned);
        assert_eq!(backend.poison_depth().await.unwrap(), 1);
        assert_eq!(backend.depth().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn succeeds_on_a_later_attempt_after_transient_failures() {
        let backend = Arc::new(InMemoryDlqBackend::new());
        backend.put(DlqEntry::new("r1", "tenant-a", "100", "trace-1", "store_down")).await.unwrap();
        let settings = ReplaySettings { max_attempts: 5, base_backoff: Duration::from_millis(1), max_backoff: Duration::from_millis(1), lease: Duration::from_millis(1) };
        let worker = ReplayWorker::new(backend.clone(), Arc::new(SucceedsAfter { remaining_failures: AtomicU32::new(2) }), settings);

        assert_eq!(worker.run_once().await.unwrap(), ReplayOutcome::Retrying);
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(worker.run_once().await.unwrap(), ReplayOutcome::Retrying);
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(worker.run_once().await.unwrap(), ReplayOutcome::Replayed);
    }

    #[tokio::test]
    async fn health_reports_depth_and_oldest_age() {
        let backend = InMemoryDlqBackend::new();
        backend.put(DlqEntry::new("r1", "tenant-a", "100", "trace-1", "store_down")).await.unwrap();
        let health = health(&backend).await;
        assert_eq!(health.depth, Some(1));
        assert!(health.oldest_age.is_some());
        assert_eq!(health.poison_depth, Some(0));
    }
}
