// [apps/gateway/src/background.rs]
use crate::state::AppState;
use async_trait::async_trait;
use gateway_budget::BudgetCommitter;
use gateway_dlq::{DlqEntry, ReplaySettings, ReplayTarget, ReplayWorker};
use gateway_error::GatewayError;
use std::sync::Arc;
use std::time::Duration;

/// Replays a dead-lettered commit by reconciling the tenant's budget
/// counter from the ledger. The ledger append for a DLQ'd entry already
/// succeeded — what failed was the atomic store commit — so the correct
/// replay action is `recover_from_journal`, not re-appending: it
/// recomputes the tenant's total from the ledger and overwrites the
/// store counter with `SET`, which is safe to repeat.
struct LedgerReconcileTarget {
    budget: Arc<BudgetCommitter>,
}

#[async_trait]
impl ReplayTarget for LedgerReconcileTarget {
    async fn replay(&self, entry: &DlqEntry) -> Result<(), GatewayError> {
        self.budget.recover_from_journal(&entry.tenant).await?;
        Ok(())
    }
}

/// Spawns the DLQ replay worker loop. Ticks every `interval`, doing at
/// most one claim-and-replay per tick; a quiet queue just logs `Idle` at
/// trace level and waits for the next tick.
pub fn spawn_dlq_replay_loop(state: AppState, interval: Duration) {
    tokio::spawn(async move {
        let worker = ReplayWorker::new(state.dlq.clone(), Arc::new(LedgerReconcileTarget { budget: state.budget.clone() }), ReplaySettings::default());
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match worker.run_once().await {
                Ok(outcome) => tracing::trace!(?outcome, "dlq replay tick"),
                Err(err) => tracing::error!(error = %err, "dlq replay tick failed"),
            }
        }
    });
}

/// Spawns the archival sync loop. A no-op (does nothing, logs once) when
/// no object store is configured — archival is an off-node backstop, not
/// a hard dependency for serving requests. When a git mirror is also
/// configured, every successful sync additionally commits the same
/// segment bytes to the append-only mirror branch; `git2` is a blocking
/// library, so that step runs on `spawn_blocking` rather than the async
/// loop's own task.
pub fn spawn_archival_sync_loop(state: AppState, interval: Duration) {
    let Some(archival) = state.archival.clone() else {
        tracing::info!("archival sync disabled: no ARCHIVAL_OBJECT_STORE_URL configured");
        return;
    };
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match archival.sync_once(&state.wal, &state.ledger).await {
                Ok(checkpoint) => {
                    tracing::info!(head_seq = checkpoint.head_seq, segments = checkpoint.segments.len(), "archival sync completed");
                    if let Some(mirror) = state.git_mirror.clone() {
                        mirror_to_git(mirror, &state).await;
                    }
                }
                Err(err) => tracing::error!(error = %err, "archival sync failed"),
            }
        }
    });
}

async fn mirror_to_git(mirror: Arc<gateway_archival::GitMirror>, state: &AppState) {
    let mut files = Vec::new();
    for path in state.wal.list_segments() {
        if let Ok(bytes) = std::fs::read(&path) {
            if let Some(name) = path.file_name() {
                files.push((std::path::PathBuf::from("segments").join(name), bytes));
            }
        }
    }
    for tenant in state.ledger.get_tenant_ids().unwrap_or_default() {
        for path in state.ledger.archive_files(&tenant).unwrap_or_default() {
            if let Ok(bytes) = std::fs::read(&path) {
                if let Some(name) = path.file_name() {
                    files.push((std::path::PathBuf::from("ledger").join(&tenant).join(name), bytes));
                }
            }
        }
    }

    let result = tokio::task::spawn_blocking(move || mirror.commit_snapshot(&files)).await;
    match result {
        Ok(Ok(commit_id)) => tracing::info!(commit_id = %commit_id, "archival git mirror updated"),
        Ok(Err(err)) => tracing::error!(error = %err, "archival git mirror commit failed"),
        Err(join_err) => tracing::error!(error = %join_err, "archival git mirror task panicked"),
    }
}
