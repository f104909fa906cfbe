// [libs/domain/budget/src/lib.rs]
//! Write-ahead-to-ledger, atomic-commit-to-store budget protocol.
//! `BudgetCommitter::record_cost` is the only entry
//! point: it never updates the authoritative budget counter without a
//! ledger entry backing it, so a crash between the two steps is always
//! recoverable from the ledger alone.

use gateway_error::{ErrorKind, GatewayError};
use gateway_ledger::{Ledger, LedgerEntry};
use gateway_state_store::{atomic_cost_commit, CostCommitOutcome, SetOptions, StateStore};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconciliationStatus {
    Ok,
    /// Instructs `atomicCostCommit` to also decrement the headroom
    /// counter — used when the caller proceeded under a fail-open
    /// admission decision upstream and now needs the headroom budget
    /// charged against that leniency.
    FailOpen,
}

impl ReconciliationStatus {
    fn as_script_arg(self) -> &'static str {
        match self {
            ReconciliationStatus::Ok => "OK",
            ReconciliationStatus::FailOpen => "FAIL_OPEN",
        }
    }
}

/// Outcome of [`BudgetCommitter::record_cost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitResult {
    /// Ledger and store both committed on this call.
    Committed { new_budget_micro: String },
    /// The idempotency key had already been charged; no new charge was
    /// made and the cached amount is returned.
    Duplicate { cached_cost_micro: String },
    /// The ledger entry is durable but the store commit could not be
    /// attempted because the store was unreachable. `recover_from_journal`
    /// will reconcile the counter from the ledger on the next pass.
    JournalOnly,
}

#[derive(Clone)]
pub struct BudgetCommitter {
    ledger: Ledger,
    store: Arc<dyn StateStore>,
}

fn budget_key(tenant: &str) -> String {
    format!("budget:{tenant}:spent_micro")
}

fn headroom_key(tenant: &str) -> String {
    format!("budget:{tenant}:headroom_micro")
}

fn idempotency_key(tenant: &str, trace_id: &str, stable_key: &str) -> String {
    format!("idempotency:{tenant}:{trace_id}:{stable_key}")
}

impl BudgetCommitter {
    pub fn new(ledger: Ledger, store: Arc<dyn StateStore>) -> Self {
        Self { ledger, store }
    }

    /// Records a billable event. `idempotency_key` should be a stable
    /// fingerprint of the originating request body — retries of the
    /// exact same body collapse to one commit; a different body (even
    /// for the same trace) produces a new commit by design.
    pub async fn record_cost(
        &self,
        tenant: &str,
        entry: LedgerEntry,
        idempotency_stable_key: &str,
        reconciliation: ReconciliationStatus,
    ) -> Result<CommitResult, GatewayError> {
        entry.validate()?;
        let trace_id = entry.trace_id.clone();
        let cost_micro = entry.total_cost_micro.clone();

        self.ledger
        .append(tenant, entry)
        .await
        .map_err(|e| GatewayError::new(ErrorKind::JournalFailed, format!("ledger append failed: {e}")))?;

        let idem_key = idempotency_key(tenant, &trace_id, idempotency_stable_key);
        let outcome = match atomic_cost_commit(
            self.store.as_ref(),
            &budget_key(tenant),
            &idem_key,
            &headroom_key(tenant),
            &cost_micro,
            reconciliation.as_script_arg(),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!(error = %err, tenant, "store unreachable after ledger write; deferring to recovery");
                return Ok(CommitResult::JournalOnly);
            }
        };

        Ok(match outcome {
                CostCommitOutcome::New { new_budget } => CommitResult::Committed { new_budget_micro: new_budget },
                CostCommitOutcome::Duplicate { cached_cost } => CommitResult::Duplicate { cached_cost_micro: cached_cost },
        })
    }

    /// Recomputes the tenant's total cost from the ledger (repairing any
    /// corruption first) and overwrites the authoritative store counter —
    /// `SET`, never `INCRBY` — so this is idempotent no matter how many
    /// times it runs.
    pub async fn recover_from_journal(&self, tenant: &str) -> Result<String, GatewayError> {
        self.ledger.recover(tenant)?;
        let stats = self.ledger.recompute(tenant)?;
        self.store.set(&budget_key(tenant), &stats.total_cost_micro, SetOptions::default()).await?;
        Ok(stats.total_cost_micro)
    }
}
