// [libs/core/state-store/src/atomic.rs]
use crate::scripts::{ATOMIC_COST_COMMIT_SCRIPT, ATOMIC_VERIFY_SCRIPT};
use crate::trait_def::StateStore;
use gateway_error::{ErrorKind, GatewayError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CostCommitOutcome {
    Duplicate { cached_cost: String },
    New { new_budget: String },
}

pub const IDEMPOTENCY_TTL_SECONDS: u64 = 24 * 60 * 60;

/// Typed wrapper around [`ATOMIC_COST_COMMIT_SCRIPT`].
pub async fn atomic_cost_commit(
    store: &dyn StateStore,
    budget_key: &str,
    idempotency_key: &str,
    headroom_key: &str,
    cost_micro: &str,
    reconciliation_status: &str,
) -> Result<CostCommitOutcome, GatewayError> {
    let keys = vec![budget_key.to_string(), idempotency_key.to_string(), headroom_key.to_string()];
    let args = vec![cost_micro.to_string(), IDEMPOTENCY_TTL_SECONDS.to_string(), reconciliation_status.to_string()];
    let reply = store.eval(ATOMIC_COST_COMMIT_SCRIPT, &keys, &args).await?;
    match reply.as_slice() {
        [tag, value] if tag == "duplicate" => Ok(CostCommitOutcome::Duplicate { cached_cost: value.clone() }),
        [tag, value] if tag == "new" => Ok(CostCommitOutcome::New { new_budget: value.clone() }),
        other => Err(GatewayError::new(ErrorKind::Io, format!("unexpected atomicCostCommit reply: {other:?}"))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Success,
    NonceNotFound,
    RaceLost,
    ReplayDetected,
}

/// Typed wrapper around [`ATOMIC_VERIFY_SCRIPT`].
pub async fn atomic_verify(
    store: &dyn StateStore,
    challenge_key: &str,
    consumed_key: &str,
    replay_key: &str,
    replay_ttl_seconds: u64,
    tx_hash: &str,
) -> Result<VerifyOutcome, GatewayError> {
    let keys = vec![challenge_key.to_string(), consumed_key.to_string(), replay_key.to_string()];
    let args = vec![replay_ttl_seconds.to_string(), tx_hash.to_string()];
    let reply = store.eval(ATOMIC_VERIFY_SCRIPT, &keys, &args).await?;
    match reply.first().map(String::as_str) {
        Some("SUCCESS") => Ok(VerifyOutcome::Success),
        Some("NONCE_NOT_FOUND") => Ok(VerifyOutcome::NonceNotFound),
        Some("RACE_LOST") => Ok(VerifyOutcome::RaceLost),
        Some("REPLAY_DETECTED") => Ok(VerifyOutcome::ReplayDetected),
        other => Err(GatewayError::new(ErrorKind::Io, format!("unexpected atomicVerify reply: {other:?}"))),
    }
}
