// [libs/domain/settlement/src/lib.rs]
//! Facilitator-then-direct payment settlement. A
//! [`CircuitBreaker`] gates the facilitator path; when it is open the
//! direct on-chain fallback is used without attempting the facilitator
//! at all. Every outcome is recorded in the WAL.

mod circuit_breaker;

pub use circuit_breaker::{CircuitBreaker, State as CircuitState};

use async_trait::async_trait;
use gateway_error::{ErrorKind, GatewayError};
use gateway_wal::Wal;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// One leg of payment execution: the primary facilitator or the direct
/// on-chain fallback. Both implement the same shape so the orchestration
/// logic below doesn't care which one it's calling.
#[async_trait]
pub trait PaymentExecutor: Send + Sync {
    async fn execute(&self, recipient: &str, amount: &str) -> Result<String, GatewayError>;
}

/// Confirms that funds for a settlement transaction actually landed at
/// the expected treasury address for the expected amount.
#[async_trait]
pub trait ReceiptVerifier: Send + Sync {
    async fn verify(&self, tx_hash: &str, recipient: &str, amount: &str) -> Result<bool, GatewayError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementOutcome {
    pub tx_hash: String,
    pub via_facilitator: bool,
}

pub struct SettlementService {
    facilitator: Arc<dyn PaymentExecutor>,
    direct: Arc<dyn PaymentExecutor>,
    verifier: Arc<dyn ReceiptVerifier>,
    breaker: CircuitBreaker,
    wal: Wal,
}

impl SettlementService {
    pub fn new(
        facilitator: Arc<dyn PaymentExecutor>,
        direct: Arc<dyn PaymentExecutor>,
        verifier: Arc<dyn ReceiptVerifier>,
        wal: Wal,
        failure_threshold: u32,
        cooldown: Duration,
    ) -> Self {
        Self { facilitator, direct, verifier, breaker: CircuitBreaker::new(failure_threshold, cooldown), wal }
    }

    pub async fn settle(&self, recipient: &str, amount: &str) -> Result<SettlementOutcome, GatewayError> {
        let (tx_hash, via_facilitator) = self.execute_with_fallback(recipient, amount).await?;

        let verified = self.verifier.verify(&tx_hash, recipient, amount).await?;
        if !verified {
            self.record("settlement_verification_failed", recipient, amount, Some(&tx_hash)).await;
            return Err(GatewayError::new(
                    ErrorKind::SettlementVerificationFailed,
                    format!("receipt verification failed for tx {tx_hash}"),
            ));
        }

        self.record("settled", recipient, amount, Some(&tx_hash)).await;
        Ok(SettlementOutcome { tx_hash, via_facilitator })
    }

    async fn execute_with_fallback(&self, recipient: &str, amount: &str) -> Result<(String, bool), GatewayError> {
        if self.breaker.allow_call().await {
            match self.facilitator.execute(recipient, amount).await {
                Ok(tx_hash) => {
                    self.breaker.on_success().await;
                    return Ok((tx_hash, true));
                }
                Err(err) => {
                    self.breaker.on_failure().await;
                    tracing::warn!(error = %err, "facilitator settlement failed, falling back to direct path");
                }
            }
        }

        match self.direct.execute(recipient, amount).await {
            Ok(tx_hash) => Ok((tx_hash, false)),
            Err(err) => {
                self.record("settlement_failed", recipient, amount, None).await;
                Err(GatewayError::new(ErrorKind::SettlementFailed, format!("direct settlement failed: {err}")))
            }
        }
    }

    async fn record(&self, outcome: &str, recipient: &str, amount: &str, tx_hash: Option<&str>) {
        let payload = json!({ "outcome": outcome, "recipient": recipient, "amount": amount, "tx_hash": tx_hash });
        let data = serde_json::to_vec(&payload).ok();
        if let Err(err) = self.wal.append("audit", format!("settlement:{recipient}"), data).await {
            tracing::error!(error = %err, "failed to record settlement outcome in WAL");
        }
    }

    pub async fn circuit_state(&self) -> CircuitState {
        self.breaker.state().await
    }
}
