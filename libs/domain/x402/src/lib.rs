// [libs/domain/x402/src/lib.rs]
//! Challenge issuance, HMAC verification, on-chain receipt parsing, and
//! atomic replay protection. [`X402Verifier::issue`]
//! produces a [`Challenge`] bound to one request; [`X402Verifier::verify`]
//! runs a strict, fail-fast ten-step check — every
//! earlier-numbered check rejects before a later one runs, so the
//! on-chain RPC call never executes for a forged challenge and the
//! replay marker in the store is never poisoned by an invalid request.

mod challenge;
mod hmac_sign;
mod rpc;

pub use challenge::{challenge_key, consumed_key, replay_key, request_binding, Challenge};
pub use rpc::{RpcPool, TransactionReceipt, TransferLog};

use chrono::{Duration as ChronoDuration, Utc};
use gateway_error::{ErrorKind, GatewayError};
use gateway_state_store::{atomic_verify, SetOptions, StateStore, VerifyOutcome};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct X402Settings {
    pub min_confirmations: u64,
    pub challenge_secret: String,
    pub challenge_secret_previous: Option<String>,
    pub token_address: String,
    pub treasury_address: String,
    pub quote_ttl_seconds: u64,
    /// TTL the replay marker is held for after a successful verification.
    pub replay_ttl_seconds: u64,
}

impl Default for X402Settings {
    fn default() -> Self {
        Self {
            min_confirmations: 10,
            challenge_secret: String::new(),
            challenge_secret_previous: None,
            token_address: String::new(),
            treasury_address: String::new(),
            quote_ttl_seconds: 300,
            replay_ttl_seconds: 24 * 60 * 60,
        }
    }
}

/// A verified payment receipt returned from a successful [`X402Verifier::verify`].
#[derive(Debug, Clone)]
pub struct VerifiedReceipt {
    pub tx_hash: String,
    pub amount: String,
    pub recipient: String,
}

/// The request attributes a verification is bound against.
#[derive(Debug, Clone, Copy)]
pub struct VerifyRequest<'a> {
    pub nonce: &'a str,
    pub token_id: &'a str,
    pub model: &'a str,
    pub max_tokens: u64,
    pub method: &'a str,
    pub path: &'a str,
    pub tx_hash: &'a str,
}

pub struct X402Verifier {
    store: Arc<dyn StateStore>,
    rpc: Arc<dyn RpcPool>,
    settings: X402Settings,
}

impl X402Verifier {
    pub fn new(store: Arc<dyn StateStore>, rpc: Arc<dyn RpcPool>, settings: X402Settings) -> Self {
        Self { store, rpc, settings }
    }

    /// Issues a challenge bound to `method`/`path` and the request's
    /// token/model/max_tokens triple, HMAC-tagged with the current
    /// secret, and stores it keyed by nonce with the configured TTL.
    pub async fn issue(
        &self,
        recipient: &str,
        amount: &str,
        token_id: &str,
        model: &str,
        max_tokens: u64,
        method: &str,
        path: &str,
    ) -> Result<Challenge, GatewayError> {
        let nonce = Uuid::new_v4().to_string();
        let issued_at = Utc::now();
        let expiry = issued_at + ChronoDuration::seconds(self.settings.quote_ttl_seconds as i64);
        let binding = request_binding(token_id, model, max_tokens);

        let bytes = Challenge::canonical_bytes(&nonce, recipient, amount, &binding, method, path, &issued_at, &expiry);
        let hmac = hmac_sign::sign(&self.settings.challenge_secret, &bytes);

        let challenge = Challenge {
            nonce: nonce.clone(),
            recipient: recipient.to_string(),
            amount: amount.to_string(),
            request_binding: binding,
            method: method.to_string(),
            path: path.to_string(),
            issued_at,
            expiry,
            hmac,
        };

        let serialized = serde_json::to_string(&challenge).map_err(|e| GatewayError::new(ErrorKind::Io, e.to_string()))?;
        self.store
        .set(&challenge_key(&nonce), &serialized, SetOptions::with_ttl(std::time::Duration::from_secs(self.settings.quote_ttl_seconds)))
        .await?;

        Ok(challenge)
    }

    /// Runs the strict ten-step verification. Any rejection
    /// records an audit event before returning — see [`audit`].
    pub async fn verify(&self, request: &VerifyRequest<'_>) -> Result<VerifiedReceipt, GatewayError> {
        // 1. fetch challenge
        let raw = self.store.get(&challenge_key(request.nonce)).await?;
        let Some(raw) = raw else {
            return self.reject(request.nonce, ErrorKind::NonceNotFound, "challenge not found");
        };
        let challenge: Challenge = match serde_json::from_str(&raw) {
            Ok(c) => c,
            Err(_) => return self.reject(request.nonce, ErrorKind::ChallengeCorrupt, "challenge record is unparseable"),
        };

        // 2. verify HMAC
        let bytes = challenge.own_canonical_bytes();
        let hmac_ok = hmac_sign::verify_with_rotation(
            &self.settings.challenge_secret,
            self.settings.challenge_secret_previous.as_deref(),
            &bytes,
            &challenge.hmac,
        );
        if !hmac_ok {
            return self.reject(request.nonce, ErrorKind::HmacInvalid, "HMAC verification failed");
        }

        // 3. verify expiry
        if Utc::now() >= challenge.expiry {
            return self.reject(request.nonce, ErrorKind::ChallengeExpired, "challenge has expired");
        }

        // 4. verify request binding
        let expected_binding = request_binding(request.token_id, request.model, request.max_tokens);
        if expected_binding != challenge.request_binding {
            return self.reject(request.nonce, ErrorKind::BindingMismatch, "request binding does not match challenge");
        }

        // 5. verify method and path
        if challenge.method != request.method || challenge.path != request.path {
            return self.reject(request.nonce, ErrorKind::PathMismatch, "method or path does not match challenge");
        }

        // 6. fetch receipt
        let receipt = match self.rpc.get_transaction_receipt(request.tx_hash).await {
            Ok(Some(receipt)) => receipt,
            Ok(None) => return self.reject(request.nonce, ErrorKind::TxNotFound, "transaction receipt not found"),
            Err(_) => return self.reject(request.nonce, ErrorKind::RpcUnreachable, "RPC pool unreachable"),
        };

        // 7. require success
        if !receipt.success {
            return self.reject(request.nonce, ErrorKind::TxReverted, "transaction reverted");
        }

        // 8. require confirmation depth
        let current_block = match self.rpc.get_block_number().await {
            Ok(block) => block,
            Err(_) => return self.reject(request.nonce, ErrorKind::RpcUnreachable, "RPC pool unreachable"),
        };
        let confirmations = current_block.saturating_sub(receipt.block_number) + 1;
        if confirmations < self.settings.min_confirmations {
            return self.reject(request.nonce, ErrorKind::Pending, "insufficient confirmation depth");
        }

        // 9. parse transfer logs: exactly one matching transfer. Sender is
        // deliberately not checked — smart-contract wallets and relayers
        // are permitted to submit on a payer's behalf.
        let matches: Vec<&TransferLog> = receipt
        .logs
        .iter()
        .filter(|log| {
                log.emitter.eq_ignore_ascii_case(&self.settings.token_address)
                && log.to.eq_ignore_ascii_case(&challenge.recipient)
                && log.value == challenge.amount
        })
        .collect();
        if matches.len() != 1 {
            return self.reject(request.nonce, ErrorKind::TransferNotFound, "no single matching transfer log");
        }

        // 10. atomic verify: consume nonce, mark tx_hash replayed.
        let outcome = atomic_verify(
            self.store.as_ref(),
            &challenge_key(request.nonce),
            &consumed_key(request.nonce),
            &replay_key(request.tx_hash),
            self.settings.replay_ttl_seconds,
            request.tx_hash,
        )
        .await?;

        match outcome {
            VerifyOutcome::Success => {
                audit(request.nonce, "verified");
                Ok(VerifiedReceipt {
                        tx_hash: request.tx_hash.to_string(),
                        amount: challenge.amount,
                        recipient: challenge.recipient,
                })
            }
            VerifyOutcome::NonceNotFound => self.reject(request.nonce, ErrorKind::NonceNotFound, "challenge expired mid-flight"),
            VerifyOutcome::RaceLost => self.reject(request.nonce, ErrorKind::RaceLost, "a concurrent verification is already in progress"),
            VerifyOutcome::ReplayDetected => self.reject(request.nonce, ErrorKind::ReplayDetected, "transaction hash already consumed"),
        }
    }

    fn reject<T>(&self, nonce: &str, kind: ErrorKind, message: &str) -> Result<T, GatewayError> {
        audit(nonce, kind.as_str());
        Err(GatewayError::new(kind, message))
    }
}

fn audit(nonce: &str, outcome: &str) {
    tracing::info!(target: "x402_audit", nonce, outcome, "x402 verification event");
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_state_store::InMemoryStateStore;
    use std::sync::Mutex as StdMutex;

    struct FakeRpc {
        receipt: StdMutex<Option<TransactionReceipt>>,
        block_number: u64,
    }

    #[async_trait::async_trait]
    impl RpcPool for FakeRpc {
        async fn get_transaction_receipt(&self, _tx_hash: &str) -> Result<Option<TransactionReceipt>, GatewayError> {
            Ok(self.receipt.lock().unwrap().clone())
        }
        async fn get_block_number(&self) -> Result<u64, GatewayError> {
            Ok(self.block_number)
        }
    }

    fn settings() -> X402Settings {
        X402Settings {
            min_confirmations: 10,
            challenge_secret: "secret".into(),
            challenge_secret_previous: None,
            token_address: "0xToken".into(),
            treasury_address: "0xTreasury".into(),
            quote_ttl_seconds: 300,
            replay_ttl_seconds: 86_400,
        }
    }

    fn receipt(block: u64) -> TransactionReceipt {
        TransactionReceipt {
            tx_hash: "0xabc".into(),
            success: true,
            block_number: block,
            logs: vec![TransferLog {
                    emitter: "0xToken".into(),
                    from: "0xPayer".into(),
                    to: "0xTreasury".into(),
                    value: "1000000".into(),
            }],
        }
    }

    #[tokio::test]
    async fn full_lifecycle_succeeds_then_replay_is_rejected() {
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
        let rpc: Arc<dyn RpcPool> = Arc::new(FakeRpc { receipt: StdMutex::new(Some(receipt(100))), block_number: 110 });
        let verifier = X402Verifier::new(store, rpc, settings());

        let challenge = verifier.issue("0xTreasury", "1000000", "nft-7", "gpt-x", 4096, "POST", "/v1/infer").await.unwrap();

        let request = VerifyRequest {
            nonce: &challenge.nonce,
            token_id: "nft-7",
            model: "gpt-x",
            max_tokens: 4096,
            method: "POST",
            path: "/v1/infer",
            tx_hash: "0xabc",
        };
        let verified = verifier.verify(&request).await.unwrap();
        assert_eq!(verified.tx_hash, "0xabc");

        // re-issue a fresh challenge bound to the same tx hash to exercise replay
        let challenge2 = verifier.issue("0xTreasury", "1000000", "nft-7", "gpt-x", 4096, "POST", "/v1/infer").await.unwrap();
        let request2 = VerifyRequest { nonce: &challenge2.nonce, ..request };
        let err = verifier.verify(&request2).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReplayDetected);
    }

    #[tokio::test]
    async fn binding_mismatch_is_rejected_before_rpc_call() {
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
        let rpc: Arc<dyn RpcPool> = Arc::new(FakeRpc { receipt: StdMutex::new(None), block_number: 0 });
        let verifier = X402Verifier::new(store, rpc, settings());

        let challenge = verifier.issue("0xTreasury", "1000000", "nft-7", "gpt-x", 4096, "POST", "/v1/infer").await.unwrap();
        let request = VerifyRequest {
            nonce: &challenge.nonce,
            token_id: "nft-7",
            model: "WRONG_MODEL",
            max_tokens: 4096,
            method: "POST",
            path: "/v1/infer",
            tx_hash: "0xabc",
        };
        let err = verifier.verify(&request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BindingMismatch);
    }

    #[tokio::test]
    async fn insufficient_confirmations_is_pending() {
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
        let rpc: Arc<dyn RpcPool> = Arc::new(FakeRpc { receipt: StdMutex::new(Some(receipt(100))), block_number: 103 });
        let verifier = X402Verifier::new(store, rpc, settings());

        let challenge = verifier.issue("0xTreasury", "1000000", "nft-7", "gpt-x", 4096, "POST", "/v1/infer").await.unwrap();
        let request = VerifyRequest {
            nonce: &challenge.nonce,
            token_id: "nft-7",
            model: "gpt-x",
            max_tokens: 4096,
            method: "POST",
            path: "/v1/infer",
            tx_hash: "0xabc",
        };
        let err = verifier.verify(&request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Pending);
    }
}
