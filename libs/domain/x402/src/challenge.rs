// [libs/domain/x402/src/challenge.rs]
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A server-issued, HMAC-bound authorization to submit a payment for a
/// specific request. Stored keyed by nonce with a TTL; the
/// HMAC covers every field below it so a forged or replayed challenge
/// cannot be altered in transit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Challenge {
    pub nonce: String,
    pub recipient: String,
    /// Micro-USDC, as a decimal string — never a float.
    pub amount: String,
    pub request_binding: String,
    pub method: String,
    pub path: String,
    pub issued_at: DateTime<Utc>,
    pub expiry: DateTime<Utc>,
    pub hmac: String,
}

/// `request_binding` = hash(token_id, model, max_tokens). Plain SHA-256 over a delimiter-joined tuple; collisions
/// would require a hash break, not just a guessed tuple.
pub fn request_binding(token_id: &str, model: &str, max_tokens: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token_id.as_bytes());
    hasher.update(b"\0");
    hasher.update(model.as_bytes());
    hasher.update(b"\0");
    hasher.update(max_tokens.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

impl Challenge {
    /// Canonical bytes the HMAC is computed over — every field in a
    /// fixed order, NUL-delimited so no field's content can be crafted
    /// to shift a boundary into an adjacent field.
    pub fn canonical_bytes(
        nonce: &str,
        recipient: &str,
        amount: &str,
        request_binding: &str,
        method: &str,
        path: &str,
        issued_at: &DateTime<Utc>,
        expiry: &DateTime<Utc>,
    ) -> Vec<u8> {
        let parts = [
            nonce,
            recipient,
            amount,
            request_binding,
            method,
            path,
            &issued_at.to_rfc3339(),
            &expiry.to_rfc3339(),
        ];
        parts.join("\0").into_bytes()
    }

    pub fn own_canonical_bytes(&self) -> Vec<u8> {
        Self::canonical_bytes(
            &self.nonce,
            &self.recipient,
            &self.amount,
            &self.request_binding,
            &self.method,
            &self.path,
            &self.issued_at,
            &self.expiry,
        )
    }
}

pub const CHALLENGE_KEY_PREFIX: &str = "x402:challenge:";

pub fn challenge_key(nonce: &str) -> String {
    format!("{CHALLENGE_KEY_PREFIX}{nonce}")
}

pub fn consumed_key(nonce: &str) -> String {
    format!("{}{nonce}:consumed", CHALLENGE_KEY_PREFIX)
}

pub fn replay_key(tx_hash: &str) -> String {
    format!("x402:replay:{tx_hash}")
}
