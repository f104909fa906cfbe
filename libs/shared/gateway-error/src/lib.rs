// [libs/shared/gateway-error/src/lib.rs]
//! Closed error taxonomy for the billing and provider-invocation substrate.
//!
//! Every component crate (`gateway-wal`, `gateway-ledger`, `gateway-budget`,
//! `gateway-x402`, ...) defines its own `thiserror` error type for failures
//! that are internal to that component, then converts into [`GatewayError`]
//! at the crate boundary via `From`. Callers above the substrate — route
//! handlers, the health surface in `apps/gateway` — only ever see
//! [`GatewayError`] and its [`ErrorKind`].

use serde::Serialize;
use std::fmt;

/// The closed set of error kinds named in the error handling design.
///
/// `#[non_exhaustive]` so a future kind can be added without breaking
/// downstream `match` arms that already handle a wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ErrorKind {
    ConfigInvalid,
    DiskPressure,
    ShuttingDown,
    Io,
    JournalFailed,
    BudgetInvalid,
    NonceNotFound,
    ChallengeCorrupt,
    HmacInvalid,
    ChallengeExpired,
    BindingMismatch,
    PathMismatch,
    TxNotFound,
    TxReverted,
    Pending,
    TransferNotFound,
    ReplayDetected,
    RaceLost,
    RpcUnreachable,
    RpcError,
    SettlementFailed,
    SettlementUnavailable,
    SettlementVerificationFailed,
    RateLimited,
    InsufficientCredits,
    SandboxViolation,
    SandboxTimeout,
    DlqEnqueued,
    /// Nonce-replay protection required but the backing store is absent;
    /// the call fails closed rather than risk an unprotected replay.
    NonceUnavailable,
    /// `finalize`/`rollback` named a reservation id the credit store has
    /// never seen. A no-op from the caller's point of
    /// view, surfaced as an error so it isn't silently swallowed.
    ReservationNotFound,
    /// No ensemble branch produced a first content chunk before the
    /// configured deadline.
    EnsembleTimeout,
    /// Every branch in an ensemble race failed or was cancelled without
    /// ever winning the latch.
    EnsembleAllFailed,
}

impl ErrorKind {
    /// Whether the propagation policy retries this kind inside
    /// the provider adapter with exponential backoff, or surfaces it
    /// immediately to the caller.
    pub const fn retryable(self) -> bool {
        matches!(self, ErrorKind::RpcUnreachable | ErrorKind::SettlementUnavailable)
    }

    /// The user-visible HTTP status this kind maps to.
    pub const fn http_status(self) -> u16 {
        match self {
            ErrorKind::InsufficientCredits => 402,
            ErrorKind::NonceNotFound
            | ErrorKind::ChallengeCorrupt
            | ErrorKind::HmacInvalid
            | ErrorKind::ChallengeExpired
            | ErrorKind::BindingMismatch
            | ErrorKind::PathMismatch
            | ErrorKind::TxNotFound
            | ErrorKind::TxReverted
            | ErrorKind::Pending
            | ErrorKind::TransferNotFound
            | ErrorKind::ReplayDetected
            | ErrorKind::RaceLost => 402,
            ErrorKind::RateLimited => 429,
            ErrorKind::RpcUnreachable | ErrorKind::RpcError | ErrorKind::SettlementUnavailable => 503,
            _ => 500,
        }
    }

    /// The lowercase taxonomy string used as a `tracing` field value and
    /// in structured error bodies, matching the names uses.
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ConfigInvalid => "config_invalid",
            ErrorKind::DiskPressure => "disk_pressure",
            ErrorKind::ShuttingDown => "shutting_down",
            ErrorKind::Io => "io",
            ErrorKind::JournalFailed => "journal_failed",
            ErrorKind::BudgetInvalid => "budget_invalid",
            ErrorKind::NonceNotFound => "nonce_not_found",
            ErrorKind::ChallengeCorrupt => "challenge_corrupt",
            ErrorKind::HmacInvalid => "hmac_invalid",
            ErrorKind::ChallengeExpired => "challenge_expired",
            ErrorKind::BindingMismatch => "binding_mismatch",
            ErrorKind::PathMismatch => "path_mismatch",
            ErrorKind::TxNotFound => "tx_not_found",
            ErrorKind::TxReverted => "tx_reverted",
            ErrorKind::Pending => "pending",
            ErrorKind::TransferNotFound => "transfer_not_found",
            ErrorKind::ReplayDetected => "replay_detected",
            ErrorKind::RaceLost => "race_lost",
            ErrorKind::RpcUnreachable => "rpc_unreachable",
            ErrorKind::RpcError => "rpc_error",
            ErrorKind::SettlementFailed => "settlement_failed",
            ErrorKind::SettlementUnavailable => "settlement_unavailable",
            ErrorKind::SettlementVerificationFailed => "settlement_verification_failed",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::InsufficientCredits => "insufficient_credits",
            ErrorKind::SandboxViolation => "sandbox_violation",
            ErrorKind::SandboxTimeout => "sandbox_timeout",
            ErrorKind::DlqEnqueued => "dlq_enqueued",
            ErrorKind::NonceUnavailable => "nonce_unavailable",
            ErrorKind::ReservationNotFound => "reservation_not_found",
            ErrorKind::EnsembleTimeout => "ensemble_timeout",
            ErrorKind::EnsembleAllFailed => "ensemble_all_failed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A taxonomy-tagged error with a human-readable message, returned across
/// every substrate boundary.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayError {
    pub kind: ErrorKind,
    pub message: String,
}

impl GatewayError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn retryable(&self) -> bool {
        self.kind.retryable()
    }

    pub fn http_status(&self) -> u16 {
        self.kind.http_status()
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::error::Error for GatewayError {}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        GatewayError::new(ErrorKind::Io, err.to_string())
    }
}

/// Structured body for an insufficient-credits rejection.
#[derive(Debug, Clone, Serialize)]
pub struct InsufficientCreditsBody {
    pub balance_cu: i64,
    pub estimated_cost_cu: i64,
    pub deficit_cu: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_credits_maps_to_402() {
        assert_eq!(ErrorKind::InsufficientCredits.http_status(), 402);
    }

    #[test]
    fn rate_limited_maps_to_429() {
        assert_eq!(ErrorKind::RateLimited.http_status(), 429);
    }

    #[test]
    fn rpc_unreachable_is_retryable_and_503() {
        assert!(ErrorKind::RpcUnreachable.retryable());
        assert_eq!(ErrorKind::RpcUnreachable.http_status(), 503);
    }

    #[test]
    fn replay_detected_is_not_retryable() {
        assert!(!ErrorKind::ReplayDetected.retryable());
    }
}
