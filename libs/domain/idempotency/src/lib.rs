// [libs/domain/idempotency/src/lib.rs]
//! `(trace, tool, args) -> result` cache with bounded in-process
//! fallback, plus a separate write-once nonce-replay
//! guard used by tool invocations that must not execute twice.

mod cache;
mod canonical;
mod nonce;

pub use cache::{cache_key, IdempotencyCache, DEFAULT_TTL_SECONDS};
pub use canonical::{canonical_string, canonicalize};
pub use nonce::consume_once;
