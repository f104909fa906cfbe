// [libs/core/state-store/src/lib.rs]
//! Abstract ordered key-value store with scripted atomic multi-key
//! operations. [`StateStore`] is the seam every
//! component above it (rate limiter, budget committer, x402 verifier)
//! programs against; [`RedisStateStore`] and [`InMemoryStateStore`] are
//! its two implementations.

mod atomic;
mod memory;
mod redis_store;
mod scripts;
mod trait_def;

pub use atomic::{atomic_cost_commit, atomic_verify, CostCommitOutcome, VerifyOutcome, IDEMPOTENCY_TTL_SECONDS};
pub use memory::InMemoryStateStore;
pub use redis_store::RedisStateStore;
pub use scripts::{ATOMIC_COST_COMMIT_SCRIPT, ATOMIC_VERIFY_SCRIPT, RPM_ADMIT_SCRIPT, TPM_ADMIT_SCRIPT};
pub use trait_def::{SetOptions, StateStore};
