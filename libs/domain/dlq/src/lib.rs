// [libs/domain/dlq/src/lib.rs]
//! Dead-letter store and replay worker for billing commits that
//! ultimately could not be committed by `gateway-budget` or
//! `gateway-settlement`. Entries are keyed by reservation id and carry
//! enough context — tenant, actual cost, trace id, failure reason — to
//! be replayed against the downstream billing endpoint without
//! consulting anything else. A replay worker claims ready entries under
//! an exclusive lease, retries with exponential backoff, and moves an
//! entry to a terminal poison partition once it exhausts its retry
//! budget.

mod backend;
mod entry;
mod worker;

pub use backend::{DlqBackend, InMemoryDlqBackend};
pub use entry::DlqEntry;
pub use worker::{health, DlqHealth, ReplayOutcome, ReplaySettings, ReplayTarget, ReplayWorker};
