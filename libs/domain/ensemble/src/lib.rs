// [libs/domain/ensemble/src/lib.rs]
//! Races streaming provider pools for a single completion request and
//! attributes cost per branch. Also hosts
//! the two non-streaming selection variants, `best_of_n` and
//! `consensus`, that share the same pool-racing vocabulary.

mod best_of_n;
mod consensus;
mod cost;
mod provider;
mod race;

pub use best_of_n::{best_of_n, ScoredCandidate};
pub use consensus::{consensus, StructuredCandidate};
pub use cost::CostAttribution;
pub use provider::{BranchStream, CompletionRequest, PriceTable, StreamEvent, StreamingProvider, UsageReport};
pub use race::{BranchOutcome, BranchStatus, EnsembleOrchestrator, EnsembleOutcome, PoolSpec};
