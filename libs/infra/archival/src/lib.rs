// [libs/infra/archival/src/lib.rs]
//! Off-node sync of WAL segments and ledger archives to an object store.
//!
//! `ArchivalSync::sync_once` uploads every WAL segment and per-tenant
//! ledger archive, then writes a checkpoint listing what it shipped and
//! the WAL sequence number it covers up to; `restore` reverses that,
//! verifying each segment's hash before trusting it locally. An optional
//! [`git_mirror::GitMirror`] target commits the same snapshot to an
//! append-only branch in an external repository as a second, independent
//! copy — always through a temporary worktree, never by switching the
//! live process's checkout.

mod checkpoint;
mod git_mirror;
mod object_store;
mod sync;

pub use checkpoint::{sha256_hex, ArchivalCheckpoint, SegmentRecord, CHECKPOINT_KEY};
pub use git_mirror::GitMirror;
pub use object_store::{HttpObjectStore, InMemoryObjectStore, ObjectStore};
pub use sync::ArchivalSync;
