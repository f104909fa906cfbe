// [apps/gateway/src/lib.rs]
//! Composition root for the billing, persistence, and provider-invocation
//! substrate. This crate owns startup wiring and the health/readiness
//! HTTP surface; it contains no business logic of its own — every
//! durable behavior lives in the `gateway-*` library crates it assembles.

pub mod background;
pub mod routes;
pub mod state;

pub use state::AppState;
