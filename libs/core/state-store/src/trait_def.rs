// [libs/core/state-store/src/trait_def.rs]
use async_trait::async_trait;
use gateway_error::GatewayError;
use std::collections::HashMap;
use std::time::Duration;

/// Options for [`StateStore::set`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    pub ttl: Option<Duration>,
    pub only_if_absent: bool,
}

impl SetOptions {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl: Some(ttl), only_if_absent: false }
    }

    pub fn only_if_absent() -> Self {
        Self { ttl: None, only_if_absent: true }
    }
}

/// Abstract ordered key-value store. Implementations must
/// provide `eval` with exactly the two fixed scripts in [`crate::scripts`]
/// plus whatever rate-limiter scripts the caller supplies — scripts are
/// never synthesized at runtime, so `eval` takes the script body as a
/// `&'static str` rather than building one from parts.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, GatewayError>;

    /// Returns whether the write actually happened (`false` when
    /// `only_if_absent` is set and the key already existed).
    async fn set(&self, key: &str, value: &str, opts: SetOptions) -> Result<bool, GatewayError>;

    async fn del(&self, key: &str) -> Result<bool, GatewayError>;

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, GatewayError>;

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, GatewayError>;

    async fn sorted_set_add(&self, key: &str, member: &str, score: f64) -> Result<(), GatewayError>;

    /// Cardinality of members scored within `[min, max]`.
    async fn sorted_set_card(&self, key: &str, min: f64, max: f64) -> Result<u64, GatewayError>;

    async fn sorted_set_remove_by_score(&self, key: &str, min: f64, max: f64) -> Result<u64, GatewayError>;

    /// Runs a server-side script atomically against the listed keys.
    /// `script` must be one of the fixed constants in
    /// [`crate::scripts`] or a caller-owned equivalent — never built up
    /// at runtime from user input.
    async fn eval(&self, script: &'static str, keys: &[String], args: &[String]) -> Result<Vec<String>, GatewayError>;
}
