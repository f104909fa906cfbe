// [libs/domain/idempotency/src/cache.rs]
use crate::canonical::canonical_string;
use gateway_error::GatewayError;
use gateway_state_store::{SetOptions, StateStore};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub const DEFAULT_TTL_SECONDS: u64 = 120;

/// `trace_id | sha256(toolName || canonical(args))[:32]` — the first 32
/// hex characters of the digest, which is plenty of collision resistance
/// for a cache key while keeping keys short.
pub fn cache_key(trace_id: &str, tool_name: &str, args: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tool_name.as_bytes());
    hasher.update(canonical_string(args).as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{trace_id}|{}", &digest[..32])
}

struct LocalEntry {
    value: String,
    expires_at: Instant,
}

/// Bounded in-process fallback map. Every store write is mirrored here so
/// the cache degrades gracefully to per-replica semantics if the shared
/// store becomes unavailable, rather than failing outright.
struct LocalCache {
    capacity: usize,
    entries: HashMap<String, LocalEntry>,
    order: Vec<String>,
}

impl LocalCache {
    fn new(capacity: usize) -> Self {
        Self { capacity, entries: HashMap::new(), order: Vec::new() }
    }

    fn get(&mut self, key: &str) -> Option<String> {
        let expired = matches!(self.entries.get(key), Some(e) if Instant::now() >= e.expires_at);
        if expired {
            self.entries.remove(key);
        }
        self.entries.get(key).map(|e| e.value.clone())
    }

    fn set(&mut self, key: &str, value: String, ttl: Duration) {
        if !self.entries.contains_key(key) {
            if self.order.len() >= self.capacity {
                if let Some(oldest) = self.order.first().cloned() {
                    self.entries.remove(&oldest);
                    self.order.remove(0);
                }
            }
            self.order.push(key.to_string());
        }
        self.entries.insert(key.to_string(), LocalEntry { value, expires_at: Instant::now() + ttl });
    }
}

/// Caches a tool invocation's result keyed by `(trace, tool, args)`, so
/// a retried call collapses to one effect.
#[derive(Clone)]
pub struct IdempotencyCache {
    store: Arc<dyn StateStore>,
    local: Arc<Mutex<LocalCache>>,
    ttl: Duration,
}

impl IdempotencyCache {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self::with_ttl(store, Duration::from_secs(DEFAULT_TTL_SECONDS))
    }

    pub fn with_ttl(store: Arc<dyn StateStore>, ttl: Duration) -> Self {
        Self { store, local: Arc::new(Mutex::new(LocalCache::new(10_000))), ttl }
    }

    pub async fn get(&self, trace_id: &str, tool_name: &str, args: &Value) -> Result<Option<String>, GatewayError> {
        let key = cache_key(trace_id, tool_name, args);
        match self.store.get(&key).await {
            Ok(value) => Ok(value),
            Err(err) => {
                tracing::warn!(error = %err, "idempotency store unreachable, falling back to in-process cache");
                Ok(self.local.lock().await.get(&key))
            }
        }
    }

    pub async fn set(&self, trace_id: &str, tool_name: &str, args: &Value, result: &str) -> Result<(), GatewayError> {
        let key = cache_key(trace_id, tool_name, args);
        self.local.lock().await.set(&key, result.to_string(), self.ttl);
        if let Err(err) = self.store.set(&key, result, SetOptions::with_ttl(self.ttl)).await {
            tracing::warn!(error = %err, "idempotency store unreachable, write held only in-process");
        }
        Ok(())
    }

    pub async fn has(&self, trace_id: &str, tool_name: &str, args: &Value) -> Result<bool, GatewayError> {
        Ok(self.get(trace_id, tool_name, args).await?.is_some())
    }
}
