// [libs/core/state-store/src/memory.rs]
use crate::scripts::{ATOMIC_COST_COMMIT_SCRIPT, ATOMIC_VERIFY_SCRIPT, RPM_ADMIT_SCRIPT, TPM_ADMIT_SCRIPT};
use crate::trait_def::{SetOptions, StateStore};
use async_trait::async_trait;
use gateway_error::{ErrorKind, GatewayError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Default)]
struct Inner {
    kv: HashMap<String, (String, Option<Instant>)>,
    hashes: HashMap<String, HashMap<String, String>>,
    sorted: HashMap<String, Vec<(String, f64)>>,
}

impl Inner {
    fn kv_get(&mut self, key: &str) -> Option<String> {
        let expired = matches!(self.kv.get(key), Some((_, Some(exp))) if Instant::now() >= *exp);
        if expired {
            self.kv.remove(key);
            return None;
        }
        self.kv.get(key).map(|(v, _)| v.clone())
    }

    fn kv_set(&mut self, key: &str, value: String, ttl: Option<Duration>) {
        let expiry = ttl.map(|d| Instant::now() + d);
        self.kv.insert(key.to_string(), (value, expiry));
    }

    fn kv_del(&mut self, key: &str) -> bool {
        self.kv.remove(key).is_some()
    }

    fn kv_incr_by(&mut self, key: &str, delta: i64) -> i64 {
        let current = self.kv_get(key).and_then(|v| v.parse::<i64>().ok()).unwrap_or(0);
        let next = current + delta;
        self.kv_set(key, next.to_string(), None);
        next
    }
}

type ScriptHandler = Box<dyn Fn(&mut Inner, &[String], &[String]) -> Result<Vec<String>, GatewayError> + Send + Sync>;

/// In-process [`StateStore`] double for tests. Registers handlers for
/// the two fixed C3 scripts by matching the script body verbatim, the
/// same way a caller would reference them by the constants in
/// [`crate::scripts`] rather than ad-hoc strings. Callers needing
/// additional scripts (e.g. the rate limiter's RPM/TPM scripts) can
/// register their own handler with [`InMemoryStateStore::register_script`].
pub struct InMemoryStateStore {
    inner: Arc<Mutex<Inner>>,
    scripts: HashMap<&'static str, ScriptHandler>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        let mut scripts: HashMap<&'static str, ScriptHandler> = HashMap::new();
        scripts.insert(ATOMIC_COST_COMMIT_SCRIPT, Box::new(cost_commit_handler));
        scripts.insert(ATOMIC_VERIFY_SCRIPT, Box::new(verify_handler));
        scripts.insert(RPM_ADMIT_SCRIPT, Box::new(rpm_admit_handler));
        scripts.insert(TPM_ADMIT_SCRIPT, Box::new(tpm_admit_handler));
        Self { inner: Arc::new(Mutex::new(Inner::default())), scripts }
    }

    pub fn register_script(&mut self, script: &'static str, handler: ScriptHandler) {
        self.scripts.insert(script, handler);
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

fn cost_commit_handler(inner: &mut Inner, keys: &[String], args: &[String]) -> Result<Vec<String>, GatewayError> {
    let (budget_key, idempotency_key, headroom_key) = (&keys[0], &keys[1], &keys[2]);
    let cost: i64 = args[0]
    .parse()
    .map_err(|_| GatewayError::new(ErrorKind::BudgetInvalid, format!("'{}' is not an integer cost", args[0])))?;
    let ttl_secs: u64 = args[1].parse().unwrap_or(0);
    let reconciliation_status = &args[2];

    if let Some(cached) = inner.kv_get(idempotency_key) {
        return Ok(vec!["duplicate".to_string(), cached]);
    }
    let new_budget = inner.kv_incr_by(budget_key, cost);
    inner.kv_set(idempotency_key, args[0].clone(), Some(Duration::from_secs(ttl_secs)));
    if reconciliation_status == "FAIL_OPEN" {
        inner.kv_incr_by(headroom_key, -cost);
    }
    Ok(vec!["new".to_string(), new_budget.to_string()])
}

fn verify_handler(inner: &mut Inner, keys: &[String], args: &[String]) -> Result<Vec<String>, GatewayError> {
    let (challenge_key, consumed_key, replay_key) = (&keys[0], &keys[1], &keys[2]);
    let ttl_secs: u64 = args[0].parse().unwrap_or(0);
    let tx_hash = &args[1];

    if inner.kv_get(challenge_key).is_none() {
        return Ok(vec!["NONCE_NOT_FOUND".to_string()]);
    }
    if inner.kv_get(consumed_key).is_some() {
        return Ok(vec!["RACE_LOST".to_string()]);
    }
    if inner.kv_get(replay_key).is_some() {
        return Ok(vec!["REPLAY_DETECTED".to_string()]);
    }
    inner.kv_set(consumed_key, "1".to_string(), None);
    inner.kv_set(replay_key, tx_hash.clone(), Some(Duration::from_secs(ttl_secs)));
    inner.kv_del(challenge_key);
    Ok(vec!["SUCCESS".to_string()])
}

fn rpm_admit_handler(inner: &mut Inner, keys: &[String], args: &[String]) -> Result<Vec<String>, GatewayError> {
    let key = &keys[0];
    let now: f64 = args[0].parse().unwrap_or(0.0);
    let window: f64 = args[1].parse().unwrap_or(60_000.0);
    let limit: usize = args[2].parse().unwrap_or(0);
    let member = &args[3];
    let cutoff = now - window;

    let set = inner.sorted.entry(key.clone()).or_default();
    set.retain(|(_, score)| *score >= cutoff);
    if set.len() < limit {
        set.push((member.clone(), now));
        Ok(vec!["admitted".to_string()])
    } else {
        Ok(vec!["denied".to_string()])
    }
}

fn tpm_admit_handler(inner: &mut Inner, keys: &[String], args: &[String]) -> Result<Vec<String>, GatewayError> {
    let (current_key, previous_key) = (&keys[0], &keys[1]);
    let tokens: i64 = args[0]
    .parse()
    .map_err(|_| GatewayError::new(ErrorKind::BudgetInvalid, format!("'{}' is not an integer token count", args[0])))?;
    let elapsed: f64 = args[1].parse().unwrap_or(0.0);
    let limit: f64 = args[2].parse().unwrap_or(0.0);
    let bucket = &args[3];

    let sum = |inner: &Inner, key: &str| -> i64 {
        inner.hashes.get(key).map(|h| h.values().filter_map(|v| v.parse::<i64>().ok()).sum()).unwrap_or(0)
    };
    let previous_sum = sum(inner, previous_key) as f64;
    let current_sum = sum(inner, current_key) as f64;
    let effective = previous_sum * (1.0 - elapsed) + current_sum;

    if effective + tokens as f64 <= limit {
        let hash = inner.hashes.entry(current_key.clone()).or_default();
        let slot = hash.entry(bucket.clone()).or_insert_with(|| "0".to_string());
        let next = slot.parse::<i64>().unwrap_or(0) + tokens;
        *slot = next.to_string();
        Ok(vec!["admitted".to_string()])
    } else {
        Ok(vec!["denied".to_string()])
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>, GatewayError> {
        Ok(self.inner.lock().await.kv_get(key))
    }

    async fn set(&self, key: &str, value: &str, opts: SetOptions) -> Result<bool, GatewayError> {
        let mut inner = self.inner.lock().await;
        if opts.only_if_absent && inner.kv_get(key).is_some() {
            return Ok(false);
        }
        inner.kv_set(key, value.to_string(), opts.ttl);
        Ok(true)
    }

    async fn del(&self, key: &str) -> Result<bool, GatewayError> {
        Ok(self.inner.lock().await.kv_del(key))
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, GatewayError> {
        Ok(self.inner.lock().await.kv_incr_by(key, delta))
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, GatewayError> {
        Ok(self.inner.lock().await.hashes.get(key).cloned().unwrap_or_default())
    }

    async fn sorted_set_add(&self, key: &str, member: &str, score: f64) -> Result<(), GatewayError> {
        let mut inner = self.inner.lock().await;
        let set = inner.sorted.entry(key.to_string()).or_default();
        if let Some(existing) = set.iter_mut().find(|(m, _)| m == member) {
            existing.1 = score;
        } else {
            set.push((member.to_string(), score));
        }
        Ok(())
    }

    async fn sorted_set_card(&self, key: &str, min: f64, max: f64) -> Result<u64, GatewayError> {
        let inner = self.inner.lock().await;
        let count = inner.sorted.get(key).map(|s| s.iter().filter(|(_, score)| *score >= min && *score <= max).count()).unwrap_or(0);
        Ok(count as u64)
    }

    async fn sorted_set_remove_by_score(&self, key: &str, min: f64, max: f64) -> Result<u64, GatewayError> {
        let mut inner = self.inner.lock().await;
        let Some(set) = inner.sorted.get_mut(key) else { return Ok(0) };
        let before = set.len();
        set.retain(|(_, score)| !(*score >= min && *score <= max));
        Ok((before - set.len()) as u64)
    }

    async fn eval(&self, script: &'static str, keys: &[String], args: &[String]) -> Result<Vec<String>, GatewayError> {
        let handler = self
        .scripts
        .get(script)
        .ok_or_else(|| GatewayError::new(ErrorKind::ConfigInvalid, "no handler registered for this script"))?;
        let mut inner = self.inner.lock().await;
        handler(&mut inner, keys, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_only_if_absent_refuses_overwrite() {
        let store = InMemoryStateStore::new();
        assert!(store.set("k", "v1", SetOptions::only_if_absent()).await.unwrap());
        assert!(!store.set("k", "v2", SetOptions::only_if_absent()).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some("v1".to_string()));
    }

    #[tokio::test]
    async fn sorted_set_card_counts_within_range() {
        let store = InMemoryStateStore::new();
        store.sorted_set_add("rpm:t1", "a", 10.0).await.unwrap();
        store.sorted_set_add("rpm:t1", "b", 20.0).await.unwrap();
        store.sorted_set_add("rpm:t1", "c", 30.0).await.unwrap();
        assert_eq!(store.sorted_set_card("rpm:t1", 15.0, 30.0).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn sorted_set_remove_by_score_prunes_window() {
        let store = InMemoryStateStore::new();
        store.sorted_set_add("rpm:t1", "a", 1.0).await.unwrap();
        store.sorted_set_add("rpm:t1", "b", 100.0).await.unwrap();
        let removed = store.sorted_set_remove_by_score("rpm:t1", 0.0, 50.0).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.sorted_set_card("rpm:t1", 0.0, 1000.0).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn incr_by_accumulates() {
        let store = InMemoryStateStore::new();
        assert_eq!(store.incr_by("counter", 5).await.unwrap(), 5);
        assert_eq!(store.incr_by("counter", 3).await.unwrap(), 8);
    }
}
