// [libs/domain/idempotency/src/nonce.rs]
use gateway_error::{ErrorKind, GatewayError};
use gateway_state_store::{SetOptions, StateStore};
use std::time::Duration;

/// Write-once replay guard, independent of [`crate::cache::IdempotencyCache`]:
/// this is for consumption markers (e.g. a tool nonce), not cached
/// results. Unlike the result cache, there is no in-process fallback —
/// if the store is unreachable the call fails closed with
/// `NONCE_UNAVAILABLE` rather than silently allowing a possible replay
pub async fn consume_once(store: &dyn StateStore, key: &str, ttl: Duration) -> Result<bool, GatewayError> {
    store.set(key, "1", SetOptions { ttl: Some(ttl), only_if_absent: true }).await.map_err(|_| {
            GatewayError::new(ErrorKind::NonceUnavailable, "nonce replay store unreachable, failing closed")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_state_store::InMemoryStateStore;

    #[tokio::test]
    async fn first_consumption_succeeds_second_is_rejected() {
        let store = InMemoryStateStore::new();
        assert!(consume_once(&store, "nonce:1", Duration::from_secs(60)).await.unwrap());
        assert!(!consume_once(&store, "nonce:1", Duration::from_secs(60)).await.unwrap());
    }
}
