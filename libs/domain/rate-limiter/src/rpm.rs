// [libs/domain/rate-limiter/src/rpm.rs]
use crate::Admission;
use gateway_state_store::{StateStore, RPM_ADMIT_SCRIPT};

const WINDOW_MS: u64 = 60_000;
/// Window plus slack, so an idle pair's sorted set eventually expires.
const KEY_TTL_SECONDS: u64 = 90;

pub fn rpm_key(provider: &str, model: &str) -> String {
    format!("rate:{provider}:{model}:rpm")
}

/// Sliding-window (one minute) RPM admission control, implemented as a
/// single atomic `eval` against the state store.
pub struct RpmLimiter;

impl RpmLimiter {
    pub async fn admit(store: &dyn StateStore, provider: &str, model: &str, limit: u32) -> Admission {
        let keys = vec![rpm_key(provider, model)];
        let now_ms = now_millis();
        let member = format!("{now_ms}-{}", uuid::Uuid::new_v4());
        let args = vec![
            now_ms.to_string(),
            WINDOW_MS.to_string(),
            limit.to_string(),
            member,
            KEY_TTL_SECONDS.to_string(),
        ];
        match store.eval(RPM_ADMIT_SCRIPT, &keys, &args).await {
            Ok(reply) if reply.first().map(String::as_str) == Some("admitted") => {
                Admission::Admitted { fail_open: false }
            }
            Ok(_) => Admission::Denied,
            Err(err) => {
                tracing::warn!(error = %err, provider, model, "rate limiter store unreachable, failing open on RPM");
                Admission::Admitted { fail_open: true }
            }
        }
    }
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
    .duration_since(std::time::UNIX_EPOCH)
    .unwrap_or_default()
    .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_state_store::InMemoryStateStore;

    #[tokio::test]
    async fn admits_up_to_limit_then_denies() {
        let store = InMemoryStateStore::new();
        for _ in 0..3 {
            let admission = RpmLimiter::admit(&store, "openai", "gpt-x", 3).await;
            assert_eq!(admission, Admission::Admitted { fail_open: false });
        }
        let denied = RpmLimiter::admit(&store, "openai", "gpt-x", 3).await;
        assert_eq!(denied, Admission::Denied);
    }

    #[tokio::test]
    async fn distinct_pairs_have_independent_windows() {
        let store = InMemoryStateStore::new();
        assert_eq!(RpmLimiter::admit(&store, "openai", "gpt-x", 1).await, Admission::Admitted { fail_open: false });
        assert_eq!(RpmLimiter::admit(&store, "anthropic", "claude-x", 1).await, Admission::Admitted { fail_open: false });
    }
}
