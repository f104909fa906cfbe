// [libs/domain/rate-limiter/src/tpm.rs]
use crate::Admission;
use chrono::Utc;
use gateway_state_store::{StateStore, TPM_ADMIT_SCRIPT};

/// Current-minute hash TTL: outlives one full cycle as "previous" before
/// a stale bucket would otherwise linger.
const CURRENT_HASH_TTL_SECONDS: u64 = 120;

pub fn tpm_keys(provider: &str, model: &str) -> (String, String) {
    let now = Utc::now();
    let current_minute = now.timestamp() / 60;
    let previous_minute = current_minute - 1;
    (
        format!("rate:{provider}:{model}:tpm:{current_minute}"),
        format!("rate:{provider}:{model}:tpm:{previous_minute}"),
    )
}

/// Two-window weighted TPM admission control: a request's
/// effective usage blends the previous minute's total, weighted down by
/// how far into the current minute we are, with the current minute's
/// running total.
pub struct TpmLimiter;

impl TpmLimiter {
    pub async fn admit(store: &dyn StateStore, provider: &str, model: &str, limit: u64, tokens: u64) -> Admission {
        let (current_key, previous_key) = tpm_keys(provider, model);
        let elapsed = elapsed_fraction_of_current_minute();
        let second_bucket = Utc::now().timestamp().to_string();
        let keys = vec![current_key, previous_key];
        let args = vec![tokens.to_string(), elapsed.to_string(), limit.to_string(), second_bucket, CURRENT_HASH_TTL_SECONDS.to_string()];

        match store.eval(TPM_ADMIT_SCRIPT, &keys, &args).await {
            Ok(reply) if reply.first().map(String::as_str) == Some("admitted") => {
                Admission::Admitted { fail_open: false }
            }
            Ok(_) => Admission::Denied,
            Err(err) => {
                tracing::warn!(error = %err, provider, model, "rate limiter store unreachable, failing open on TPM");
                Admission::Admitted { fail_open: true }
            }
        }
    }
}

fn elapsed_fraction_of_current_minute() -> f64 {
    let now = Utc::now();
    (now.timestamp() % 60) as f64 / 60.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_state_store::InMemoryStateStore;

    #[tokio::test]
    async fn admits_within_limit_and_denies_over() {
        let store = InMemoryStateStore::new();
        let admitted = TpmLimiter::admit(&store, "openai", "gpt-x", 100, 40).await;
        assert_eq!(admitted, Admission::Admitted { fail_open: false });
        let admitted2 = TpmLimiter::admit(&store, "openai", "gpt-x", 100, 40).await;
        assert_eq!(admitted2, Admission::Admitted { fail_open: false });
        let denied = TpmLimiter::admit(&store, "openai", "gpt-x", 100, 40).await;
        assert_eq!(denied, Admission::Denied);
    }
}
