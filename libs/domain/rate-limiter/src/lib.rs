// [libs/domain/rate-limiter/src/lib.rs]
//! Per (provider, model) admission control: a sliding-window
//! RPM limiter and a two-window weighted TPM limiter, both implemented as
//! fixed `eval` scripts against [`gateway_state_store::StateStore`] so
//! ordering lives entirely in the store — this crate never holds a lock.
//!
//! Both limiters fail open when the store is unreachable: the upstream
//! provider's own limits are the backstop, a deliberate
//! availability choice rather than an oversight.

mod rpm;
mod tpm;

pub use rpm::{rpm_key, RpmLimiter};
pub use tpm::{tpm_keys, TpmLimiter};

use gateway_state_store::StateStore;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
pub struct ModelLimits {
    pub rpm: u32,
    pub tpm: u64,
}

/// Outcome of an admission check. `Admitted { fail_open: true }` means the
/// store was unreachable and the call was let through rather than blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted { fail_open: bool },
    Denied,
}

impl Admission {
    pub fn is_admitted(self) -> bool {
        matches!(self, Admission::Admitted {.. })
    }
}

/// Facade combining the RPM and TPM limiters for a (provider, model) pair.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn StateStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Admits a request consuming `tokens` projected usage, checking RPM
    /// then TPM. Either denial short-circuits the other check — there is
    /// no point reserving a TPM slot for a request that can't run anyway.
    pub async fn admit(&self, provider: &str, model: &str, limits: ModelLimits, tokens: u64) -> Admission {
        let rpm = RpmLimiter::admit(self.store.as_ref(), provider, model, limits.rpm).await;
        if !rpm.is_admitted() {
            return rpm;
        }
        TpmLimiter::admit(self.store.as_ref(), provider, model, limits.tpm, tokens).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_state_store::InMemoryStateStore;

    #[tokio::test]
    async fn admits_within_both_limits_and_denies_over_rpm() {
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
        let limiter = RateLimiter::new(store);
        let limits = ModelLimits { rpm: 1, tpm: 1_000 };

        let first = limiter.admit("openai", "gpt-x", limits, 10).await;
        assert_eq!(first, Admission::Admitted { fail_open: false });

        let second = limiter.admit("openai", "gpt-x", limits, 10).await;
        assert_eq!(second, Admission::Denied);
    }
}
