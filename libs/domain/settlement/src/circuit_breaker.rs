// [libs/domain/settlement/src/circuit_breaker.rs]
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: State,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// Three-state circuit breaker gating calls to the facilitator path.
/// Trips to `Open` on `failure_threshold` consecutive failures; the
/// consecutive-vs-windowed open question is resolved here in favor of
/// consecutive failures, since it requires no extra bookkeeping and
/// degrades predictably under bursty transient errors. Recorded in
/// DESIGN.md.
pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    failure_threshold: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self { inner: Mutex::new(Inner { state: State::Closed, consecutive_failures: 0, opened_at: None }), failure_threshold, cooldown }
    }

    /// Whether a call through the gated path should be attempted right
    /// now. `Open` within the cooldown window refuses; past the cooldown
    /// it transitions to `HalfOpen` and allows exactly the probing call.
    pub async fn allow_call(&self) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.state {
            State::Closed | State::HalfOpen => true,
            State::Open => {
                if inner.opened_at.is_some_and(|t| t.elapsed() >= self.cooldown) {
                    inner.state = State::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub async fn on_success(&self) {
        let mut inner = self.inner.lock().await;
        inner.state = State::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
    }

    pub async fn on_failure(&self) {
        let mut inner = self.inner.lock().await;
        inner.consecutive_failures += 1;
        if inner.consecutive_failures >= self.failure_threshold {
            inner.state = State::Open;
            inner.opened_at = Some(Instant::now());
        }
    }

    pub async fn state(&self) -> State {
        self.inner.lock().await.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_after_consecutive_failures_then_recovers_after_cooldown() {
        let breaker = CircuitBreaker::new(3, Duration::from_millis(20));
        for _ in 0..3 {
            breaker.on_failure().await;
        }
        assert_eq!(breaker.state().await, State::Open);
        assert!(!breaker.allow_call().await);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(breaker.allow_call().await);
        assert_eq!(breaker.state().await, State::HalfOpen);

        breaker.on_success().await;
        assert_eq!(breaker.state().await, State::Closed);
    }

    #[tokio::test]
    async fn a_success_resets_the_consecutive_counter() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));
        breaker.on_failure().await;
        breaker.on_failure().await;
        breaker.on_success().await;
        breaker.on_failure().await;
        breaker.on_failure().await;
        assert_eq!(breaker.state().await, State::Closed);
    }
}
