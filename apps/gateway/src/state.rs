// [apps/gateway/src/state.rs]
use chrono::Utc;
use gateway_budget::BudgetCommitter;
use gateway_config::GatewayConfig;
use gateway_credit_ledger::{CreditLedger, CreditLedgerSettings, ExchangeRateTable};
use gateway_dlq::{DlqBackend, InMemoryDlqBackend};
use gateway_error::GatewayError;
use gateway_idempotency::IdempotencyCache;
use gateway_ledger::{Ledger, LedgerSettings};
use gateway_rate_limiter::RateLimiter;
use gateway_state_store::{InMemoryStateStore, RedisStateStore, StateStore};
use gateway_wal::{Wal, WalSettings};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Every substrate component a single gateway process owns, assembled
/// once at startup and shared (via `Arc`, cloned per request) with the
/// route handlers. Components that need a concrete provider, facilitator,
/// or RPC adapter — `gateway-x402`, `gateway-settlement`,
/// `gateway-ensemble`, `gateway-sandbox` — are not constructed here: this
/// binary wires only what is fully self-contained, and leaves the
/// provider-specific crates to whatever deployment supplies those
/// adapters.
#[derive(Clone)]
pub struct AppState {
    pub wal: Arc<Wal>,
    pub ledger: Arc<Ledger>,
    pub store: Arc<dyn StateStore>,
    pub rate_limiter: RateLimiter,
    pub idempotency: IdempotencyCache,
    pub budget: Arc<BudgetCommitter>,
    pub credit_ledger: Arc<CreditLedger>,
    pub dlq: Arc<dyn DlqBackend>,
    pub archival: Option<Arc<gateway_archival::ArchivalSync>>,
    pub git_mirror: Option<Arc<gateway_archival::GitMirror>>,
    /// Halts outbound provider calls when flipped. Read by whatever
    /// client code sits above this substrate before it dispatches to a
    /// provider; this crate only owns the flag and exposes it on the
    /// readiness surface.
    pub kill_switch: Arc<AtomicBool>,
}

impl AppState {
    pub async fn build(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let wal = Arc::new(
            Wal::initialize(WalSettings {
                    base_dir: config.wal.base_dir.clone().into(),
                    max_segment_size: config.wal.max_segment_size,
                    shutdown_drain_timeout: Duration::from_millis(config.wal.shutdown_drain_timeout_ms),
                    pressure_low_bytes: config.wal.pressure_low_bytes,
                    pressure_high_bytes: config.wal.pressure_high_bytes,
            })
            .await?,
        );

        let ledger = Arc::new(Ledger::new(LedgerSettings {
                base_dir: config.ledger.base_dir.clone().into(),
                fsync: config.ledger.fsync,
                rotation_age_days: config.ledger.rotation_age_days as i64,
                retention_days: config.ledger.retention_days as i64,
        }));

        let store: Arc<dyn StateStore> = match RedisStateStore::connect(&config.state_store_url).await {
            Ok(redis) => Arc::new(redis),
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    url = %config.state_store_url,
                    "redis state store unreachable at startup; falling back to the in-memory store for this process"
                );
                Arc::new(InMemoryStateStore::new())
            }
        };

        let rate_limiter = RateLimiter::new(store.clone());
        let idempotency = IdempotencyCache::new(store.clone());
        let budget = Arc::new(BudgetCommitter::new((*ledger).clone(), store.clone()));

        let credit_ledger = Arc::new(CreditLedger::new(CreditLedgerSettings {
                reservation_ttl: chrono::Duration::minutes(15),
                // Placeholder 1:1 rate until a real pricing feed is wired in;
                // every reservation still freezes whatever rate is live at
                // the time it was made.
                rate: ExchangeRateTable::new(1, Utc::now()),
        }));

        let dlq: Arc<dyn DlqBackend> = Arc::new(InMemoryDlqBackend::new());

        let archival = config.archival.object_store_url.clone().map(|url| {
            let object_store: Arc<dyn gateway_archival::ObjectStore> = Arc::new(gateway_archival::HttpObjectStore::new(url));
            Arc::new(gateway_archival::ArchivalSync::new(object_store))
        });

        let git_mirror = config
        .archival
        .git_mirror_url
        .clone()
        .map(|url| Arc::new(gateway_archival::GitMirror::new(url, config.archival.git_mirror_branch.clone())));

        Ok(Self {
                wal,
                ledger,
                store,
                rate_limiter,
                idempotency,
                budget,
                credit_ledger,
                dlq,
                archival,
                git_mirror,
                kill_switch: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn kill_switch_engaged(&self) -> bool {
        self.kill_switch.load(Ordering::SeqCst)
    }

    pub fn set_kill_switch(&self, engaged: bool) {
        self.kill_switch.store(engaged, Ordering::SeqCst);
    }
}
