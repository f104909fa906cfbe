// [libs/shared/gateway-config/src/lib.rs]
//! Typed configuration, one nested struct per component. Each field is
//! sourced from an environment variable of the same name (upper-cased)
//! via `clap`'s `env` attribute; `apps/gateway` parses this once at
//! startup and hands each component its own sub-config. No component
//! reads the environment directly.

use clap::{Args, Parser};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Parser)]
#[command(name = "gateway", about = "Multi-tenant inference gateway substrate")]
pub struct GatewayConfig {
    #[command(flatten)]
    pub wal: WalConfig,

    #[command(flatten)]
    pub ledger: LedgerConfig,

    #[command(flatten)]
    pub rate_limiter: RateLimiterConfig,

    #[command(flatten)]
    pub x402: X402Config,

    #[command(flatten)]
    pub ensemble: EnsembleConfig,

    #[command(flatten)]
    pub sandbox: SandboxConfig,

    #[command(flatten)]
    pub dlq: DlqConfig,

    #[command(flatten)]
    pub archival: ArchivalConfig,

    /// redis:// URL backing the StateStore.
    #[arg(long, env = "STATE_STORE_URL", default_value = "redis://127.0.0.1:6379")]
    pub state_store_url: String,

    /// TCP port the health/CLI surface listens on.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,
}

#[derive(Debug, Clone, Args, Serialize, Deserialize)]
pub struct WalConfig {
    /// Active segment rotates once it exceeds this many bytes.
    #[arg(long, env = "WAL_MAX_SEGMENT_SIZE", default_value_t = 64 * 1024 * 1024)]
    pub max_segment_size: u64,

    /// Deadline for draining the write queue on shutdown.
    #[arg(long, env = "WAL_SHUTDOWN_DRAIN_TIMEOUT_MS", default_value_t = 5_000)]
    pub shutdown_drain_timeout_ms: u64,

    /// Below this many free bytes, appends fail fast with `disk_pressure`.
    #[arg(long, env = "WAL_PRESSURE_LOW_BYTES", default_value_t = 256 * 1024 * 1024)]
    pub pressure_low_bytes: u64,

    /// Appends resume once free bytes exceed this (hysteresis).
    #[arg(long, env = "WAL_PRESSURE_HIGH_BYTES", default_value_t = 512 * 1024 * 1024)]
    pub pressure_high_bytes: u64,

    /// Directory the WAL segments and checkpoint live in.
    #[arg(long, env = "WAL_DIR", default_value = "./data/wal")]
    pub base_dir: String,
}

#[derive(Debug, Clone, Args, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[arg(long, env = "LEDGER_BASE_DIR", default_value = "./data/ledger")]
    pub base_dir: String,

    /// Whether every append calls `fdatasync`. On by default in production.
    #[arg(long, env = "LEDGER_FSYNC", default_value_t = true)]
    pub fsync: bool,

    #[arg(long, env = "LEDGER_ROTATION_AGE_DAYS", default_value_t = 1)]
    pub rotation_age_days: u32,

    #[arg(long, env = "LEDGER_RETENTION_DAYS", default_value_t = 90)]
    pub retention_days: u32,

    #[arg(long, env = "LEDGER_MAX_ENTRY_BYTES", default_value_t = 4096)]
    pub max_entry_bytes: usize,
}

#[derive(Debug, Clone, Args, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    /// Default RPM applied to a (provider, model) pair with no bespoke entry.
    #[arg(long, env = "RATE_LIMITER_DEFAULT_RPM", default_value_t = 600)]
    pub default_rpm: u32,

    /// Default TPM applied to a (provider, model) pair with no bespoke entry.
    #[arg(long, env = "RATE_LIMITER_DEFAULT_TPM", default_value_t = 1_000_000)]
    pub default_tpm: u64,
}

#[derive(Debug, Clone, Args, Serialize, Deserialize)]
pub struct X402Config {
    #[arg(long, env = "X402_MIN_CONFIRMATIONS", default_value_t = 10)]
    pub min_confirmations: u64,

    #[arg(long, env = "X402_CHALLENGE_SECRET")]
    pub challenge_secret: Option<String>,

    #[arg(long, env = "X402_CHALLENGE_SECRET_PREVIOUS")]
    pub challenge_secret_previous: Option<String>,

    #[arg(long, env = "X402_TOKEN_ADDRESS")]
    pub token_address: Option<String>,

    #[arg(long, env = "X402_TREASURY_ADDRESS")]
    pub treasury_address: Option<String>,

    #[arg(long, env = "X402_QUOTE_TTL_SECONDS", default_value_t = 300)]
    pub quote_ttl_seconds: u64,
}

#[derive(Debug, Clone, Args, Serialize, Deserialize)]
pub struct EnsembleConfig {
    #[arg(long, env = "ENSEMBLE_TIMEOUT_MS", default_value_t = 30_000)]
    pub timeout_ms: u64,

    #[arg(long, env = "ENSEMBLE_BUDGET_PER_MODEL_MICRO", default_value_t = 1_000_000)]
    pub budget_per_model_micro: u64,

    #[arg(long, env = "ENSEMBLE_BUDGET_TOTAL_MICRO", default_value_t = 5_000_000)]
    pub budget_total_micro: u64,
}

#[derive(Debug, Clone, Args, Serialize, Deserialize)]
pub struct SandboxConfig {
    #[arg(long, env = "SANDBOX_ALLOW_BASH", default_value_t = false)]
    pub allow_bash: bool,

    #[arg(long, env = "SANDBOX_JAIL_ROOT", default_value = "./data/sandbox")]
    pub jail_root: String,

    #[arg(long, env = "SANDBOX_EXEC_TIMEOUT_MS", default_value_t = 5_000)]
    pub exec_timeout_ms: u64,

    #[arg(long, env = "SANDBOX_MAX_OUTPUT_BYTES", default_value_t = 1024 * 1024)]
    pub max_output_bytes: usize,
}

#[derive(Debug, Clone, Args, Serialize, Deserialize)]
pub struct DlqConfig {
    #[arg(long, env = "DLQ_MAX_ATTEMPTS", default_value_t = 8)]
    pub max_attempts: u32,

    #[arg(long, env = "DLQ_BASE_BACKOFF_MS", default_value_t = 5_000)]
    pub base_backoff_ms: u64,

    #[arg(long, env = "DLQ_MAX_BACKOFF_MS", default_value_t = 900_000)]
    pub max_backoff_ms: u64,

    #[arg(long, env = "DLQ_LEASE_MS", default_value_t = 30_000)]
    pub lease_ms: u64,
}

#[derive(Debug, Clone, Args, Serialize, Deserialize)]
pub struct ArchivalConfig {
    /// Base URL of the object store the archival worker ships segments
    /// and checkpoints to. Left unset, the worker stays idle rather than
    /// failing startup — archival is an off-node backstop, not a
    /// dependency the gateway needs to serve requests.
    #[arg(long, env = "ARCHIVAL_OBJECT_STORE_URL")]
    pub object_store_url: Option<String>,

    #[arg(long, env = "ARCHIVAL_SYNC_INTERVAL_SECONDS", default_value_t = 300)]
    pub sync_interval_seconds: u64,

    /// Remote URL of the optional secondary git mirror. Left unset, only
    /// the object store target is synced.
    #[arg(long, env = "ARCHIVAL_GIT_MIRROR_URL")]
    pub git_mirror_url: Option<String>,

    #[arg(long, env = "ARCHIVAL_GIT_MIRROR_BRANCH", default_value = "archive")]
    pub git_mirror_branch: String,
}

// re-exported so `apps/gateway` can call `GatewayConfig::parse()` without
// a direct `clap` dependency of its own.
pub use clap::Parser as ConfigParser;
