// [apps/gateway/src/routes.rs]
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
    .route("/healthz", get(healthz))
    .route("/readyz", get(readyz))
    .route("/admin/kill-switch", post(toggle_kill_switch))
    .layer(TraceLayer::new_for_http())
    .layer(cors)
    .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[derive(Serialize)]
struct WalStatusBody {
    seq: u64,
    segment_count: usize,
    pressure: bool,
}

#[derive(Serialize)]
struct LedgerStatusBody {
    active_tenants: usize,
}

#[derive(Serialize)]
struct DlqStatusBody {
    depth: Option<usize>,
    oldest_age_seconds: Option<u64>,
    poison_depth: Option<usize>,
}

#[derive(Serialize)]
struct ReadinessBody {
    wal: WalStatusBody,
    ledger: LedgerStatusBody,
    dlq: DlqStatusBody,
    archival_configured: bool,
    kill_switch_engaged: bool,
}

/// Reports WAL status (seq, segment count, pressure flag), ledger
/// tenant activity, and DLQ depth/oldest age — mirroring the readiness
/// surface's stated shape. Health paths never fail the
/// request on a component being unreachable; a component that can't
/// answer just reports `null` for the fields it couldn't fill in.
async fn readyz(State(state): State<AppState>) -> Json<ReadinessBody> {
    let wal_status = state.wal.get_status();
    let active_tenants = state.ledger.get_tenant_ids().map(|ids| ids.len()).unwrap_or(0);
    let dlq_health = gateway_dlq::health(state.dlq.as_ref()).await;

    Json(ReadinessBody {
            wal: WalStatusBody { seq: wal_status.seq, segment_count: wal_status.segment_count, pressure: wal_status.pressure },
            ledger: LedgerStatusBody { active_tenants },
            dlq: DlqStatusBody {
                depth: dlq_health.depth,
                oldest_age_seconds: dlq_health.oldest_age.as_ref().map(Duration::as_secs),
                poison_depth: dlq_health.poison_depth,
            },
            archival_configured: state.archival.is_some(),
            kill_switch_engaged: state.kill_switch_engaged(),
    })
}

#[derive(serde::Deserialize)]
struct KillSwitchRequest {
    engaged: bool,
}

/// Flips the kill switch that halts outbound provider calls. This
/// process only owns the flag; enforcing it is the responsibility of
/// whatever dispatches to a provider above this substrate.
async fn toggle_kill_switch(State(state): State<AppState>, Json(req): Json<KillSwitchRequest>) -> StatusCode {
    state.set_kill_switch(req.engaged);
    tracing::warn!(engaged = req.engaged, "kill switch toggled");
    StatusCode::OK
}
