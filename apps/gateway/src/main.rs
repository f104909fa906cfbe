// [apps/gateway/src/main.rs]
use gateway_app::{background, routes, AppState};
use gateway_config::{ConfigParser, GatewayConfig};
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    gateway_telemetry::init_tracing("gateway");

    let config = GatewayConfig::parse();
    let state = AppState::build(&config).await.map_err(|e| anyhow::anyhow!("failed to initialize substrate: {e}"))?;

    background::spawn_dlq_replay_loop(state.clone(), Duration::from_secs(10));
    background::spawn_archival_sync_loop(state.clone(), Duration::from_secs(config.archival.sync_interval_seconds));

    let router = routes::build_router(state.clone());
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(port = config.port, "gateway listening");

    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal(state)).await?;
    Ok(())
}

async fn shutdown_signal(state: AppState) {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received, draining wal");
    if let Err(err) = state.wal.shutdown(Duration::from_secs(5)).await {
        tracing::error!(error = %err, "wal shutdown did not complete cleanly");
    }
}
