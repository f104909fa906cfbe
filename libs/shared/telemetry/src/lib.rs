// [libs/shared/telemetry/src/lib.rs]
//! Tracing initialization shared by every binary in the workspace.
//!
//! Development builds get compact, colorized output; release builds emit
//! flattened JSON lines suitable for log aggregation. A panic hook logs
//! the panic location through `tracing` before the default hook runs, so
//! a panic in a spawned task still leaves a trace event behind.

use std::panic;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global `tracing` subscriber for `service_name`.
///
/// Panics if a global subscriber has already been installed — callers
/// should invoke this exactly once, from `main`.
pub fn init_tracing(service_name: &str) {
    let default_level = if cfg!(debug_assertions) { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!("{service_name}={default_level},tower_http=warn,hyper=warn").into()
    });

    if cfg!(debug_assertions) {
        tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_target(false))
        .init();
    } else {
        tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();
    }

    install_panic_hook(service_name);
}

fn install_panic_hook(service_name: &str) {
    let service_name = service_name.to_string();
    panic::set_hook(Box::new(move |info| {
                let location = info
                .location()
                .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
                .unwrap_or_else(|| "<unknown>".to_string());
                let payload = info
                .payload()
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| info.payload().downcast_ref::<String>().map(String::as_str))
                .unwrap_or("<non-string panic payload>");
                tracing::error!(
                    target: "panic",
                    service = %service_name,
                    location = %location,
                    "thread panicked: {payload}"
                );
    }));
}
