// [libs/shared/telemetry-init/src/lib.rs]
/*!
 * Tracing bootstrap shared by every binary in the workspace: structured
 * logging, environment-driven filtering, and a panic hook that routes
 * thread panics through `tracing` instead of losing them to stderr.
 */

use std::panic;
use tracing::{error, info, instrument};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the global subscriber for `service_name`.
///
/// Honors `RUST_LOG` when set; otherwise defaults to `info` for the
/// calling service and quiets known-noisy dependencies. Emits JSON in
/// release builds, compact human-readable output in debug builds.
///
/// # Panics
/// Panics if a global subscriber has already been installed.
#[instrument(skip_all)]
pub fn init_tracing(service_name: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "{service_name}={level},tower_http=info,hyper=info,libsql=info",
            level = if cfg!(debug_assertions) { "debug" } else { "info" }
        )
        .into()
    });

    if cfg!(debug_assertions) {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().flatten_event(true))
            .init();
    }

    install_panic_hook(service_name);
    info!(service = service_name, "tracing initialized");
}

fn install_panic_hook(service_name: &str) {
    let service_name = service_name.to_string();
    panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());
        let message = panic_info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| panic_info.payload().downcast_ref::<String>().map(String::as_str))
            .unwrap_or("<non-string panic payload>");

        error!(target: "panic", service = %service_name, location = %location, "{message}");
    }));
}
