//! Tracing setup.
//!
//! The subscriber is installed before configuration is read, so it starts at
//! `info` and is switched to `logging.level` through a reload handle once the
//! configuration is loaded. `RUST_LOG` wins over both.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

use crate::config::LoggingConfig;

static LOG_RELOAD_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

/// HTTP client internals log every connection at debug; keep them quiet
/// unless asked for explicitly through `RUST_LOG`.
const QUIET_TARGETS: &[&str] = &["hyper=warn", "hyper_util=warn", "reqwest=warn", "h2=warn"];

pub fn init_tracing() {
    let (reload_layer, handle) = reload::Layer::new(initial_filter("info"));
    let _ = LOG_RELOAD_HANDLE.set(handle);

    let _ = tracing_subscriber::registry()
        .with(reload_layer)
        .with(fmt::layer().with_target(true))
        .try_init();
}

/// Switches the running subscriber to the configured level.
pub fn apply_logging_level(logging: &LoggingConfig) {
    if std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    let Some(handle) = LOG_RELOAD_HANDLE.get() else {
        return;
    };
    match handle.modify(|filter| *filter = level_filter(&logging.level)) {
        Ok(()) => tracing::debug!(level = %logging.level, "Log level applied"),
        Err(e) => tracing::warn!(error = %e, "Failed to apply log level"),
    }
}

fn initial_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| level_filter(level))
}

/// Builds a filter for `level` with noisy dependencies capped at `warn`.
fn level_filter(level: &str) -> EnvFilter {
    let level = level.to_ascii_lowercase();
    if level == "off" {
        return EnvFilter::new("off");
    }
    let directives = std::iter::once(level.as_str())
        .chain(QUIET_TARGETS.iter().copied())
        .collect::<Vec<_>>()
        .join(",");
    EnvFilter::new(directives)
}
