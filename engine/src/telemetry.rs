//! Telemetry
//!
//! Installs the `tracing-subscriber` used by hosts of the engine. Batch-level
//! events log at `info`, per-request events at `debug`, and per-request
//! failures that come back as error markers at `warn`.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::CoreConfig;

/// Filter directive for `log_level`, applied to the engine crate and everything else
fn default_directive(log_level: &str) -> String {
    format!("{},redline_engine={}", log_level, log_level)
}

/// Resolve the active filter: `RUST_LOG` wins over `log_level`
fn build_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(log_level)))
}

/// Install the global subscriber at `log_level`
///
/// Debug builds print pretty terminal output; release builds emit JSON lines
/// with the current span. A second call is a no-op.
pub fn init_telemetry_with_level(log_level: &str) {
    let env_filter = build_filter(log_level);

    #[cfg(debug_assertions)]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty().with_target(false))
            .try_init()
            .ok();
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_current_span(true))
            .try_init()
            .ok();
    }
}

/// Install the global subscriber at the configured level
pub fn init_telemetry_from_config(core: &CoreConfig) {
    init_telemetry_with_level(&core.log_level);
}

/// Install the global subscriber at `info`
pub fn init_telemetry() {
    init_telemetry_with_level("info");
}
