//! Logging initialization.
//!
//! Uses the `tracing` ecosystem with either human-readable or JSON output.
//! Logs go to stderr so CLI output on stdout stays machine-readable.

use crate::config::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the global subscriber. `RUST_LOG` overrides the level.
pub fn init(verbose: bool, json_format: bool) {
    init_with_level(if verbose { "debug" } else { "info" }, json_format);
}

/// Initialize from the `[logging]` section, with CLI flags taking precedence.
pub fn init_from_config(config: &Config, verbose_override: bool, json_logs_override: bool) {
    let json_format = json_logs_override || config.logging.format == "json";
    init_with_level(default_directive(config, verbose_override), json_format);
}

/// Filter used when `RUST_LOG` is unset. `--verbose` raises anything below debug.
fn default_directive(config: &Config, verbose: bool) -> &str {
    let level = config.logging.level.trim();
    if verbose && !matches!(level, "debug" | "trace") {
        "debug"
    } else if level.is_empty() {
        "info"
    } else {
        level
    }
}

fn init_with_level(default_level: &str, json_format: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
