//! Logging initialization
//!
//! - Respects the RUST_LOG environment variable
//! - Falls back to the boot config filter, then to "info"
//! - `debug = true` in the boot config turns on this crate's debug output
//!
//! # Usage
//! ```rust,no_run
//! use bootmod::utils::init_logging;
//!
//! init_logging(None); // Uses RUST_LOG or defaults to "info"
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Filter used when the boot config asks for debug output
pub const DEBUG_FILTER: &str = "info,bootmod=debug";

/// Pick the filter: RUST_LOG, then `filter`, then "info"
fn env_filter(filter: Option<&str>) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        return EnvFilter::from_default_env();
    }
    EnvFilter::new(filter.unwrap_or("info"))
}

/// Initialize human-readable logging on stderr
///
/// # Arguments
/// * `filter` - Optional log filter from config (e.g. "debug", "bootmod::module=trace").
///              RUST_LOG takes precedence when set.
pub fn init_logging(filter: Option<&str>) {
    // try_init: a second initialization (tests, embedding) is not an error
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_writer(std::io::stderr)
                .with_ansi(std::env::var("NO_COLOR").is_err()),
        )
        .with(env_filter(filter))
        .try_init();
}

/// Initialize logging with JSON output
///
/// For boots whose console output is captured and parsed.
#[cfg(feature = "json-logging")]
pub fn init_json_logging(filter: Option<&str>) {
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_current_span(true)
                .with_span_list(true),
        )
        .with(env_filter(filter))
        .try_init();
}

/// Initialize logging from the boot config's `[logging]` table
pub fn init_logging_from_config(config: Option<&LoggingConfig>) {
    let filter = config.and_then(|c| {
        if c.debug {
            Some(DEBUG_FILTER)
        } else {
            c.filter.as_deref()
        }
    });

    if config.map(|c| c.json_format).unwrap_or(false) {
        #[cfg(feature = "json-logging")]
        {
            init_json_logging(filter);
        }
        #[cfg(not(feature = "json-logging"))]
        {
            init_logging(filter);
        }
    } else {
        init_logging(filter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_initialization_is_harmless() {
        init_logging(Some("warn"));
        init_logging_from_config(Some(&LoggingConfig {
            debug: true,
            ..Default::default()
        }));
    }
}
