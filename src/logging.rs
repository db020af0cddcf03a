//! Tracing setup for the redub binary and tests.
//!
//! Events go to stderr so the run report on stdout stays machine-parseable.
//! `RUST_LOG` controls the filter (default `redub=info`); setting
//! `RUST_LOG_FORMAT=json` switches to line-delimited JSON for log shippers.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "redub=info";

/// Install the global subscriber. Idempotent: repeat calls lose the race on
/// the global default and are ignored.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let wants_json = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    if wants_json {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}
