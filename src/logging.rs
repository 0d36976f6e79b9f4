//! Structured logging setup
//!
//! Provides JSON-formatted and human-readable logging on stderr. `RUST_LOG`
//! takes precedence over the built-in filter.

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter applied when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "parley=info,tower_http=info";

/// Filter applied with `--verbose` when `RUST_LOG` is unset
pub const VERBOSE_FILTER: &str = "parley=debug,tower_http=debug";

/// Pick the fallback filter directive
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        VERBOSE_FILTER
    } else {
        DEFAULT_FILTER
    }
}

/// Initialize the global tracing subscriber
///
/// # Arguments
///
/// * `verbose` - Use the debug-level fallback filter
/// * `json` - Emit one JSON object per event
///
/// # Examples
///
/// ```no_run
/// use parley::logging::init_logging;
///
/// init_logging(false, true).unwrap();
/// tracing::info!("ready");
/// ```
pub fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(verbose)))?;

    let registry = tracing_subscriber::registry().with(env_filter);

    if json {
        let layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(std::io::stderr);
        registry.with(layer).try_init()?;
    } else {
        let layer = fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_writer(std::io::stderr);
        registry.with(layer).try_init()?;
    }

    Ok(())
}
