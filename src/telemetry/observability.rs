//! Structured logging setup.
//!
//! Plain text by default, JSON lines when requested. `RUST_LOG` overrides
//! the configured level.

use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Registry,
};

/// Tracing configuration options.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Emit JSON lines instead of text
    pub json: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Install the global subscriber.
///
/// Does nothing if a subscriber is already installed, so tests and
/// embedding applications may call it freely.
pub fn init_tracing(config: &TracingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let installed = if config.json {
        let json_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true);

        Registry::default()
            .with(env_filter)
            .with(json_layer)
            .try_init()
    } else {
        let fmt_layer = fmt::layer()
            .with_target(true)
            .with_thread_names(true);

        Registry::default()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
    };

    if installed.is_ok() {
        tracing::debug!(level = %config.level, json = config.json, "Tracing initialized");
    }
}

/// Span constructors shared by the scan components.
pub mod spans {
    use tracing::{info_span, Span};

    /// Span covering one scan pass.
    #[must_use]
    pub fn pass_span(pass_id: &str) -> Span {
        info_span!("scan_pass", pass_id = %pass_id)
    }

    /// Span covering one directory walk.
    #[must_use]
    pub fn walk_span(walker: &str, root: &str) -> Span {
        info_span!("walk", walker = %walker, root = %root)
    }
}
