pub mod config;
pub mod models;
pub mod pipeline;

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, PipelineSettings};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise the configured log level applies to
/// this crate. Safe to call more than once: later calls are no-ops.
pub fn init_tracing(settings: &PipelineSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.default_log_filter()));

    let result = match settings.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .try_init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
    };

    if result.is_ok() {
        tracing::info!(
            version = config::APP_VERSION,
            format = ?settings.log_format,
            "{} starting",
            config::APP_NAME
        );
    }
}
