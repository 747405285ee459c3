use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

/// Logging configuration for the sidecar process.
///
/// **Fields**
/// - `default_filter`: filter directives used when `RUST_LOG` is unset,
///   e.g. `"info"` or `"file_log_publisher=debug"`.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` prints
///   events to the console.
/// - `ansi`: colored output for the console layer.
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub default_filter: String,
    pub enable_stdout: bool,
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_filter: "info".to_string(),
            enable_stdout: true,
            ansi: true,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("global subscriber already set: {0}")]
    AlreadySet(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Build the filter from `RUST_LOG`, falling back to `default_filter`.
pub fn build_filter(default_filter: &str) -> Result<EnvFilter, InitError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new(default_filter)?),
    }
}

/// Install the global `tracing` subscriber.
///
/// **Effects**
///
/// Sets a [`Registry`] with an [`EnvFilter`] and, when `enable_stdout` is
/// set, a `fmt` layer as the process-wide default. Fails if a global
/// subscriber is already installed.
pub fn init_logging(config: LoggingConfig) -> Result<(), InitError> {
    let filter = build_filter(&config.default_filter)?;

    // The two subscriber shapes have different types, so each branch sets
    // its own.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer().with_ansi(config.ansi);
        let subscriber = Registry::default().with(filter).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(filter);
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(())
}
