//! tracing subscriber set-up

use crate::config::{LogFormat, LoggingConfig};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::EnvFilter;

fn filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `config.level` when set. Returns `false` if a
/// subscriber was already installed, which is harmless in tests.
pub fn init(config: &LoggingConfig) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter(config))
        .with_writer(std::io::stderr)
        .with_target(false);

    match config.format {
        LogFormat::Compact => builder.compact().try_init().is_ok(),
        LogFormat::Pretty => builder.pretty().try_init().is_ok(),
    }
}

/// Thread-local compact subscriber for events emitted before [`init`] can run,
/// such as while the configuration itself is loading.
///
/// Drop the guard before calling [`init`].
pub fn bootstrap(config: &LoggingConfig) -> DefaultGuard {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter(config))
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_default(subscriber)
}
