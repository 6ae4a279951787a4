//! Log output of the simulation binary.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

use crate::config::LogConfig;

/// Installs the global subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Records emitted
/// through the `log` macros are forwarded to the subscriber.
pub fn init(config: &LogConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.module_path);

    if config.time {
        builder.finish().try_init()
    } else {
        builder.without_time().finish().try_init()
    }
}
