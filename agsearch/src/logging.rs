//! Optional tracing setup for embedders that have no subscriber of their own.
use tracing_subscriber::EnvFilter;

/// Environment variable consulted before the configured level
pub const LOG_ENV: &str = "AGSEARCH_LOG";

/// Installs a global fmt subscriber.
///
/// `AGSEARCH_LOG` wins when set, otherwise `level` (usually
/// [`EngineConfig::log_level`](crate::EngineConfig::log_level)) applies to
/// this crate only. Returns `false` if a subscriber was already installed,
/// which is not an error.
pub fn init_logging(level: &str) -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(format!("agsearch={}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .try_init()
        .is_ok()
}
