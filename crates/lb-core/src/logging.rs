//! Logging setup
//!
//! `RUST_LOG` takes precedence over the configured level.

use crate::config::DebugConfig;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// Returns `false` if a subscriber was already installed, which is not an
/// error: tests and embedding hosts may have set one up first.
pub fn init(config: &DebugConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_filter()));

    if config.log_to_file {
        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.log_path)
        {
            Ok(file) => {
                return tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .try_init()
                    .is_ok();
            }
            Err(e) => {
                eprintln!(
                    "failed to open log file {}: {}, logging to stderr",
                    config.log_path.display(),
                    e
                );
            }
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}

/// Subscriber for tests; output is captured by the test harness
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
