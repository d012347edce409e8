//! ==============================================================================
//! logging.rs - tracing subscriber setup
//! ==============================================================================
//!
//! RUST_LOG wins when set; otherwise the level from station.toml applies.
//!
//! ==============================================================================

use tracing_subscriber::EnvFilter;

pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // a second init (tests) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
