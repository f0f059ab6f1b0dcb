//! Logging setup
//!
//! Dropped geometry and registry changes log at debug level, broken group
//! references at warn. `RUST_LOG` overrides the default filter.

pub use log::{debug, info, warn, error, trace};

/// Filter used when `RUST_LOG` is unset
const DEFAULT_FILTER: &str = "info";

/// Initialize logging for the process
pub fn init() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(DEFAULT_FILTER))
        .init();
}

/// Initialize logging for tests; repeated calls are ignored
pub fn init_for_tests() {
    let _ = env_logger::builder().is_test(true).try_init();
}
