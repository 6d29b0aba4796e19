//! Logging bootstrap built on `tracing-subscriber`.

use crate::config::Config;

/// Default filter used by [`init`].
pub const DEFAULT_FILTER: &str = "info,wgpu_core=warn,wgpu_hal=warn,naga=warn";

/// Install a global fmt subscriber with the default filter.
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init() {
    init_with_filter(DEFAULT_FILTER);
}

/// Install a global fmt subscriber with a custom `EnvFilter` directive,
/// e.g. `"vesper_render=debug"`.
pub fn init_with_filter(filter: &str) {
    let result = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .try_init();
    if result.is_err() {
        tracing::debug!("global subscriber already installed, ignoring init");
    }
}

/// Install logging (and profiling, if requested) from a [`Config`].
pub fn init_from_config(config: &Config) {
    init_with_filter(&config.log_filter);
    config.profiling.apply();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_does_not_panic() {
        init_with_filter("warn");
        init();
    }
}
