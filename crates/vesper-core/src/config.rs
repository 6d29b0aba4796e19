/// Process-wide configuration for Vesper applications.
#[derive(Debug, Clone)]
pub struct Config {
    /// `EnvFilter` directive handed to the subscriber.
    pub log_filter: String,
    pub profiling: ProfilingMode,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_filter: crate::logging::DEFAULT_FILTER.to_string(),
            profiling: ProfilingMode::Off,
        }
    }
}

impl Config {
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    pub fn with_profiling(mut self, mode: ProfilingMode) -> Self {
        self.profiling = mode;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfilingMode {
    /// Profiling scopes are compiled in but disabled
    Off,
    /// Scopes are recorded in-process only
    On,
    /// Scopes are recorded and served to `puffin_viewer` over HTTP
    WithWebserver,
}

impl ProfilingMode {
    pub(crate) fn apply(self) {
        match self {
            ProfilingMode::Off => puffin::set_scopes_on(false),
            ProfilingMode::On => puffin::set_scopes_on(true),
            ProfilingMode::WithWebserver => {
                crate::profiling::init_profiling(crate::profiling::ProfilingBackend::PuffinHttp)
            }
        }
    }
}
