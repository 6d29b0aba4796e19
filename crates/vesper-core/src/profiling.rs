//! Profiling utilities based on the `puffin` crate.

pub use puffin::{GlobalProfiler, profile_function, profile_scope};

/// Profiling backend options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfilingBackend {
    /// Send profiling data to puffin_viewer via HTTP.
    PuffinHttp,
}

#[cfg(feature = "profiling")]
static PROFILING_SERVER: std::sync::OnceLock<puffin_http::Server> = std::sync::OnceLock::new();

/// Enable puffin scopes and start the requested backend.
///
/// # Example
/// ```no_run
/// use vesper_core::profiling::{init_profiling, ProfilingBackend};
///
/// init_profiling(ProfilingBackend::PuffinHttp);
/// ```
pub fn init_profiling(backend: ProfilingBackend) {
    puffin::set_scopes_on(true);
    match backend {
        #[cfg(feature = "profiling")]
        ProfilingBackend::PuffinHttp => {
            if PROFILING_SERVER.get().is_some() {
                return;
            }
            match puffin_http::Server::new("0.0.0.0:8585") {
                Ok(server) => {
                    tracing::info!("Puffin profiler server started on http://0.0.0.0:8585");
                    let _ = PROFILING_SERVER.set(server);
                }
                Err(e) => {
                    tracing::error!("Failed to start puffin server: {}", e);
                }
            }
        }
        #[cfg(not(feature = "profiling"))]
        ProfilingBackend::PuffinHttp => {
            tracing::warn!("puffin_http support not compiled in; scopes recorded locally only");
        }
    }
}

/// Mark the start of a new frame for profiling.
#[inline]
pub fn new_frame() {
    puffin::GlobalProfiler::lock().new_frame();
}
