//! Vesper Core
//!
//! Shared utilities for the Vesper crates: logging bootstrap, profiling hooks,
//! generational arenas and the small amount of math the render layer needs.

pub mod alloc;
pub mod config;
pub mod logging;
pub mod math;
pub mod profiling;
