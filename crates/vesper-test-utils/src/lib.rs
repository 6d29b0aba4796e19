//! Test utilities for Vesper.
//!
//! Provides [`MockBackend`] (feature `mock`), a [`RenderBackend`] that creates
//! no native resources and records every call it receives so tests can
//! assert on what the shared render system layer asked for.
//!
//! # Example
//!
//! ```rust
//! # #[cfg(feature = "mock")]
//! # {
//! use vesper_render::{RenderSystem, RenderSystemConfig, RenderTargetDesc};
//! use vesper_test_utils::{BackendCall, MockBackend};
//!
//! let mut rs = RenderSystem::new(MockBackend::new(), RenderSystemConfig::default());
//! rs.initialise(Some(RenderTargetDesc::window("main", 640, 480))).unwrap();
//!
//! assert_eq!(
//!     rs.backend().count(|call| matches!(call, BackendCall::CreateRenderWindow { .. })),
//!     1
//! );
//! # }
//! ```
//!
//! [`RenderBackend`]: vesper_render::RenderBackend

#[cfg(feature = "mock")]
pub mod mock_backend;

#[cfg(feature = "mock")]
pub use mock_backend::*;
