//! Vesper Render
//!
//! Backend-independent render system layer: capability negotiation, GPU
//! program gating, depth buffer pooling and render target management.
//!
//! A concrete graphics API implements [`RenderBackend`]; [`RenderSystem`]
//! wraps it and implements every shared rule once.
//!
//! # Example
//!
//! ```ignore
//! use vesper_render::{RenderSystem, RenderSystemConfig, RenderTargetDesc, Viewport};
//!
//! let mut rs = RenderSystem::new(backend, RenderSystemConfig::default());
//! let window = rs.initialise(Some(RenderTargetDesc::window("main", 1280, 720)))?.unwrap();
//! let viewport = Viewport::full(window, rs.render_target(window).unwrap());
//! rs.set_viewport(viewport)?;
//!
//! rs.begin_frame()?;
//! rs.render(&op)?;
//! rs.end_frame()?;
//! ```

pub mod backend;
pub mod capabilities;
pub mod clip;
pub mod config;
pub mod depth_buffer;
pub mod error;
pub mod events;
pub mod frame;
pub mod gpu_program;
pub mod operation;
pub mod render_system;
pub mod rendercaps;
pub mod target;
pub mod texture;
pub mod threads;
pub mod wgpu_caps;

pub use backend::{OcclusionQueryId, RenderBackend};
pub use capabilities::{
    CapabilitiesCategory, Capability, DriverVersion, GpuVendor, ProgramConstantCounts,
    RenderSystemCapabilities,
};
pub use clip::{ClipPlaneState, ProgramBindingListener};
pub use config::{ConfigOption, ConfigOptionMap, RenderSystemConfig};
pub use depth_buffer::{DepthBuffer, DepthBufferId, DepthBufferPool, DepthFormat, DetachOutcome, PoolId};
pub use error::{BackendError, BackendErrorKind, BackendResult, RenderSystemError, RenderSystemResult};
pub use events::{EventListener, ListenerId, RenderSystemEvent};
pub use frame::{FrameContext, FrameState};
pub use gpu_program::{GpuParamVariability, GpuProgram, GpuProgramParameters, GpuProgramType};
pub use operation::{GeometryStats, OperationType, RenderOperation};
pub use render_system::{DerivedDepthBias, RenderSystem};
pub use rendercaps::{CapabilitiesLibrary, ParseDiagnostic, ParsedRenderCaps, RenderCapsError, RenderCapsResult};
pub use target::{
    DEFAULT_RT_GROUP, NUM_RENDERTARGET_GROUPS, REND_TO_TEX_RT_GROUP, RenderTarget, RenderTargetDesc,
    RenderTargetId, RenderTargetKind, RenderTargetRegistry, Viewport,
};
pub use texture::{
    FilterOption, TextureAddressingMode, TextureBindingType, TextureFiltering, TextureHandle,
    TextureUnitSettings, UvwAddressingMode,
};

/// Re-export of the vesper-core math types used in this crate's API.
pub use vesper_core::math::{ColourValue, Plane};
