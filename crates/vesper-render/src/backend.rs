//! The contract every concrete graphics backend implements.
//!
//! A backend owns native resources only. All bookkeeping that is the same
//! for every API (capability gating, depth buffer pooling, statistics, frame
//! state) lives in [`RenderSystem`](crate::RenderSystem), which wraps one
//! `RenderBackend` and calls into it.
//!
//! # Example
//!
//! ```ignore
//! use vesper_render::{RenderSystem, RenderSystemConfig, RenderTargetDesc};
//!
//! let backend = MyBackend::new();
//! let mut rs = RenderSystem::new(backend, RenderSystemConfig::default());
//! let window = rs.initialise(Some(RenderTargetDesc::window("main", 1280, 720)))?;
//! ```

use vesper_core::math::{ColourValue, Plane};

use crate::capabilities::RenderSystemCapabilities;
use crate::config::{ConfigOptionMap, RenderSystemConfig};
use crate::depth_buffer::DepthBuffer;
use crate::error::{BackendError, BackendResult};
use crate::gpu_program::{GpuParamVariability, GpuProgram, GpuProgramParameters, GpuProgramType};
use crate::operation::RenderOperation;
use crate::target::{RenderTarget, RenderTargetDesc, Viewport};
use crate::texture::{TextureFiltering, TextureHandle, UvwAddressingMode};

/// Identifies a hardware occlusion query created by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OcclusionQueryId(pub u32);

/// Native API operations behind a [`RenderSystem`](crate::RenderSystem).
pub trait RenderBackend {
    // ===== Identity & setup =====

    /// Stable identifier, matched against `render_system_name` in custom capabilities.
    fn name(&self) -> &str;

    /// Human readable name for logs and UI.
    fn friendly_name(&self) -> &str {
        self.name()
    }

    /// Options this backend exposes for configuration.
    fn config_options(&self) -> ConfigOptionMap {
        ConfigOptionMap::new()
    }

    /// Empty when `options` describe a usable configuration, otherwise the first problem.
    fn validate_config_options(&self, _options: &ConfigOptionMap) -> String {
        String::new()
    }

    fn initialise(&mut self, config: &RenderSystemConfig) -> BackendResult<()>;

    /// Query the real hardware limits.
    fn create_render_system_capabilities(&self) -> RenderSystemCapabilities;

    fn set_wait_for_vertical_blank(&mut self, _enabled: bool) {}

    // ===== Factories =====

    fn create_render_window(&mut self, desc: &RenderTargetDesc) -> BackendResult<RenderTarget>;

    fn create_render_texture(&mut self, desc: &RenderTargetDesc) -> BackendResult<RenderTarget>;

    fn create_multi_render_target(&mut self, name: &str) -> BackendResult<RenderTarget>;

    /// A new depth buffer suited to `target`, or `None` if the device cannot make one.
    fn create_depth_buffer_for(
        &mut self,
        target: &RenderTarget,
        exact_format: bool,
    ) -> Option<DepthBuffer>;

    // ===== Depth buffers =====

    /// Whether `target` accepts `buffer`. Backends with extra constraints override this.
    fn can_attach_depth_buffer(
        &self,
        target: &RenderTarget,
        buffer: &DepthBuffer,
        exact_format: bool,
    ) -> bool {
        buffer.is_compatible(target, exact_format)
    }

    /// Copy depth contents. Preconditions are checked by the caller.
    fn copy_depth_buffer(&mut self, src: &DepthBuffer, dst: &DepthBuffer) -> BackendResult<()>;

    fn destroy_depth_buffer(&mut self, buffer: &DepthBuffer);

    // ===== Targets, viewports & frames =====

    fn destroy_render_target(&mut self, target: &RenderTarget);

    fn set_render_target(&mut self, target: &RenderTarget) -> BackendResult<()>;

    fn set_viewport(&mut self, viewport: &Viewport) -> BackendResult<()>;

    /// Render every viewport of `target`, presenting it afterwards if `swap_buffers`.
    fn update_render_target(&mut self, target: &RenderTarget, swap_buffers: bool) -> BackendResult<()>;

    /// Present `target`. `vsync_interval` is `None` when not waiting for vertical blank.
    fn swap_render_target_buffers(
        &mut self,
        target: &RenderTarget,
        vsync_interval: Option<u32>,
    ) -> BackendResult<()>;

    fn begin_frame(&mut self) -> BackendResult<()>;

    fn end_frame(&mut self) -> BackendResult<()>;

    fn render(&mut self, op: &RenderOperation) -> BackendResult<()>;

    // ===== Fixed state =====

    /// Apply user clip planes. Called lazily right before a draw.
    fn set_clip_planes(&mut self, planes: &[Plane]);

    fn set_depth_bias(&mut self, constant_bias: f32, slope_scale_bias: f32);

    // ===== Programs =====

    fn bind_gpu_program(&mut self, program: &GpuProgram) -> BackendResult<()>;

    fn unbind_gpu_program(&mut self, stage: GpuProgramType);

    /// Upload the constants of `params` selected by `mask`.
    fn bind_gpu_program_parameters(
        &mut self,
        stage: GpuProgramType,
        params: &GpuProgramParameters,
        mask: GpuParamVariability,
    );

    // ===== Textures =====

    fn set_texture(
        &mut self,
        unit: usize,
        enabled: bool,
        texture: Option<TextureHandle>,
    ) -> BackendResult<()>;

    /// Bind to a separate vertex sampler. Only backends reporting
    /// `VertexTextureFetch` without shared units need to support it.
    fn set_vertex_texture(&mut self, _unit: usize, _texture: Option<TextureHandle>) -> BackendResult<()> {
        Err(BackendError::unsupported(format!(
            "{} has no separate vertex texture units",
            self.name()
        )))
    }

    fn set_texture_unit_filtering(&mut self, unit: usize, filtering: TextureFiltering);

    fn set_texture_layer_anisotropy(&mut self, unit: usize, anisotropy: u32);

    fn set_texture_mipmap_bias(&mut self, unit: usize, bias: f32);

    fn set_texture_addressing_mode(&mut self, unit: usize, mode: UvwAddressingMode);

    fn set_texture_border_colour(&mut self, unit: usize, colour: ColourValue);

    // ===== Queries =====

    fn create_hardware_occlusion_query(&mut self) -> BackendResult<OcclusionQueryId>;

    fn destroy_hardware_occlusion_query(&mut self, query: OcclusionQueryId);

    // ===== Threads & teardown =====

    /// Associate the calling thread with the device context.
    fn register_thread(&mut self) {}

    fn unregister_thread(&mut self) {}

    fn pre_extra_threads_started(&mut self) {}

    fn post_extra_threads_started(&mut self) {}

    /// Release everything still owned by the device.
    fn shutdown(&mut self) {}
}
