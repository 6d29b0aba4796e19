//! Mock implementation of [`RenderBackend`] for testing.
//!
//! Nothing touches a GPU. Targets and depth buffers are plain values built
//! from their descriptors, and every call is appended to a log.

use parking_lot::Mutex;
use vesper_render::{
    BackendError, BackendResult, Capability, ColourValue, ConfigOptionMap, DepthBuffer,
    GpuParamVariability, GpuProgram, GpuProgramParameters, GpuProgramType, OcclusionQueryId, Plane,
    RenderBackend, RenderOperation, RenderSystemCapabilities, RenderSystemConfig, RenderTarget,
    RenderTargetDesc, RenderTargetKind, TextureFiltering, TextureHandle, UvwAddressingMode,
    Viewport,
};

/// Name reported by a default [`MockBackend`].
pub const MOCK_RENDER_SYSTEM_NAME: &str = "Mock";

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Initialise,
    SetWaitForVerticalBlank(bool),
    CreateRenderWindow { name: String },
    CreateRenderTexture { name: String },
    CreateMultiRenderTarget { name: String },
    CreateDepthBuffer { target: String, width: u32, height: u32 },
    CopyDepthBuffer,
    DestroyDepthBuffer { width: u32, height: u32 },
    DestroyRenderTarget { name: String },
    SetRenderTarget { name: String },
    SetViewport { width: u32, height: u32 },
    UpdateRenderTarget { name: String, swap_buffers: bool },
    SwapRenderTargetBuffers { name: String, vsync_interval: Option<u32> },
    BeginFrame,
    EndFrame,
    Render { vertex_count: usize },
    SetClipPlanes { count: usize },
    SetDepthBias { constant: f32, slope_scale: f32 },
    BindGpuProgram { name: String },
    UnbindGpuProgram { stage: GpuProgramType },
    BindGpuProgramParameters {
        stage: GpuProgramType,
        mask: GpuParamVariability,
        pass_iteration_number: Option<f32>,
    },
    SetTexture { unit: usize, enabled: bool, texture: Option<TextureHandle> },
    SetVertexTexture { unit: usize, texture: Option<TextureHandle> },
    SetTextureUnitFiltering { unit: usize },
    SetTextureLayerAnisotropy { unit: usize, anisotropy: u32 },
    SetTextureMipmapBias { unit: usize, bias: f32 },
    SetTextureAddressingMode { unit: usize },
    SetTextureBorderColour { unit: usize },
    CreateOcclusionQuery { id: OcclusionQueryId },
    DestroyOcclusionQuery { id: OcclusionQueryId },
    RegisterThread,
    UnregisterThread,
    PreExtraThreadsStarted,
    PostExtraThreadsStarted,
    Shutdown,
}

/// Capabilities a [`MockBackend`] reports unless told otherwise.
pub fn default_mock_capabilities(name: &str) -> RenderSystemCapabilities {
    let mut caps = RenderSystemCapabilities::new();
    caps.set_render_system_name(name);
    caps.set_device_name("Mock Device");
    for cap in [
        Capability::Blending,
        Capability::Anisotropy,
        Capability::HwStencil,
        Capability::VertexProgram,
        Capability::FragmentProgram,
        Capability::HwOcclusion,
        Capability::UserClipPlanes,
        Capability::VertexFormatUbyte4,
        Capability::MipmapLodBias,
    ] {
        caps.set_capability(cap);
    }
    caps.set_num_texture_units(8);
    caps.set_max_supported_anisotropy(8.0);
    caps.set_stencil_buffer_bit_depth(8);
    caps.add_shader_profile("wgsl");
    caps.add_shader_profile("glsl");
    caps
}

/// Recording backend.
///
/// Methods that take `&self` still log, so the call log sits behind a `Mutex`.
pub struct MockBackend {
    name: String,
    calls: Mutex<Vec<BackendCall>>,
    capabilities: RenderSystemCapabilities,
    options: ConfigOptionMap,
    fail_window_creation: bool,
    fail_depth_buffer_creation: bool,
    undersized_depth_buffers: bool,
    separate_vertex_textures: bool,
    next_query: u32,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            name: MOCK_RENDER_SYSTEM_NAME.to_string(),
            calls: Mutex::new(Vec::new()),
            capabilities: default_mock_capabilities(MOCK_RENDER_SYSTEM_NAME),
            options: ConfigOptionMap::new(),
            fail_window_creation: false,
            fail_depth_buffer_creation: false,
            undersized_depth_buffers: false,
            separate_vertex_textures: false,
            next_query: 0,
        }
    }

    /// Rename the backend. The default capabilities follow the new name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self.capabilities.set_render_system_name(self.name.clone());
        self
    }

    pub fn with_capabilities(mut self, capabilities: RenderSystemCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_config_options(mut self, options: ConfigOptionMap) -> Self {
        self.options = options;
        self
    }

    pub fn with_failing_windows(mut self) -> Self {
        self.fail_window_creation = true;
        self
    }

    /// `create_depth_buffer_for` returns `None`.
    pub fn with_failing_depth_buffers(mut self) -> Self {
        self.fail_depth_buffer_creation = true;
        self
    }

    /// Created depth buffers are half the target size and so never attach.
    pub fn with_undersized_depth_buffers(mut self) -> Self {
        self.undersized_depth_buffers = true;
        self
    }

    /// Accept `set_vertex_texture` instead of reporting it unsupported.
    pub fn with_separate_vertex_textures(mut self) -> Self {
        self.separate_vertex_textures = true;
        self
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().push(call);
    }

    /// Get a copy of all recorded calls.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().clone()
    }

    /// Count calls matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&BackendCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| predicate(call)).count()
    }

    /// Names of destroyed render targets, in destruction order.
    pub fn destroyed_targets(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                BackendCall::DestroyRenderTarget { name } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    /// Every depth bias applied, in order.
    pub fn depth_biases(&self) -> Vec<f32> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                BackendCall::SetDepthBias { constant, .. } => Some(*constant),
                _ => None,
            })
            .collect()
    }

    /// Clear recorded calls (useful between test steps).
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn friendly_name(&self) -> &str {
        "Mock Render System"
    }

    fn config_options(&self) -> ConfigOptionMap {
        self.options.clone()
    }

    fn validate_config_options(&self, options: &ConfigOptionMap) -> String {
        match options.value("Video Mode") {
            Some("") => "A video mode must be selected".to_string(),
            _ => String::new(),
        }
    }

    fn initialise(&mut self, _config: &RenderSystemConfig) -> BackendResult<()> {
        self.record(BackendCall::Initialise);
        Ok(())
    }

    fn create_render_system_capabilities(&self) -> RenderSystemCapabilities {
        self.capabilities.clone()
    }

    fn set_wait_for_vertical_blank(&mut self, enabled: bool) {
        self.record(BackendCall::SetWaitForVerticalBlank(enabled));
    }

    fn create_render_window(&mut self, desc: &RenderTargetDesc) -> BackendResult<RenderTarget> {
        if self.fail_window_creation {
            tracing::debug!("MockBackend refusing to create window '{}'", desc.name);
            return Err(BackendError::creation_failed(format!(
                "mock refuses to create window '{}'",
                desc.name
            )));
        }
        self.record(BackendCall::CreateRenderWindow {
            name: desc.name.clone(),
        });
        Ok(RenderTarget::new(RenderTargetKind::Window, desc))
    }

    fn create_render_texture(&mut self, desc: &RenderTargetDesc) -> BackendResult<RenderTarget> {
        self.record(BackendCall::CreateRenderTexture {
            name: desc.name.clone(),
        });
        Ok(RenderTarget::new(RenderTargetKind::Texture, desc))
    }

    fn create_multi_render_target(&mut self, name: &str) -> BackendResult<RenderTarget> {
        self.record(BackendCall::CreateMultiRenderTarget {
            name: name.to_string(),
        });
        let desc = RenderTargetDesc::texture(name, 0, 0);
        Ok(RenderTarget::new(RenderTargetKind::MultiRenderTarget, &desc))
    }

    fn create_depth_buffer_for(
        &mut self,
        target: &RenderTarget,
        _exact_format: bool,
    ) -> Option<DepthBuffer> {
        if self.fail_depth_buffer_creation {
            tracing::debug!("MockBackend refusing depth buffer for '{}'", target.name());
            return None;
        }
        let mut buffer = DepthBuffer::for_target(target);
        if self.undersized_depth_buffers {
            buffer = DepthBuffer::new(target.width() / 2, target.height() / 2, buffer.format())
                .with_fsaa(target.fsaa(), target.fsaa_hint())
                .with_depth_texture(target.prefers_depth_texture());
        }
        self.record(BackendCall::CreateDepthBuffer {
            target: target.name().to_string(),
            width: buffer.width(),
            height: buffer.height(),
        });
        Some(buffer)
    }

    fn copy_depth_buffer(&mut self, _src: &DepthBuffer, _dst: &DepthBuffer) -> BackendResult<()> {
        self.record(BackendCall::CopyDepthBuffer);
        Ok(())
    }

    fn destroy_depth_buffer(&mut self, buffer: &DepthBuffer) {
        self.record(BackendCall::DestroyDepthBuffer {
            width: buffer.width(),
            height: buffer.height(),
        });
    }

    fn destroy_render_target(&mut self, target: &RenderTarget) {
        self.record(BackendCall::DestroyRenderTarget {
            name: target.name().to_string(),
        });
    }

    fn set_render_target(&mut self, target: &RenderTarget) -> BackendResult<()> {
        self.record(BackendCall::SetRenderTarget {
            name: target.name().to_string(),
        });
        Ok(())
    }

    fn set_viewport(&mut self, viewport: &Viewport) -> BackendResult<()> {
        self.record(BackendCall::SetViewport {
            width: viewport.width,
            height: viewport.height,
        });
        Ok(())
    }

    fn update_render_target(&mut self, target: &RenderTarget, swap_buffers: bool) -> BackendResult<()> {
        self.record(BackendCall::UpdateRenderTarget {
            name: target.name().to_string(),
            swap_buffers,
        });
        Ok(())
    }

    fn swap_render_target_buffers(
        &mut self,
        target: &RenderTarget,
        vsync_interval: Option<u32>,
    ) -> BackendResult<()> {
        self.record(BackendCall::SwapRenderTargetBuffers {
            name: target.name().to_string(),
            vsync_interval,
        });
        Ok(())
    }

    fn begin_frame(&mut self) -> BackendResult<()> {
        self.record(BackendCall::BeginFrame);
        Ok(())
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        self.record(BackendCall::EndFrame);
        Ok(())
    }

    fn render(&mut self, op: &RenderOperation) -> BackendResult<()> {
        self.record(BackendCall::Render {
            vertex_count: op.vertex_count,
        });
        Ok(())
    }

    fn set_clip_planes(&mut self, planes: &[Plane]) {
        self.record(BackendCall::SetClipPlanes {
            count: planes.len(),
        });
    }

    fn set_depth_bias(&mut self, constant_bias: f32, slope_scale_bias: f32) {
        self.record(BackendCall::SetDepthBias {
            constant: constant_bias,
            slope_scale: slope_scale_bias,
        });
    }

    fn bind_gpu_program(&mut self, program: &GpuProgram) -> BackendResult<()> {
        self.record(BackendCall::BindGpuProgram {
            name: program.name().to_string(),
        });
        Ok(())
    }

    fn unbind_gpu_program(&mut self, stage: GpuProgramType) {
        self.record(BackendCall::UnbindGpuProgram { stage });
    }

    fn bind_gpu_program_parameters(
        &mut self,
        stage: GpuProgramType,
        params: &GpuProgramParameters,
        mask: GpuParamVariability,
    ) {
        self.record(BackendCall::BindGpuProgramParameters {
            stage,
            mask,
            pass_iteration_number: params.pass_iteration_number(),
        });
    }

    fn set_texture(
        &mut self,
        unit: usize,
        enabled: bool,
        texture: Option<TextureHandle>,
    ) -> BackendResult<()> {
        self.record(BackendCall::SetTexture {
            unit,
            enabled,
            texture,
        });
        Ok(())
    }

    fn set_vertex_texture(&mut self, unit: usize, texture: Option<TextureHandle>) -> BackendResult<()> {
        if !self.separate_vertex_textures {
            return Err(BackendError::unsupported(
                "mock backend has no separate vertex texture units",
            ));
        }
        self.record(BackendCall::SetVertexTexture { unit, texture });
        Ok(())
    }

    fn set_texture_unit_filtering(&mut self, unit: usize, _filtering: TextureFiltering) {
        self.record(BackendCall::SetTextureUnitFiltering { unit });
    }

    fn set_texture_layer_anisotropy(&mut self, unit: usize, anisotropy: u32) {
        self.record(BackendCall::SetTextureLayerAnisotropy { unit, anisotropy });
    }

    fn set_texture_mipmap_bias(&mut self, unit: usize, bias: f32) {
        self.record(BackendCall::SetTextureMipmapBias { unit, bias });
    }

    fn set_texture_addressing_mode(&mut self, unit: usize, _mode: UvwAddressingMode) {
        self.record(BackendCall::SetTextureAddressingMode { unit });
    }

    fn set_texture_border_colour(&mut self, unit: usize, _colour: ColourValue) {
        self.record(BackendCall::SetTextureBorderColour { unit });
    }

    fn create_hardware_occlusion_query(&mut self) -> BackendResult<OcclusionQueryId> {
        let id = OcclusionQueryId(self.next_query);
        self.next_query += 1;
        self.record(BackendCall::CreateOcclusionQuery { id });
        Ok(id)
    }

    fn destroy_hardware_occlusion_query(&mut self, query: OcclusionQueryId) {
        self.record(BackendCall::DestroyOcclusionQuery { id: query });
    }

    fn register_thread(&mut self) {
        self.record(BackendCall::RegisterThread);
    }

    fn unregister_thread(&mut self) {
        self.record(BackendCall::UnregisterThread);
    }

    fn pre_extra_threads_started(&mut self) {
        self.record(BackendCall::PreExtraThreadsStarted);
    }

    fn post_extra_threads_started(&mut self) {
        self.record(BackendCall::PostExtraThreadsStarted);
    }

    fn shutdown(&mut self) {
        self.record(BackendCall::Shutdown);
    }
}
