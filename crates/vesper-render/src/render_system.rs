//! The backend-independent render system layer.
//!
//! [`RenderSystem`] wraps a [`RenderBackend`] and owns everything that is the
//! same for every graphics API: the capability set, the render target
//! registry, the depth buffer pool, the frame state machine, draw statistics,
//! clip planes, program binding bookkeeping and pass iteration state.
//!
//! # Ownership
//!
//! Render targets and depth buffers live in arenas owned by the render system
//! and are referred to by [`RenderTargetId`] / [`DepthBufferId`]. A depth buffer
//! only records the ids of the targets using it and never keeps a target alive.
//!
//! # Threading
//!
//! All mutation happens on the thread owning the render system. Worker threads
//! that need the device call [`RenderSystem::register_thread`] between
//! [`RenderSystem::pre_extra_threads_started`] and
//! [`RenderSystem::post_extra_threads_started`]. Share across threads with
//! `Arc<parking_lot::Mutex<RenderSystem<_>>>`.

use vesper_core::math::Plane;
use vesper_core::profiling::profile_function;

use crate::backend::{OcclusionQueryId, RenderBackend};
use crate::capabilities::{Capability, RenderSystemCapabilities};
use crate::clip::{ClipPlaneState, ProgramBindings};
use crate::config::{ConfigOptionMap, RenderSystemConfig};
use crate::depth_buffer::{DepthBuffer, DepthBufferId, DepthBufferPool, DetachOutcome, PoolId};
use crate::error::{RenderSystemError, RenderSystemResult};
use crate::events::{EventDispatcher, EventListener, ListenerId, RenderSystemEvent};
use crate::frame::{FrameContext, FrameState};
use crate::gpu_program::{GpuParamVariability, GpuProgram, GpuProgramParameters, GpuProgramType};
use crate::operation::{GeometryStats, RenderOperation};
use crate::target::{
    REND_TO_TEX_RT_GROUP, RenderTarget, RenderTargetDesc, RenderTargetId, RenderTargetKind,
    RenderTargetRegistry, Viewport,
};
use crate::texture::{TextureBindingType, TextureUnitSettings};
use crate::threads::ThreadRegistry;

/// Depth bias derived from the pass iteration index.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DerivedDepthBias {
    pub enabled: bool,
    pub base: f32,
    pub multiplier: f32,
    pub slope_scale: f32,
}

impl DerivedDepthBias {
    /// Constant bias for the given iteration.
    pub fn bias_for(&self, iteration: usize) -> f32 {
        self.base + self.multiplier * iteration as f32
    }
}

/// Shared render system state wrapped around a backend.
pub struct RenderSystem<B: RenderBackend> {
    backend: B,
    config: RenderSystemConfig,
    options: ConfigOptionMap,
    state: FrameState,
    frame_number: u64,

    real_capabilities: Option<RenderSystemCapabilities>,
    custom_capabilities: Option<RenderSystemCapabilities>,
    current_capabilities: RenderSystemCapabilities,

    targets: RenderTargetRegistry,
    active_target: Option<RenderTargetId>,
    primary_window: Option<RenderTargetId>,
    active_viewport: Option<Viewport>,
    depth_buffers: DepthBufferPool,

    programs: ProgramBindings,
    clip_planes: ClipPlaneState,
    stats: GeometryStats,
    pass_iteration_count: usize,
    pass_iteration_index: usize,
    derived_depth_bias: DerivedDepthBias,
    disabled_tex_units_from: usize,

    occlusion_queries: Vec<OcclusionQueryId>,
    threads: ThreadRegistry,
    events: EventDispatcher,
    invert_vertex_winding: bool,
}

impl<B: RenderBackend> RenderSystem<B> {
    pub fn new(backend: B, config: RenderSystemConfig) -> Self {
        let options = backend.config_options();
        Self {
            backend,
            config,
            options,
            state: FrameState::Uninitialized,
            frame_number: 0,
            real_capabilities: None,
            custom_capabilities: None,
            current_capabilities: RenderSystemCapabilities::new(),
            targets: RenderTargetRegistry::new(),
            active_target: None,
            primary_window: None,
            active_viewport: None,
            depth_buffers: DepthBufferPool::new(),
            programs: ProgramBindings::new(),
            clip_planes: ClipPlaneState::new(),
            stats: GeometryStats::default(),
            pass_iteration_count: 1,
            pass_iteration_index: 0,
            derived_depth_bias: DerivedDepthBias::default(),
            disabled_tex_units_from: 0,
            occlusion_queries: Vec::new(),
            threads: ThreadRegistry::new(),
            events: EventDispatcher::new(),
            invert_vertex_winding: false,
        }
    }

    // ===== Accessors =====

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn name(&self) -> &str {
        self.backend.name()
    }

    pub fn friendly_name(&self) -> &str {
        self.backend.friendly_name()
    }

    pub fn config(&self) -> &RenderSystemConfig {
        &self.config
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Number of frames begun so far.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Capabilities in effect: custom ones if supplied, otherwise the real ones.
    pub fn capabilities(&self) -> &RenderSystemCapabilities {
        &self.current_capabilities
    }

    /// What the hardware actually reported. `None` before initialise.
    pub fn real_capabilities(&self) -> Option<&RenderSystemCapabilities> {
        self.real_capabilities.as_ref()
    }

    pub fn is_using_custom_capabilities(&self) -> bool {
        self.custom_capabilities.is_some()
    }

    // ===== Configuration =====

    pub fn config_options(&self) -> &ConfigOptionMap {
        &self.options
    }

    pub fn set_config_option(&mut self, name: &str, value: &str) -> RenderSystemResult<()> {
        self.options.set(name, value)?;
        tracing::debug!("Config option '{}' set to '{}'", name, value);
        Ok(())
    }

    /// Empty when the current options are usable, otherwise the first problem.
    pub fn validate_config_options(&self) -> String {
        self.backend.validate_config_options(&self.options)
    }

    pub fn set_wait_for_vertical_blank(&mut self, enabled: bool) {
        self.config.vsync = enabled;
        self.backend.set_wait_for_vertical_blank(enabled);
    }

    pub fn wait_for_vertical_blank(&self) -> bool {
        self.config.vsync
    }

    pub fn set_vsync_interval(&mut self, interval: u32) {
        self.config.vsync_interval = interval.max(1);
    }

    pub fn vsync_interval(&self) -> u32 {
        self.config.vsync_interval
    }

    pub fn set_wbuffer_enabled(&mut self, enabled: bool) {
        self.config.wbuffer = enabled;
    }

    pub fn is_wbuffer_enabled(&self) -> bool {
        self.config.wbuffer
    }

    pub fn set_invert_vertex_winding(&mut self, invert: bool) {
        self.invert_vertex_winding = invert;
    }

    pub fn invert_vertex_winding(&self) -> bool {
        self.invert_vertex_winding
    }

    // ===== Lifecycle =====

    /// Replace the hardware capabilities with `caps` at initialise.
    ///
    /// Must be called before [`initialise`](Self::initialise).
    pub fn use_custom_capabilities(&mut self, caps: RenderSystemCapabilities) -> RenderSystemResult<()> {
        if self.state != FrameState::Uninitialized {
            return Err(RenderSystemError::CustomCapabilitiesAfterInit);
        }
        tracing::info!(
            "Using custom capabilities for render system '{}'",
            caps.render_system_name()
        );
        self.custom_capabilities = Some(caps);
        Ok(())
    }

    /// Bring up the backend, settle the capability set and optionally create
    /// the first (primary) window.
    pub fn initialise(
        &mut self,
        auto_window: Option<RenderTargetDesc>,
    ) -> RenderSystemResult<Option<RenderTargetId>> {
        profile_function!();

        if self.state != FrameState::Uninitialized {
            return Err(RenderSystemError::InvalidFrameState {
                operation: "initialise",
                state: self.state,
            });
        }

        if let Some(custom) = &self.custom_capabilities
            && custom.render_system_name() != self.backend.name()
        {
            return Err(RenderSystemError::CapabilitiesMismatch {
                expected: self.backend.name().to_string(),
                found: custom.render_system_name().to_string(),
            });
        }

        self.programs.reset();
        self.backend.initialise(&self.config)?;

        let real = self.backend.create_render_system_capabilities();
        self.current_capabilities = match &self.custom_capabilities {
            Some(custom) => custom.clone(),
            None => real.clone(),
        };
        self.real_capabilities = Some(real);
        self.current_capabilities.log();

        self.state = FrameState::Initialized;
        self.backend.set_wait_for_vertical_blank(self.config.vsync);
        self.events.fire(&RenderSystemEvent::CapabilitiesCreated);
        tracing::info!("{} initialised", self.backend.friendly_name());

        match auto_window {
            Some(desc) => self.create_render_window(&desc).map(Some),
            None => Ok(None),
        }
    }

    /// Tear everything down. The primary window is destroyed last.
    pub fn shutdown(&mut self) {
        if self.state == FrameState::ShutDown {
            return;
        }
        tracing::info!("Shutting down {}", self.backend.friendly_name());

        for query in std::mem::take(&mut self.occlusion_queries) {
            self.backend.destroy_hardware_occlusion_query(query);
        }

        self.cleanup_depth_buffers(true);

        let primary = self.primary_window;
        for id in self.targets.ids() {
            if Some(id) != primary {
                self.destroy_target_by_id(id);
            }
        }
        if let Some(id) = primary {
            self.destroy_target_by_id(id);
        }

        self.active_viewport = None;
        self.active_target = None;
        self.programs.reset();
        self.backend.shutdown();
        self.state = FrameState::ShutDown;
        self.events.fire(&RenderSystemEvent::ShutDown);
    }

    fn require_running(&self, operation: &'static str) -> RenderSystemResult<()> {
        if self.state.is_running() {
            Ok(())
        } else {
            Err(RenderSystemError::InvalidFrameState {
                operation,
                state: self.state,
            })
        }
    }

    // ===== Frames =====

    pub fn begin_frame(&mut self) -> RenderSystemResult<()> {
        profile_function!();
        if !self.state.can_begin_frame() {
            return Err(RenderSystemError::InvalidFrameState {
                operation: "begin_frame",
                state: self.state,
            });
        }
        self.start_frame()
    }

    fn start_frame(&mut self) -> RenderSystemResult<()> {
        if self.active_viewport.is_none() {
            return Err(RenderSystemError::NoActiveViewport);
        }
        self.backend.begin_frame()?;
        self.frame_number += 1;
        self.state = FrameState::FrameActive;
        Ok(())
    }

    pub fn end_frame(&mut self) -> RenderSystemResult<()> {
        self.require_frame_active("end_frame")?;
        self.backend.end_frame()?;
        self.state = FrameState::FrameEnded;
        vesper_core::profiling::new_frame();
        Ok(())
    }

    /// End the current frame so unrelated rendering can run, keeping a token to resume.
    pub fn pause_frame(&mut self) -> RenderSystemResult<FrameContext> {
        self.require_frame_active("pause_frame")?;
        self.backend.end_frame()?;
        self.state = FrameState::FramePaused;
        Ok(FrameContext {
            frame_number: self.frame_number,
        })
    }

    /// Begin a new frame after [`pause_frame`](Self::pause_frame). The context is discarded.
    pub fn resume_frame(&mut self, context: FrameContext) -> RenderSystemResult<()> {
        if self.state != FrameState::FramePaused {
            return Err(RenderSystemError::InvalidFrameState {
                operation: "resume_frame",
                state: self.state,
            });
        }
        tracing::trace!("Resuming frame paused at {}", context.frame_number);
        self.start_frame()
    }

    fn require_frame_active(&self, operation: &'static str) -> RenderSystemResult<()> {
        if self.state == FrameState::FrameActive {
            Ok(())
        } else {
            Err(RenderSystemError::InvalidFrameState {
                operation,
                state: self.state,
            })
        }
    }

    // ===== Viewport & active target =====

    /// Make `viewport` current, switching to its target.
    pub fn set_viewport(&mut self, viewport: Viewport) -> RenderSystemResult<()> {
        self.set_render_target(viewport.target)?;
        self.backend.set_viewport(&viewport)?;
        self.active_viewport = Some(viewport);
        Ok(())
    }

    pub fn viewport(&self) -> Option<&Viewport> {
        self.active_viewport.as_ref()
    }

    pub fn clear_viewport(&mut self) {
        self.active_viewport = None;
    }

    /// Make `id` the active target, assigning it a depth buffer on first use.
    pub fn set_render_target(&mut self, id: RenderTargetId) -> RenderSystemResult<()> {
        let target = self.target_or_err(id)?;
        if target.depth_buffer().is_none() && target.depth_pool() != PoolId::NO_DEPTH {
            self.set_depth_buffer_for(id)?;
        }

        let target = self
            .targets
            .get_by_id(id)
            .ok_or_else(|| invalid_target(id))?;
        self.backend.set_render_target(target)?;
        self.active_target = Some(id);
        Ok(())
    }

    pub fn active_render_target(&self) -> Option<RenderTargetId> {
        self.active_target
    }

    fn target_or_err(&self, id: RenderTargetId) -> RenderSystemResult<&RenderTarget> {
        self.targets.get_by_id(id).ok_or_else(|| invalid_target(id))
    }

    // ===== Render targets =====

    /// Create a window. The first window created becomes the primary one.
    pub fn create_render_window(&mut self, desc: &RenderTargetDesc) -> RenderSystemResult<RenderTargetId> {
        self.require_running("create_render_window")?;
        self.targets.check_attachable(&desc.name, desc.priority)?;

        let desc = &self.with_config_defaults(desc);
        let mut target = self.backend.create_render_window(desc)?;
        self.apply_default_depth_pool(desc, &mut target);
        let is_primary = self.primary_window.is_none();
        target.set_primary(is_primary);

        let id = self.targets.attach(target)?;
        if is_primary {
            self.primary_window = Some(id);
        }
        tracing::info!(
            "Created render window '{}' ({}x{}){}",
            desc.name,
            desc.width,
            desc.height,
            if is_primary { " [primary]" } else { "" }
        );
        Ok(id)
    }

    pub fn create_render_texture(&mut self, desc: &RenderTargetDesc) -> RenderSystemResult<RenderTargetId> {
        self.require_running("create_render_texture")?;
        self.targets.check_attachable(&desc.name, desc.priority)?;

        let desc = &self.with_config_defaults(desc);
        let mut target = self.backend.create_render_texture(desc)?;
        self.apply_default_depth_pool(desc, &mut target);
        let id = self.targets.attach(target)?;
        tracing::debug!("Created render texture '{}' ({}x{})", desc.name, desc.width, desc.height);
        Ok(id)
    }

    pub fn create_multi_render_target(&mut self, name: &str) -> RenderSystemResult<RenderTargetId> {
        self.require_running("create_multi_render_target")?;
        self.targets.check_attachable(name, REND_TO_TEX_RT_GROUP)?;

        let target = self.backend.create_multi_render_target(name)?;
        self.targets.attach(target)
    }

    /// Targets without multisampling get the configured FSAA level and hint.
    fn with_config_defaults(&self, desc: &RenderTargetDesc) -> RenderTargetDesc {
        let mut desc = desc.clone();
        if desc.fsaa == 0 {
            desc.fsaa = self.config.fsaa;
            desc.fsaa_hint = self.config.fsaa_hint.clone();
        }
        desc
    }

    /// Targets that did not pick a pool use the configured default.
    fn apply_default_depth_pool(&self, desc: &RenderTargetDesc, target: &mut RenderTarget) {
        if desc.depth_pool == PoolId::DEFAULT {
            target.set_depth_pool(self.config.default_depth_pool);
        }
    }

    /// Register a target built elsewhere.
    pub fn attach_render_target(&mut self, target: RenderTarget) -> RenderSystemResult<RenderTargetId> {
        self.targets.attach(target)
    }

    /// Remove a target from the registry without destroying it.
    ///
    /// Its depth buffer is released and it stops being the active target,
    /// viewport target or primary window.
    pub fn detach_render_target(&mut self, name: &str) -> Option<RenderTarget> {
        let id = self.targets.id_of(name)?;
        self.detach_depth_buffer(id);

        let (id, target) = self.targets.detach(name)?;
        if self.active_target == Some(id) {
            self.active_target = None;
        }
        if self.active_viewport.is_some_and(|vp| vp.target == id) {
            self.active_viewport = None;
        }
        if self.primary_window == Some(id) {
            self.primary_window = None;
        }
        Some(target)
    }

    pub fn destroy_render_target(&mut self, name: &str) -> bool {
        match self.detach_render_target(name) {
            Some(target) => {
                self.release_target(target);
                true
            }
            None => false,
        }
    }

    pub fn destroy_render_window(&mut self, name: &str) -> bool {
        self.destroy_of_kind(name, RenderTargetKind::Window)
    }

    pub fn destroy_render_texture(&mut self, name: &str) -> bool {
        self.destroy_of_kind(name, RenderTargetKind::Texture)
    }

    fn destroy_of_kind(&mut self, name: &str, kind: RenderTargetKind) -> bool {
        match self.targets.get(name).map(RenderTarget::kind) {
            Some(found) if found == kind => self.destroy_render_target(name),
            Some(found) => {
                tracing::warn!(
                    "Render target '{}' is a {:?}, not a {:?}; not destroyed",
                    name,
                    found,
                    kind
                );
                false
            }
            None => false,
        }
    }

    fn destroy_target_by_id(&mut self, id: RenderTargetId) {
        let Some(name) = self.targets.get_by_id(id).map(|t| t.name().to_string()) else {
            return;
        };
        self.destroy_render_target(&name);
    }

    fn release_target(&mut self, target: RenderTarget) {
        self.backend.destroy_render_target(&target);
        tracing::debug!("Destroyed render target '{}'", target.name());
        self.events.fire(&RenderSystemEvent::RenderTargetDestroyed {
            name: target.name().to_string(),
        });
    }

    pub fn get_render_target(&self, name: &str) -> Option<&RenderTarget> {
        self.targets.get(name)
    }

    /// Like [`get_render_target`](Self::get_render_target) but missing targets are an error.
    pub fn require_render_target(&self, name: &str) -> RenderSystemResult<&RenderTarget> {
        self.targets
            .get(name)
            .ok_or_else(|| RenderSystemError::RenderTargetNotFound {
                name: name.to_string(),
            })
    }

    pub fn render_target_id(&self, name: &str) -> Option<RenderTargetId> {
        self.targets.id_of(name)
    }

    pub fn render_target(&self, id: RenderTargetId) -> Option<&RenderTarget> {
        self.targets.get_by_id(id)
    }

    pub fn render_target_mut(&mut self, id: RenderTargetId) -> Option<&mut RenderTarget> {
        self.targets.get_by_id_mut(id)
    }

    /// Targets in update order: ascending priority, attach order within a group.
    pub fn render_targets(&self) -> impl Iterator<Item = (RenderTargetId, &RenderTarget)> {
        self.targets.iter_by_priority()
    }

    pub fn render_target_count(&self) -> usize {
        self.targets.len()
    }

    pub fn primary_window(&self) -> Option<RenderTargetId> {
        self.primary_window
    }

    /// Update every active, auto-updated target in priority order.
    ///
    /// Render textures (lower priority groups) are drawn before the windows
    /// that sample them.
    pub fn update_all_render_targets(&mut self, swap_buffers: bool) -> RenderSystemResult<()> {
        profile_function!();
        self.require_running("update_all_render_targets")?;

        for (_, target) in self.targets.iter_by_priority() {
            if target.is_active() && target.is_auto_updated() {
                self.backend.update_render_target(target, swap_buffers)?;
            }
        }
        Ok(())
    }

    /// Present every active, auto-updated target in priority order.
    pub fn swap_all_render_target_buffers(&mut self, wait_for_vsync: bool) -> RenderSystemResult<()> {
        profile_function!();
        self.require_running("swap_all_render_target_buffers")?;

        let vsync_interval = wait_for_vsync.then_some(self.config.vsync_interval);
        for (_, target) in self.targets.iter_by_priority() {
            if target.is_active() && target.is_auto_updated() {
                self.backend.swap_render_target_buffers(target, vsync_interval)?;
            }
        }
        Ok(())
    }

    // ===== Depth buffers =====

    /// Give `id` a depth buffer from its pool, creating one if none fits.
    ///
    /// Targets in [`PoolId::NO_DEPTH`] are left alone. A backend that cannot
    /// create a buffer only produces a warning.
    pub fn set_depth_buffer_for(&mut self, id: RenderTargetId) -> RenderSystemResult<()> {
        profile_function!();

        let exact = self.config.exact_depth_format;
        let target = self.target_or_err(id)?;
        let pool_id = target.depth_pool();
        if pool_id == PoolId::NO_DEPTH {
            return Ok(());
        }
        if target.depth_buffer().is_some() {
            self.detach_depth_buffer(id);
        }

        let target = self.target_or_err(id)?;
        let reusable = self.depth_buffers.bucket(pool_id).iter().copied().find(|buffer_id| {
            self.depth_buffers
                .get(*buffer_id)
                .is_some_and(|buffer| self.backend.can_attach_depth_buffer(target, buffer, exact))
        });
        if let Some(buffer_id) = reusable {
            self.attach_depth_buffer(id, buffer_id);
            return Ok(());
        }

        let name = target.name().to_string();
        let created = match self.targets.get_by_id(id) {
            Some(target) => self.backend.create_depth_buffer_for(target, exact),
            None => None,
        };
        let Some(mut buffer) = created else {
            tracing::warn!(
                "Couldn't create a suited depth buffer for render target '{}'",
                name
            );
            return Ok(());
        };

        buffer.set_pool_id(pool_id);
        let compatible = self
            .targets
            .get_by_id(id)
            .is_some_and(|target| self.backend.can_attach_depth_buffer(target, &buffer, exact));
        let buffer_id = self.depth_buffers.insert(buffer);
        if !compatible {
            return Err(RenderSystemError::DepthBufferIncompatibleAfterCreation { target: name });
        }

        self.attach_depth_buffer(id, buffer_id);
        tracing::debug!("Created depth buffer for '{}' in pool {}", name, pool_id.0);
        Ok(())
    }

    fn attach_depth_buffer(&mut self, target_id: RenderTargetId, buffer_id: DepthBufferId) {
        if let Some(buffer) = self.depth_buffers.get_mut(buffer_id) {
            buffer.notify_render_target_attached(target_id);
        }
        if let Some(target) = self.targets.get_by_id_mut(target_id) {
            target.set_depth_buffer(Some(buffer_id));
        }
    }

    /// Release the depth buffer of target `id`, if any.
    ///
    /// A non-shareable buffer left without targets is destroyed.
    pub fn detach_depth_buffer(&mut self, id: RenderTargetId) {
        let Some(target) = self.targets.get_by_id_mut(id) else {
            return;
        };
        let Some(buffer_id) = target.depth_buffer() else {
            return;
        };
        target.set_depth_buffer(None);

        let outcome = match self.depth_buffers.get_mut(buffer_id) {
            Some(buffer) => buffer.notify_render_target_detached(id),
            None => return,
        };
        if outcome == DetachOutcome::Destroy {
            self.destroy_pooled_buffer(buffer_id);
        }
    }

    /// Detach `buffer_id` from every target using it.
    ///
    /// Outside of destruction, a non-shareable buffer is then destroyed.
    /// Returns `false` if the id is unknown.
    pub fn detach_depth_buffer_from_all_targets(
        &mut self,
        buffer_id: DepthBufferId,
        in_destructor: bool,
    ) -> bool {
        let Some(buffer) = self.depth_buffers.get_mut(buffer_id) else {
            return false;
        };
        let pool_id = buffer.pool_id();
        for target_id in buffer.take_attached_targets() {
            if let Some(target) = self.targets.get_by_id_mut(target_id)
                && target.depth_buffer() == Some(buffer_id)
            {
                target.set_depth_buffer(None);
            }
        }

        if !in_destructor && pool_id == PoolId::NON_SHAREABLE {
            self.destroy_pooled_buffer(buffer_id);
        }
        true
    }

    /// Detach and destroy one pooled buffer.
    pub fn destroy_depth_buffer(&mut self, buffer_id: DepthBufferId) -> bool {
        if !self.detach_depth_buffer_from_all_targets(buffer_id, true) {
            return false;
        }
        self.destroy_pooled_buffer(buffer_id);
        true
    }

    fn destroy_pooled_buffer(&mut self, buffer_id: DepthBufferId) {
        if let Some(buffer) = self.depth_buffers.remove(buffer_id) {
            self.backend.destroy_depth_buffer(&buffer);
            tracing::debug!(
                "Destroyed {}x{} depth buffer from pool {}",
                buffer.width(),
                buffer.height(),
                buffer.pool_id().0
            );
        }
    }

    /// Destroy pooled buffers. Manual buffers survive unless `clean_manual`.
    pub fn cleanup_depth_buffers(&mut self, clean_manual: bool) {
        for buffer_id in self.depth_buffers.ids() {
            let manual = self
                .depth_buffers
                .get(buffer_id)
                .is_some_and(DepthBuffer::is_manual);
            if manual && !clean_manual {
                continue;
            }
            self.destroy_depth_buffer(buffer_id);
        }
    }

    /// Hand a caller-built buffer to the pool it names.
    pub fn add_manual_depth_buffer(&mut self, buffer: DepthBuffer) -> DepthBufferId {
        self.depth_buffers.insert(buffer.with_manual(true))
    }

    /// Copy depth contents between two distinct buffers of identical shape.
    pub fn copy_depth_buffer(&mut self, src: DepthBufferId, dst: DepthBufferId) -> RenderSystemResult<()> {
        if src == dst {
            return Err(RenderSystemError::DepthBufferCopyMismatch {
                reason: "source and destination are the same buffer".to_string(),
            });
        }
        let source = self.depth_buffers.get(src).ok_or_else(|| invalid_buffer(src))?;
        let destination = self.depth_buffers.get(dst).ok_or_else(|| invalid_buffer(dst))?;
        source
            .check_copy_to(destination)
            .map_err(|reason| RenderSystemError::DepthBufferCopyMismatch { reason })?;

        self.backend.copy_depth_buffer(source, destination)?;
        Ok(())
    }

    pub fn depth_buffer(&self, id: DepthBufferId) -> Option<&DepthBuffer> {
        self.depth_buffers.get(id)
    }

    pub fn depth_buffer_pool(&self) -> &DepthBufferPool {
        &self.depth_buffers
    }

    // ===== Geometry & statistics =====

    pub fn begin_geometry_count(&mut self) {
        self.stats.reset();
    }

    pub fn geometry_stats(&self) -> GeometryStats {
        self.stats
    }

    pub fn face_count(&self) -> usize {
        self.stats.faces
    }

    pub fn batch_count(&self) -> usize {
        self.stats.batches
    }

    pub fn vertex_count(&self) -> usize {
        self.stats.vertices
    }

    /// Submit a draw, applying pending clip planes first.
    pub fn render(&mut self, op: &RenderOperation) -> RenderSystemResult<()> {
        profile_function!();
        self.stats.record(op, self.pass_iteration_count);

        if let Some(planes) = self.clip_planes.take_dirty() {
            self.backend.set_clip_planes(planes);
        }
        self.backend.render(op)?;
        Ok(())
    }

    // ===== Clip planes =====

    pub fn add_clip_plane(&mut self, plane: Plane) {
        self.clip_planes.add(plane);
    }

    pub fn set_clip_planes(&mut self, planes: &[Plane]) {
        self.clip_planes.set(planes);
    }

    pub fn reset_clip_planes(&mut self) {
        self.clip_planes.reset();
    }

    pub fn clip_planes(&self) -> &[Plane] {
        self.clip_planes.planes()
    }

    /// Whether clip planes will be re-applied before the next draw.
    pub fn are_clip_planes_dirty(&self) -> bool {
        self.clip_planes.is_dirty()
    }

    // ===== GPU programs =====

    /// Bind `program` if the current capabilities support it.
    ///
    /// Returns `Ok(false)` for unsupported programs so the caller can fall back.
    pub fn bind_gpu_program(&mut self, program: &GpuProgram) -> RenderSystemResult<bool> {
        if !program.is_supported(&self.current_capabilities) {
            tracing::warn!(
                "{} program '{}' ({}) is not supported by {}",
                program.program_type(),
                program.name(),
                program.syntax_code(),
                self.backend.name()
            );
            return Ok(false);
        }

        self.backend.bind_gpu_program(program)?;
        self.programs
            .set_bound(program.program_type(), true, &mut self.clip_planes);
        Ok(true)
    }

    pub fn unbind_gpu_program(&mut self, stage: GpuProgramType) {
        self.backend.unbind_gpu_program(stage);
        self.programs.set_bound(stage, false, &mut self.clip_planes);
        self.programs.set_active_parameters(stage, None);
    }

    pub fn is_gpu_program_bound(&self, stage: GpuProgramType) -> bool {
        self.programs.is_bound(stage)
    }

    /// Upload `params` for `stage` and keep them for pass iteration updates.
    pub fn bind_gpu_program_parameters(
        &mut self,
        stage: GpuProgramType,
        params: GpuProgramParameters,
        mask: GpuParamVariability,
    ) {
        self.backend.bind_gpu_program_parameters(stage, &params, mask);
        self.programs.set_active_parameters(stage, Some(params));
    }

    pub fn active_gpu_program_parameters(&self, stage: GpuProgramType) -> Option<&GpuProgramParameters> {
        self.programs.active_parameters(stage)
    }

    // ===== Pass iteration & depth bias =====

    /// Start a pass repeated `count` times.
    pub fn set_current_pass_iteration_count(&mut self, count: usize) {
        self.pass_iteration_count = count;
        self.pass_iteration_index = 0;
    }

    pub fn current_pass_iteration_count(&self) -> usize {
        self.pass_iteration_count
    }

    pub fn current_pass_iteration_index(&self) -> usize {
        self.pass_iteration_index
    }

    /// Enable or disable a depth bias of `base + multiplier * iteration`.
    pub fn set_derive_depth_bias(&mut self, enabled: bool, base: f32, multiplier: f32, slope_scale: f32) {
        self.derived_depth_bias = DerivedDepthBias {
            enabled,
            base,
            multiplier,
            slope_scale,
        };
    }

    pub fn derived_depth_bias(&self) -> DerivedDepthBias {
        self.derived_depth_bias
    }

    pub fn set_depth_bias(&mut self, constant_bias: f32, slope_scale_bias: f32) {
        self.backend.set_depth_bias(constant_bias, slope_scale_bias);
    }

    /// Prepare the next pass iteration.
    ///
    /// Applies the derived depth bias for the current iteration, then returns
    /// `false` once no further iteration remains. Otherwise advances the
    /// iteration and rebinds the pass-iteration constants of every stage.
    pub fn update_pass_iteration_render_state(&mut self) -> bool {
        if self.derived_depth_bias.enabled {
            let bias = self.derived_depth_bias.bias_for(self.pass_iteration_index);
            self.backend
                .set_depth_bias(bias, self.derived_depth_bias.slope_scale);
        }

        if self.pass_iteration_count <= 1 {
            return false;
        }
        self.pass_iteration_count -= 1;
        self.pass_iteration_index += 1;

        for stage in GpuProgramType::ALL {
            if let Some(params) = self.programs.active_parameters_mut(stage) {
                params.inc_pass_iteration_number();
                self.backend.bind_gpu_program_parameters(
                    stage,
                    params,
                    GpuParamVariability::PASS_ITERATION_NUMBER,
                );
            }
        }
        true
    }

    // ===== Texture units =====

    /// Apply every setting of one texture unit.
    pub fn set_texture_unit_settings(&mut self, unit: usize, settings: &TextureUnitSettings) -> RenderSystemResult<()> {
        let caps = &self.current_capabilities;
        let separate_vertex_units = caps.has_capability(Capability::VertexTextureFetch)
            && !caps.vertex_texture_units_shared();
        let max_anisotropy = (caps.max_supported_anisotropy() as u32).max(1);
        let mipmap_bias = caps.has_capability(Capability::MipmapLodBias);

        if separate_vertex_units {
            if settings.binding == TextureBindingType::Vertex {
                self.backend.set_vertex_texture(unit, settings.texture)?;
                self.backend.set_texture(unit, true, None)?;
            } else {
                self.backend.set_vertex_texture(unit, None)?;
                self.backend.set_texture(unit, true, settings.texture)?;
            }
        } else {
            self.backend.set_texture(unit, true, settings.texture)?;
        }

        self.backend
            .set_texture_unit_filtering(unit, settings.filtering);
        self.backend
            .set_texture_layer_anisotropy(unit, settings.anisotropy.clamp(1, max_anisotropy));
        if mipmap_bias {
            self.backend.set_texture_mipmap_bias(unit, settings.mipmap_bias);
        }
        self.backend
            .set_texture_addressing_mode(unit, settings.addressing);
        if settings.addressing.uses_border() {
            self.backend
                .set_texture_border_colour(unit, settings.border_colour);
        }
        Ok(())
    }

    pub fn disable_texture_unit(&mut self, unit: usize) -> RenderSystemResult<()> {
        self.backend.set_texture(unit, false, None)?;
        Ok(())
    }

    /// Disable units from `unit` up to the previous call's start.
    pub fn disable_texture_units_from(&mut self, unit: usize) -> RenderSystemResult<()> {
        let disable_to = usize::from(self.current_capabilities.num_texture_units())
            .min(self.disabled_tex_units_from);
        self.disabled_tex_units_from = unit;
        for i in unit..disable_to {
            self.disable_texture_unit(i)?;
        }
        Ok(())
    }

    // ===== Occlusion queries =====

    pub fn create_hardware_occlusion_query(&mut self) -> RenderSystemResult<OcclusionQueryId> {
        let query = self.backend.create_hardware_occlusion_query()?;
        self.occlusion_queries.push(query);
        Ok(query)
    }

    pub fn destroy_hardware_occlusion_query(&mut self, query: OcclusionQueryId) -> bool {
        let before = self.occlusion_queries.len();
        self.occlusion_queries.retain(|other| *other != query);
        if self.occlusion_queries.len() == before {
            return false;
        }
        self.backend.destroy_hardware_occlusion_query(query);
        true
    }

    pub fn occlusion_query_count(&self) -> usize {
        self.occlusion_queries.len()
    }

    // ===== Threads =====

    /// Open the window during which worker threads may register.
    pub fn pre_extra_threads_started(&mut self) {
        self.threads.open_window();
        self.backend.pre_extra_threads_started();
    }

    pub fn post_extra_threads_started(&mut self) {
        self.backend.post_extra_threads_started();
        self.threads.close_window();
    }

    /// Register the calling thread with the device.
    pub fn register_thread(&mut self) {
        let id = std::thread::current().id();
        if self.threads.register(id) {
            self.backend.register_thread();
        }
    }

    pub fn unregister_thread(&mut self) {
        let id = std::thread::current().id();
        if self.threads.unregister(id) {
            self.backend.unregister_thread();
        }
    }

    pub fn is_thread_registered(&self) -> bool {
        self.threads.is_registered(std::thread::current().id())
    }

    // ===== Events =====

    pub fn add_listener(&mut self, listener: EventListener) -> ListenerId {
        self.events.add(listener)
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.events.remove(id)
    }

    pub fn notify_device_lost(&mut self) {
        tracing::warn!("{}: device lost", self.backend.name());
        self.events.fire(&RenderSystemEvent::DeviceLost);
    }

    pub fn notify_device_restored(&mut self) {
        tracing::info!("{}: device restored", self.backend.name());
        self.events.fire(&RenderSystemEvent::DeviceRestored);
    }
}

fn invalid_target(id: RenderTargetId) -> RenderSystemError {
    RenderSystemError::InvalidHandle {
        reason: format!("render target {:?} is not attached", id),
    }
}

fn invalid_buffer(id: DepthBufferId) -> RenderSystemError {
    RenderSystemError::InvalidHandle {
        reason: format!("depth buffer {:?} is not pooled", id),
    }
}

impl<B: RenderBackend> std::fmt::Debug for RenderSystem<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderSystem")
            .field("backend", &self.backend.name())
            .field("state", &self.state)
            .field("targets", &self.targets.len())
            .field("depth_buffers", &self.depth_buffers.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_bias_sequence() {
        let bias = DerivedDepthBias {
            enabled: true,
            base: 0.0,
            multiplier: 0.5,
            slope_scale: 0.0,
        };
        let values: Vec<f32> = (0..3).map(|i| bias.bias_for(i)).collect();
        assert_eq!(values, vec![0.0, 0.5, 1.0]);
    }
}
