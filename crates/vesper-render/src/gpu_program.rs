//! GPU programs and their capability gating.
//!
//! A [`GpuProgram`] describes a compiled shader and the hardware features it
//! leans on. Whether it is usable is decided against a
//! [`RenderSystemCapabilities`] handed in by the caller, so the check runs
//! the same with or without a live device.
//!
//! # Example
//!
//! ```ignore
//! let program = GpuProgram::new("skinning_vs", GpuProgramType::Vertex, "vs_3_0")
//!     .with_skeletal_animation(true);
//!
//! if !program.is_supported(render_system.capabilities()) {
//!     // fall back to software skinning
//! }
//! ```

use ahash::AHashMap;
use bitflags::bitflags;

use crate::capabilities::{Capability, RenderSystemCapabilities};

/// Pipeline stage a program runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GpuProgramType {
    Vertex,
    Fragment,
    Geometry,
    Domain,
    Hull,
    Compute,
}

impl GpuProgramType {
    pub const COUNT: usize = 6;

    pub const ALL: [GpuProgramType; Self::COUNT] = [
        GpuProgramType::Vertex,
        GpuProgramType::Fragment,
        GpuProgramType::Geometry,
        GpuProgramType::Domain,
        GpuProgramType::Hull,
        GpuProgramType::Compute,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Prefix used by per-stage keywords such as `vertex_program_constant_float_count`.
    pub const fn keyword_prefix(self) -> &'static str {
        match self {
            GpuProgramType::Vertex => "vertex",
            GpuProgramType::Fragment => "fragment",
            GpuProgramType::Geometry => "geometry",
            GpuProgramType::Domain => "tessellation_domain",
            GpuProgramType::Hull => "tessellation_hull",
            GpuProgramType::Compute => "compute",
        }
    }

    /// The capability a stage needs before any program can run on it.
    pub const fn required_capability(self) -> Option<Capability> {
        match self {
            GpuProgramType::Vertex | GpuProgramType::Fragment => None,
            GpuProgramType::Geometry => Some(Capability::GeometryProgram),
            GpuProgramType::Domain => Some(Capability::TessellationDomainProgram),
            GpuProgramType::Hull => Some(Capability::TessellationHullProgram),
            GpuProgramType::Compute => Some(Capability::ComputeProgram),
        }
    }
}

impl std::fmt::Display for GpuProgramType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword_prefix())
    }
}

bitflags! {
    /// Which groups of shader constants need re-binding.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct GpuParamVariability: u16 {
        /// Constants that never change within a frame
        const GLOBAL = 1;
        /// Constants that change per renderable
        const PER_OBJECT = 2;
        /// Light-dependent constants
        const LIGHTS = 4;
        /// The pass iteration counter
        const PASS_ITERATION_NUMBER = 8;
        const ALL = 0xFFFF;
    }
}

/// A compiled program and the features it depends on.
#[derive(Debug, Clone)]
pub struct GpuProgram {
    name: String,
    program_type: GpuProgramType,
    syntax_code: String,
    skeletal_animation: bool,
    morph_animation: bool,
    pose_animation: u16,
    vertex_texture_fetch: bool,
    adjacency_info_required: bool,
    compile_error: bool,
}

impl GpuProgram {
    pub fn new(
        name: impl Into<String>,
        program_type: GpuProgramType,
        syntax_code: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            program_type,
            syntax_code: syntax_code.into(),
            skeletal_animation: false,
            morph_animation: false,
            pose_animation: 0,
            vertex_texture_fetch: false,
            adjacency_info_required: false,
            compile_error: false,
        }
    }

    pub fn with_skeletal_animation(mut self, included: bool) -> Self {
        self.skeletal_animation = included;
        self
    }

    pub fn with_morph_animation(mut self, included: bool) -> Self {
        self.morph_animation = included;
        self
    }

    pub fn with_pose_animation(mut self, pose_count: u16) -> Self {
        self.pose_animation = pose_count;
        self
    }

    pub fn with_vertex_texture_fetch(mut self, required: bool) -> Self {
        self.vertex_texture_fetch = required;
        self
    }

    pub fn with_adjacency_info(mut self, required: bool) -> Self {
        self.adjacency_info_required = required;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn program_type(&self) -> GpuProgramType {
        self.program_type
    }

    pub fn syntax_code(&self) -> &str {
        &self.syntax_code
    }

    pub fn is_skeletal_animation_included(&self) -> bool {
        self.skeletal_animation
    }

    pub fn is_morph_animation_included(&self) -> bool {
        self.morph_animation
    }

    pub fn is_pose_animation_included(&self) -> bool {
        self.pose_animation > 0
    }

    pub fn number_of_poses_supported(&self) -> u16 {
        self.pose_animation
    }

    pub fn is_vertex_texture_fetch_required(&self) -> bool {
        self.vertex_texture_fetch
    }

    pub fn is_adjacency_info_required(&self) -> bool {
        self.adjacency_info_required
    }

    pub fn has_compile_error(&self) -> bool {
        self.compile_error
    }

    /// Record the outcome of compiling the program source.
    pub fn set_compile_error(&mut self, failed: bool) {
        if failed {
            tracing::warn!(
                "GPU program {} failed to compile and is not supported",
                self.name
            );
        }
        self.compile_error = failed;
    }

    /// Hardware features this program needs, independent of its syntax.
    pub fn required_capabilities(&self) -> Vec<Capability> {
        let mut required: Vec<Capability> = self.program_type.required_capability().into_iter().collect();
        if self.skeletal_animation {
            required.push(Capability::VertexFormatUbyte4);
        }
        if self.vertex_texture_fetch {
            required.push(Capability::VertexTextureFetch);
        }
        required
    }

    pub fn is_required_capabilities_supported(&self, caps: &RenderSystemCapabilities) -> bool {
        self.required_capabilities()
            .into_iter()
            .all(|cap| caps.has_capability(cap))
    }

    /// Whether the program can be used at all on this hardware.
    ///
    /// A `false` here is a fallback signal, not an error.
    pub fn is_supported(&self, caps: &RenderSystemCapabilities) -> bool {
        if self.compile_error || !self.is_required_capabilities_supported(caps) {
            return false;
        }
        caps.is_shader_profile_supported(&self.syntax_code)
    }
}

// ===== Parameters =====

#[derive(Debug, Clone, PartialEq)]
struct NamedConstant {
    values: Vec<f32>,
    variability: GpuParamVariability,
}

/// Constant values bound alongside a program.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GpuProgramParameters {
    constants: AHashMap<String, NamedConstant>,
    pass_iteration_number: Option<f32>,
}

impl GpuProgramParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_named_constant(
        &mut self,
        name: impl Into<String>,
        values: &[f32],
        variability: GpuParamVariability,
    ) {
        self.constants.insert(
            name.into(),
            NamedConstant {
                values: values.to_vec(),
                variability,
            },
        );
    }

    pub fn named_constant(&self, name: &str) -> Option<&[f32]> {
        self.constants.get(name).map(|c| c.values.as_slice())
    }

    /// Names of the constants a bind with `mask` must upload, sorted.
    pub fn constants_for(&self, mask: GpuParamVariability) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .constants
            .iter()
            .filter(|(_, c)| c.variability.intersects(mask))
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// Track the pass iteration counter, starting from zero.
    pub fn enable_pass_iteration_number(&mut self) {
        self.pass_iteration_number = Some(0.0);
    }

    pub fn pass_iteration_number(&self) -> Option<f32> {
        self.pass_iteration_number
    }

    /// Advance the pass iteration counter; a no-op when it is not tracked.
    pub fn inc_pass_iteration_number(&mut self) {
        if let Some(n) = self.pass_iteration_number.as_mut() {
            *n += 1.0;
        }
    }
}
