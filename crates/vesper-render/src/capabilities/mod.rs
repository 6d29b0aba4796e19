//! Hardware/API capability model.
//!
//! [`RenderSystemCapabilities`] is the fact sheet a backend fills in once
//! during initialisation. Everything above the backend gates on it: program
//! support, texture unit setup, depth buffer sharing and so on.
//!
//! # Example
//!
//! ```ignore
//! let mut caps = RenderSystemCapabilities::new();
//! caps.set_render_system_name("wgpu");
//! caps.set_capability(Capability::HwOcclusion);
//! caps.add_shader_profile("wgsl");
//!
//! assert!(caps.has_capability(Capability::HwOcclusion));
//! ```

mod driver;
mod flags;

use std::collections::BTreeSet;

pub use driver::{DriverVersion, GpuVendor};
pub use flags::{
    CAPS_BITSHIFT, CAPS_CATEGORY_MASK, CAPS_CATEGORY_SIZE, CapabilitiesCategory, Capability,
    caps_value,
};

use crate::gpu_program::GpuProgramType;

/// Constant register counts for one program stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgramConstantCounts {
    pub float: u16,
    pub int: u16,
    pub bool: u16,
}

/// What the active hardware, driver and API combination supports.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSystemCapabilities {
    capabilities: [u32; CapabilitiesCategory::COUNT],
    category_relevant: [bool; CapabilitiesCategory::COUNT],

    vendor: GpuVendor,
    driver_version: DriverVersion,
    device_name: String,
    render_system_name: String,

    constant_counts: [ProgramConstantCounts; GpuProgramType::COUNT],
    num_world_matrices: u16,
    num_texture_units: u16,
    num_vertex_texture_units: u16,
    vertex_texture_units_shared: bool,
    stencil_buffer_bit_depth: u16,
    num_vertex_blend_matrices: u16,
    num_multi_render_targets: u16,
    num_vertex_attributes: u16,
    max_point_size: f32,
    max_supported_anisotropy: f32,
    non_pow2_textures_limited: bool,
    geometry_program_num_output_vertices: i32,

    shader_profiles: BTreeSet<String>,
}

impl Default for RenderSystemCapabilities {
    fn default() -> Self {
        let mut category_relevant = [false; CapabilitiesCategory::COUNT];
        for category in CapabilitiesCategory::ALL {
            category_relevant[category.index()] = !category.is_render_system_specific();
        }

        Self {
            capabilities: [0; CapabilitiesCategory::COUNT],
            category_relevant,
            vendor: GpuVendor::Unknown,
            driver_version: DriverVersion::default(),
            device_name: String::new(),
            render_system_name: String::new(),
            constant_counts: [ProgramConstantCounts::default(); GpuProgramType::COUNT],
            num_world_matrices: 0,
            num_texture_units: 0,
            num_vertex_texture_units: 0,
            vertex_texture_units_shared: false,
            stencil_buffer_bit_depth: 0,
            num_vertex_blend_matrices: 0,
            num_multi_render_targets: 1,
            num_vertex_attributes: 1,
            max_point_size: 0.0,
            max_supported_anisotropy: 0.0,
            non_pow2_textures_limited: false,
            geometry_program_num_output_vertices: 0,
            shader_profiles: BTreeSet::new(),
        }
    }
}

impl RenderSystemCapabilities {
    pub fn new() -> Self {
        Self::default()
    }

    // ===== Flags =====

    pub fn set_capability(&mut self, cap: Capability) {
        self.capabilities[cap.category_index()] |= cap.mask();
    }

    pub fn unset_capability(&mut self, cap: Capability) {
        self.capabilities[cap.category_index()] &= !cap.mask();
    }

    /// Set or clear a flag from a boolean.
    pub fn set_capability_enabled(&mut self, cap: Capability, enabled: bool) {
        if enabled {
            self.set_capability(cap);
        } else {
            self.unset_capability(cap);
        }
    }

    pub fn has_capability(&self, cap: Capability) -> bool {
        self.capabilities[cap.category_index()] & cap.mask() != 0
    }

    pub fn is_capability_render_system_specific(&self, cap: Capability) -> bool {
        cap.category().is_render_system_specific()
    }

    pub fn set_category_relevant(&mut self, category: CapabilitiesCategory, relevant: bool) {
        self.category_relevant[category.index()] = relevant;
    }

    pub fn is_category_relevant(&self, category: CapabilitiesCategory) -> bool {
        self.category_relevant[category.index()]
    }

    /// Every flag currently set, in declaration order.
    pub fn enabled_capabilities(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL
            .iter()
            .copied()
            .filter(|cap| self.has_capability(*cap))
    }

    // ===== Shader profiles =====

    pub fn add_shader_profile(&mut self, profile: impl Into<String>) {
        self.shader_profiles.insert(profile.into());
    }

    pub fn remove_shader_profile(&mut self, profile: &str) {
        self.shader_profiles.remove(profile);
    }

    pub fn is_shader_profile_supported(&self, profile: &str) -> bool {
        self.shader_profiles.contains(profile)
    }

    pub fn supported_shader_profiles(&self) -> impl Iterator<Item = &str> {
        self.shader_profiles.iter().map(String::as_str)
    }

    // ===== Identity =====

    pub fn vendor(&self) -> GpuVendor {
        self.vendor
    }

    pub fn set_vendor(&mut self, vendor: GpuVendor) {
        self.vendor = vendor;
    }

    pub fn parse_vendor_from_string(&mut self, vendor: &str) {
        self.vendor = GpuVendor::from_vendor_str(vendor);
    }

    pub fn vendor_from_string(vendor: &str) -> GpuVendor {
        GpuVendor::from_vendor_str(vendor)
    }

    pub fn vendor_to_string(vendor: GpuVendor) -> &'static str {
        vendor.as_str()
    }

    pub fn driver_version(&self) -> DriverVersion {
        self.driver_version
    }

    pub fn set_driver_version(&mut self, version: DriverVersion) {
        self.driver_version = version;
    }

    pub fn parse_driver_version_from_string(&mut self, version: &str) {
        self.driver_version = DriverVersion::from_string(version);
    }

    /// Strictly older than `version`; equal is not older.
    pub fn is_driver_older_than_version(&self, version: DriverVersion) -> bool {
        self.driver_version.is_older_than(&version)
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn set_device_name(&mut self, name: impl Into<String>) {
        self.device_name = name.into();
    }

    pub fn render_system_name(&self) -> &str {
        &self.render_system_name
    }

    pub fn set_render_system_name(&mut self, name: impl Into<String>) {
        self.render_system_name = name.into();
    }

    // ===== Limits =====

    pub fn constant_counts(&self, stage: GpuProgramType) -> ProgramConstantCounts {
        self.constant_counts[stage.index()]
    }

    pub fn set_constant_counts(&mut self, stage: GpuProgramType, counts: ProgramConstantCounts) {
        self.constant_counts[stage.index()] = counts;
    }

    pub fn constant_float_count(&self, stage: GpuProgramType) -> u16 {
        self.constant_counts[stage.index()].float
    }

    pub fn set_constant_float_count(&mut self, stage: GpuProgramType, count: u16) {
        self.constant_counts[stage.index()].float = count;
    }

    pub fn constant_int_count(&self, stage: GpuProgramType) -> u16 {
        self.constant_counts[stage.index()].int
    }

    pub fn set_constant_int_count(&mut self, stage: GpuProgramType, count: u16) {
        self.constant_counts[stage.index()].int = count;
    }

    pub fn constant_bool_count(&self, stage: GpuProgramType) -> u16 {
        self.constant_counts[stage.index()].bool
    }

    pub fn set_constant_bool_count(&mut self, stage: GpuProgramType, count: u16) {
        self.constant_counts[stage.index()].bool = count;
    }

    pub fn num_world_matrices(&self) -> u16 {
        self.num_world_matrices
    }

    pub fn set_num_world_matrices(&mut self, num: u16) {
        self.num_world_matrices = num;
    }

    /// Texture units available for multitexturing in one pass.
    pub fn num_texture_units(&self) -> u16 {
        self.num_texture_units
    }

    pub fn set_num_texture_units(&mut self, num: u16) {
        self.num_texture_units = num;
    }

    pub fn num_vertex_texture_units(&self) -> u16 {
        self.num_vertex_texture_units
    }

    pub fn set_num_vertex_texture_units(&mut self, num: u16) {
        self.num_vertex_texture_units = num;
    }

    /// Whether vertex and fragment stages sample through the same units.
    pub fn vertex_texture_units_shared(&self) -> bool {
        self.vertex_texture_units_shared
    }

    pub fn set_vertex_texture_units_shared(&mut self, shared: bool) {
        self.vertex_texture_units_shared = shared;
    }

    pub fn stencil_buffer_bit_depth(&self) -> u16 {
        self.stencil_buffer_bit_depth
    }

    pub fn set_stencil_buffer_bit_depth(&mut self, depth: u16) {
        self.stencil_buffer_bit_depth = depth;
    }

    pub fn num_vertex_blend_matrices(&self) -> u16 {
        self.num_vertex_blend_matrices
    }

    pub fn set_num_vertex_blend_matrices(&mut self, num: u16) {
        self.num_vertex_blend_matrices = num;
    }

    pub fn num_multi_render_targets(&self) -> u16 {
        self.num_multi_render_targets
    }

    pub fn set_num_multi_render_targets(&mut self, num: u16) {
        self.num_multi_render_targets = num;
    }

    pub fn num_vertex_attributes(&self) -> u16 {
        self.num_vertex_attributes
    }

    pub fn set_num_vertex_attributes(&mut self, num: u16) {
        self.num_vertex_attributes = num;
    }

    pub fn max_point_size(&self) -> f32 {
        self.max_point_size
    }

    pub fn set_max_point_size(&mut self, size: f32) {
        self.max_point_size = size;
    }

    pub fn max_supported_anisotropy(&self) -> f32 {
        self.max_supported_anisotropy
    }

    pub fn set_max_supported_anisotropy(&mut self, anisotropy: f32) {
        self.max_supported_anisotropy = anisotropy;
    }

    /// Non power-of-two textures work, but without mipmaps or wrap addressing.
    pub fn non_pow2_textures_limited(&self) -> bool {
        self.non_pow2_textures_limited
    }

    pub fn set_non_pow2_textures_limited(&mut self, limited: bool) {
        self.non_pow2_textures_limited = limited;
    }

    pub fn geometry_program_num_output_vertices(&self) -> i32 {
        self.geometry_program_num_output_vertices
    }

    pub fn set_geometry_program_num_output_vertices(&mut self, num: i32) {
        self.geometry_program_num_output_vertices = num;
    }

    // ===== Diagnostics =====

    /// Human-readable dump of every relevant category and all limits.
    pub fn report(&self) -> Vec<String> {
        let yes_no = |b: bool| if b { "yes" } else { "no" };
        let mut lines = vec![
            "RenderSystem capabilities".to_string(),
            "-------------------------".to_string(),
            format!("RenderSystem Name: {}", self.render_system_name),
            format!("GPU Vendor: {}", self.vendor),
            format!("Device Name: {}", self.device_name),
            format!("Driver Version: {}", self.driver_version),
        ];

        for category in CapabilitiesCategory::ALL {
            if !self.is_category_relevant(category) {
                continue;
            }
            lines.push(format!(" [{}]", category.name()));
            for cap in Capability::in_category(category) {
                lines.push(format!("   * {}: {}", cap.name(), yes_no(self.has_capability(cap))));
            }
        }

        let profiles: Vec<&str> = self.supported_shader_profiles().collect();
        lines.push(format!(" * Supported Shader Profiles: {}", profiles.join(" ")));

        for stage in GpuProgramType::ALL {
            let counts = self.constant_counts(stage);
            if counts == ProgramConstantCounts::default() {
                continue;
            }
            lines.push(format!(
                " * {} program constants: float {}, int {}, bool {}",
                stage, counts.float, counts.int, counts.bool
            ));
        }

        lines.extend([
            format!(" * Texture units: {}", self.num_texture_units),
            format!(" * Vertex texture units: {}", self.num_vertex_texture_units),
            format!(
                " * Vertex texture units shared: {}",
                yes_no(self.vertex_texture_units_shared)
            ),
            format!(" * Max anisotropy: {}", self.max_supported_anisotropy),
            format!(" * World matrices: {}", self.num_world_matrices),
            format!(" * Vertex blend matrices: {}", self.num_vertex_blend_matrices),
            format!(" * Stencil buffer depth: {}", self.stencil_buffer_bit_depth),
            format!(" * Multiple render targets: {}", self.num_multi_render_targets),
            format!(" * Vertex attributes: {}", self.num_vertex_attributes),
            format!(" * Max point size: {}", self.max_point_size),
            format!(
                " * Non-POW2 textures limited: {}",
                yes_no(self.non_pow2_textures_limited)
            ),
            format!(
                " * Geometry program output vertices: {}",
                self.geometry_program_num_output_vertices
            ),
        ]);
        lines
    }

    /// Write [`report`](Self::report) to the `info` log.
    pub fn log(&self) {
        for line in self.report() {
            tracing::info!("{}", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_round_trip() {
        let mut caps = RenderSystemCapabilities::new();
        for cap in Capability::ALL {
            caps.set_capability(*cap);
            assert!(caps.has_capability(*cap), "{cap}");
            caps.unset_capability(*cap);
            assert!(!caps.has_capability(*cap), "{cap}");
        }
    }

    #[test]
    fn test_categories_do_not_bleed() {
        for set in Capability::ALL {
            let mut caps = RenderSystemCapabilities::new();
            caps.set_capability(*set);
            for other in Capability::ALL {
                if other.category() != set.category() {
                    assert!(
                        !caps.has_capability(*other),
                        "setting {set} leaked into {other}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_same_bit_different_category() {
        // Both use bit 0 of their category word.
        let mut caps = RenderSystemCapabilities::new();
        caps.set_capability(Capability::AutoMipmap);
        assert!(!caps.has_capability(Capability::TextureCompression));
        assert!(!caps.has_capability(Capability::TextureCompressionAstc));
        assert!(!caps.has_capability(Capability::PerStageConstant));
    }

    #[test]
    fn test_render_system_specific() {
        let caps = RenderSystemCapabilities::new();
        assert!(caps.is_capability_render_system_specific(Capability::Fbo));
        assert!(caps.is_capability_render_system_specific(Capability::PerStageConstant));
        assert!(!caps.is_capability_render_system_specific(Capability::HwOcclusion));
        assert!(!caps.is_capability_render_system_specific(Capability::DepthClamp));
    }

    #[test]
    fn test_shader_profiles() {
        let mut caps = RenderSystemCapabilities::new();
        caps.add_shader_profile("vs_1");
        caps.add_shader_profile("ps_1_4");
        caps.add_shader_profile("arbvp1");

        assert!(caps.is_shader_profile_supported("vs_1"));
        assert!(caps.is_shader_profile_supported("ps_1_4"));
        assert!(caps.is_shader_profile_supported("arbvp1"));
        assert!(!caps.is_shader_profile_supported("vs_2"));

        caps.remove_shader_profile("ps_1_4");
        assert!(!caps.is_shader_profile_supported("ps_1_4"));
        assert_eq!(caps.supported_shader_profiles().count(), 2);
    }

    #[test]
    fn test_driver_version_check() {
        let mut caps = RenderSystemCapabilities::new();
        caps.parse_driver_version_from_string("8.0.12");
        assert!(caps.is_driver_older_than_version(DriverVersion::new(8, 1, 0, 0)));
        assert!(!caps.is_driver_older_than_version(DriverVersion::new(8, 0, 12, 0)));
    }

    #[test]
    fn test_default_relevance() {
        let caps = RenderSystemCapabilities::new();
        assert!(caps.is_category_relevant(CapabilitiesCategory::Common));
        assert!(caps.is_category_relevant(CapabilitiesCategory::Common3));
        assert!(!caps.is_category_relevant(CapabilitiesCategory::Gl));
    }

    #[test]
    fn test_report_skips_irrelevant_categories() {
        let mut caps = RenderSystemCapabilities::new();
        caps.set_capability(Capability::Fbo);
        caps.set_capability(Capability::HwOcclusion);

        let report = caps.report();
        assert!(report.iter().any(|l| l.contains("hwocclusion: yes")));
        assert!(!report.iter().any(|l| l.contains("fbo:")));

        caps.set_category_relevant(CapabilitiesCategory::Gl, true);
        assert!(caps.report().iter().any(|l| l.contains("fbo: yes")));
    }

    #[test]
    fn test_per_stage_constant_counts() {
        let mut caps = RenderSystemCapabilities::new();
        caps.set_constant_float_count(GpuProgramType::Vertex, 256);
        caps.set_constant_int_count(GpuProgramType::Fragment, 16);
        assert_eq!(caps.constant_float_count(GpuProgramType::Vertex), 256);
        assert_eq!(caps.constant_float_count(GpuProgramType::Fragment), 0);
        assert_eq!(caps.constant_int_count(GpuProgramType::Fragment), 16);
    }
}
