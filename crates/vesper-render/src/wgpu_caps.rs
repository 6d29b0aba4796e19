//! Capability probing for wgpu adapters.
//!
//! Translates what a wgpu adapter reports (features, limits and downlevel
//! flags) into a [`RenderSystemCapabilities`] so a wgpu-based backend can
//! implement [`RenderBackend::create_render_system_capabilities`].
//!
//! [`RenderBackend::create_render_system_capabilities`]: crate::RenderBackend::create_render_system_capabilities

use crate::capabilities::{
    Capability, DriverVersion, GpuVendor, ProgramConstantCounts, RenderSystemCapabilities,
};
use crate::gpu_program::GpuProgramType;

/// Name recorded as `render_system_name` in probed capabilities.
pub const WGPU_RENDER_SYSTEM_NAME: &str = "wgpu";

/// The adapter fields the probe needs, detached from a live adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterDescription {
    pub name: String,
    /// PCI vendor id.
    pub vendor: u32,
    pub driver: String,
    pub driver_info: String,
    pub backend: wgpu::Backend,
}

impl From<&wgpu::AdapterInfo> for AdapterDescription {
    fn from(info: &wgpu::AdapterInfo) -> Self {
        Self {
            name: info.name.clone(),
            vendor: info.vendor,
            driver: info.driver.clone(),
            driver_info: info.driver_info.clone(),
            backend: info.backend,
        }
    }
}

impl AdapterDescription {
    /// First dotted number found in the driver info, e.g. `"Mesa 23.1.2"` gives `23.1.2.0`.
    pub fn driver_version(&self) -> DriverVersion {
        self.driver_info
            .split_whitespace()
            .find(|token| token.starts_with(|c: char| c.is_ascii_digit()))
            .map(DriverVersion::from_string)
            .unwrap_or_default()
    }
}

/// Shader profiles a backend can consume besides WGSL.
fn native_shader_profile(backend: wgpu::Backend) -> Option<&'static str> {
    match backend {
        wgpu::Backend::Vulkan => Some("spirv"),
        wgpu::Backend::Gl => Some("glsl"),
        wgpu::Backend::Dx12 => Some("hlsl"),
        wgpu::Backend::Metal => Some("msl"),
        _ => None,
    }
}

fn clamp_u16(value: u32) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

/// Build capabilities from raw adapter data.
pub fn capabilities_from_wgpu(
    adapter: &AdapterDescription,
    features: wgpu::Features,
    limits: &wgpu::Limits,
    downlevel: wgpu::DownlevelFlags,
) -> RenderSystemCapabilities {
    let mut caps = RenderSystemCapabilities::new();
    caps.set_render_system_name(WGPU_RENDER_SYSTEM_NAME);
    caps.set_device_name(adapter.name.clone());
    caps.set_vendor(GpuVendor::from_pci_id(adapter.vendor));
    caps.set_driver_version(adapter.driver_version());

    // Guaranteed by every wgpu backend.
    for cap in [
        Capability::Blending,
        Capability::CubeMapping,
        Capability::HwStencil,
        Capability::Vbo,
        Capability::VertexProgram,
        Capability::FragmentProgram,
        Capability::ScissorTest,
        Capability::TwoSidedStencil,
        Capability::StencilWrap,
        Capability::HwOcclusion,
        Capability::VertexFormatUbyte4,
        Capability::InfiniteFarPlane,
        Capability::HwRenderToTexture,
        Capability::TextureFloat,
        Capability::Texture3d,
        Capability::VertexTextureFetch,
        Capability::AlphaToCoverage,
        Capability::AdvancedBlendOperations,
        Capability::MrtDifferentBitDepths,
        Capability::RttSeparateDepthBuffer,
        Capability::VertexBufferInstanceData,
        Capability::Texture1d,
        Capability::Texture2dArray,
        Capability::PrimitiveRestart,
        Capability::ReadBackAsTexture,
        Capability::HwOcclusionAsynchronous,
    ] {
        caps.set_capability(cap);
    }

    caps.set_capability_enabled(
        Capability::Anisotropy,
        downlevel.contains(wgpu::DownlevelFlags::ANISOTROPIC_FILTERING),
    );
    caps.set_capability_enabled(
        Capability::ComputeProgram,
        downlevel.contains(wgpu::DownlevelFlags::COMPUTE_SHADERS),
    );
    caps.set_capability(Capability::NonPowerOf2Textures);
    caps.set_non_pow2_textures_limited(
        !downlevel.contains(wgpu::DownlevelFlags::NON_POWER_OF_TWO_MIPMAPPED_TEXTURES),
    );
    caps.set_capability_enabled(
        Capability::DepthClamp,
        features.contains(wgpu::Features::DEPTH_CLIP_CONTROL),
    );

    let compression = [
        (wgpu::Features::TEXTURE_COMPRESSION_BC, Capability::TextureCompressionDxt),
        (wgpu::Features::TEXTURE_COMPRESSION_BC, Capability::TextureCompressionBc4Bc5),
        (wgpu::Features::TEXTURE_COMPRESSION_BC, Capability::TextureCompressionBc6hBc7),
        (wgpu::Features::TEXTURE_COMPRESSION_ETC2, Capability::TextureCompressionEtc2),
        (wgpu::Features::TEXTURE_COMPRESSION_ASTC, Capability::TextureCompressionAstc),
    ];
    for (feature, cap) in compression {
        if features.contains(feature) {
            caps.set_capability(Capability::TextureCompression);
            caps.set_capability(cap);
        }
    }

    let texture_units = clamp_u16(
        limits
            .max_sampled_textures_per_shader_stage
            .min(limits.max_samplers_per_shader_stage),
    );
    caps.set_num_texture_units(texture_units);
    caps.set_num_vertex_texture_units(texture_units);
    caps.set_vertex_texture_units_shared(true);
    caps.set_num_multi_render_targets(clamp_u16(limits.max_color_attachments));
    caps.set_num_vertex_attributes(clamp_u16(limits.max_vertex_attributes));
    caps.set_stencil_buffer_bit_depth(8);
    caps.set_max_point_size(1.0);
    caps.set_max_supported_anisotropy(if caps.has_capability(Capability::Anisotropy) {
        16.0
    } else {
        1.0
    });

    // One vec4 per constant register.
    let float_registers = clamp_u16(limits.max_uniform_buffer_binding_size / 16);
    let counts = ProgramConstantCounts {
        float: float_registers,
        int: float_registers,
        bool: 0,
    };
    caps.set_constant_counts(GpuProgramType::Vertex, counts);
    caps.set_constant_counts(GpuProgramType::Fragment, counts);
    if caps.has_capability(Capability::ComputeProgram) {
        caps.set_constant_counts(GpuProgramType::Compute, counts);
    }

    caps.add_shader_profile("wgsl");
    if let Some(profile) = native_shader_profile(adapter.backend) {
        caps.add_shader_profile(profile);
    }

    tracing::debug!(
        "Probed wgpu adapter '{}' ({:?}, {})",
        adapter.name,
        adapter.backend,
        caps.vendor()
    );
    caps
}

/// Probe a live adapter.
pub fn probe_adapter(adapter: &wgpu::Adapter) -> RenderSystemCapabilities {
    let info = adapter.get_info();
    capabilities_from_wgpu(
        &AdapterDescription::from(&info),
        adapter.features(),
        &adapter.limits(),
        adapter.get_downlevel_capabilities().flags,
    )
}
