//! Capability flags and their category-packed encoding.
//!
//! Every flag is a `u32` whose top [`CAPS_CATEGORY_SIZE`] bits hold the
//! category index and whose low bits hold a single set bit. Storage indexes a
//! per-category word array with the high bits and tests against the low bits,
//! so no lookup table sits between a flag and its storage slot.
//!
//! Descriptor files refer to flags by [`Capability::name`], never by value.

use static_assertions::const_assert;

/// Number of high bits reserved for the category index.
pub const CAPS_CATEGORY_SIZE: u32 = 4;
/// Shift that moves a category index into the high bits.
pub const CAPS_BITSHIFT: u32 = 32 - CAPS_CATEGORY_SIZE;
/// Mask selecting the category bits of an encoded flag.
pub const CAPS_CATEGORY_MASK: u32 = ((1 << CAPS_CATEGORY_SIZE) - 1) << CAPS_BITSHIFT;

/// Grouping of capability flags.
///
/// The `Common*` groups are shared by every backend; `D3d9` and `Gl` carry
/// backend-proprietary flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u32)]
pub enum CapabilitiesCategory {
    Common = 0,
    Common2 = 1,
    Common3 = 2,
    D3d9 = 3,
    Gl = 4,
}

impl CapabilitiesCategory {
    pub const COUNT: usize = 5;

    pub const ALL: [CapabilitiesCategory; Self::COUNT] = [
        CapabilitiesCategory::Common,
        CapabilitiesCategory::Common2,
        CapabilitiesCategory::Common3,
        CapabilitiesCategory::D3d9,
        CapabilitiesCategory::Gl,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// True for categories that only one backend family ever populates.
    pub const fn is_render_system_specific(self) -> bool {
        matches!(self, CapabilitiesCategory::D3d9 | CapabilitiesCategory::Gl)
    }

    pub const fn name(self) -> &'static str {
        match self {
            CapabilitiesCategory::Common => "common",
            CapabilitiesCategory::Common2 => "common_2",
            CapabilitiesCategory::Common3 => "common_3",
            CapabilitiesCategory::D3d9 => "d3d9",
            CapabilitiesCategory::Gl => "gl",
        }
    }
}

const_assert!(CapabilitiesCategory::COUNT <= 1 << CAPS_CATEGORY_SIZE);

/// Encode `(category, bit)` into a flag value.
///
/// Evaluated at compile time for every [`Capability`] discriminant, so an
/// out-of-range bit fails the build rather than aliasing the category bits.
pub const fn caps_value(category: CapabilitiesCategory, bit: u32) -> u32 {
    assert!(bit < CAPS_BITSHIFT, "capability bit index must be below 28");
    ((category as u32) << CAPS_BITSHIFT) | (1 << bit)
}

macro_rules! capabilities {
    ($( $(#[$meta:meta])* $variant:ident = ($category:ident, $bit:literal, $name:literal), )*) => {
        /// A named hardware/API feature.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u32)]
        pub enum Capability {
            $( $(#[$meta])* $variant = caps_value(CapabilitiesCategory::$category, $bit), )*
        }

        impl Capability {
            /// Every flag, in declaration order.
            pub const ALL: &'static [Capability] = &[$(Capability::$variant,)*];

            /// Stable keyword used in `.rendercaps` files and diagnostics.
            pub const fn name(self) -> &'static str {
                match self {
                    $(Capability::$variant => $name,)*
                }
            }
        }
    };
}

capabilities! {
    // ===== Common =====
    /// Hardware mipmap generation
    AutoMipmap = (Common, 0, "automipmap"),
    Blending = (Common, 1, "blending"),
    /// Anisotropic texture filtering
    Anisotropy = (Common, 2, "anisotropy"),
    /// Dot3 texture blending
    Dot3 = (Common, 3, "dot3"),
    CubeMapping = (Common, 4, "cubemapping"),
    /// Hardware stencil buffer
    HwStencil = (Common, 5, "hwstencil"),
    /// Hardware vertex and index buffers
    Vbo = (Common, 7, "vbo"),
    VertexProgram = (Common, 9, "vertex_program"),
    FragmentProgram = (Common, 10, "fragment_program"),
    ScissorTest = (Common, 11, "scissor_test"),
    TwoSidedStencil = (Common, 12, "two_sided_stencil"),
    StencilWrap = (Common, 13, "stencil_wrap"),
    /// Hardware occlusion queries
    HwOcclusion = (Common, 14, "hwocclusion"),
    UserClipPlanes = (Common, 15, "user_clip_planes"),
    /// UBYTE4 vertex element type, needed for hardware skinning indices
    VertexFormatUbyte4 = (Common, 16, "vertex_format_ubyte4"),
    InfiniteFarPlane = (Common, 17, "infinite_far_plane"),
    HwRenderToTexture = (Common, 18, "hwrender_to_texture"),
    TextureFloat = (Common, 19, "texture_float"),
    NonPowerOf2Textures = (Common, 20, "non_power_of_2_textures"),
    Texture3d = (Common, 21, "texture_3d"),
    PointSprites = (Common, 22, "point_sprites"),
    /// Point size min/max and attenuation
    PointExtendedParameters = (Common, 23, "point_extended_parameters"),
    VertexTextureFetch = (Common, 24, "vertex_texture_fetch"),
    MipmapLodBias = (Common, 25, "mipmap_lod_bias"),
    GeometryProgram = (Common, 26, "geometry_program"),
    HwRenderToVertexBuffer = (Common, 27, "hwrender_to_vertex_buffer"),

    // ===== Common2 =====
    TextureCompression = (Common2, 0, "texture_compression"),
    /// DXT/S3TC block compression
    TextureCompressionDxt = (Common2, 1, "texture_compression_dxt"),
    TextureCompressionVtc = (Common2, 2, "texture_compression_vtc"),
    TextureCompressionPvrtc = (Common2, 3, "texture_compression_pvrtc"),
    TextureCompressionAtc = (Common2, 4, "texture_compression_atc"),
    TextureCompressionEtc1 = (Common2, 5, "texture_compression_etc1"),
    TextureCompressionEtc2 = (Common2, 6, "texture_compression_etc2"),
    TextureCompressionBc4Bc5 = (Common2, 7, "texture_compression_bc4_bc5"),
    TextureCompressionBc6hBc7 = (Common2, 8, "texture_compression_bc6h_bc7"),
    FixedFunction = (Common2, 9, "fixed_function"),
    /// Multiple render targets with differing bit depths
    MrtDifferentBitDepths = (Common2, 10, "mrt_different_bit_depths"),
    AlphaToCoverage = (Common2, 11, "alpha_to_coverage"),
    /// Blend operations other than add
    AdvancedBlendOperations = (Common2, 12, "advanced_blend_operations"),
    /// Render textures can own a depth buffer separate from the window's
    RttSeparateDepthBuffer = (Common2, 13, "rtt_separate_depthbuffer"),
    RttMainDepthBufferAttachable = (Common2, 14, "rtt_main_depthbuffer_attachable"),
    /// Depth buffers larger than the target may be attached
    RttDepthBufferResolutionLessEqual = (Common2, 15, "rtt_depthbuffer_resolution_lessequal"),
    VertexBufferInstanceData = (Common2, 16, "vertex_buffer_instance_data"),
    CanGetCompiledShaderBuffer = (Common2, 17, "can_get_compiled_shader_buffer"),
    ShaderSubroutine = (Common2, 18, "shader_subroutine"),
    HwRenderToTexture3d = (Common2, 19, "hwrender_to_texture_3d"),
    Texture1d = (Common2, 20, "texture_1d"),
    TessellationHullProgram = (Common2, 21, "tessellation_hull_program"),
    TessellationDomainProgram = (Common2, 22, "tessellation_domain_program"),
    ComputeProgram = (Common2, 23, "compute_program"),
    HwOcclusionAsynchronous = (Common2, 24, "hwocclusion_asynchronous"),
    AtomicCounters = (Common2, 25, "atomic_counters"),

    // ===== Common3 =====
    TextureCompressionAstc = (Common3, 0, "texture_compression_astc"),
    DepthClamp = (Common3, 1, "depth_clamp"),
    PrimitiveRestart = (Common3, 2, "primitive_restart"),
    ReadBackAsTexture = (Common3, 3, "read_back_as_texture"),
    WideLines = (Common3, 4, "wide_lines"),
    Texture2dArray = (Common3, 5, "texture_2d_array"),

    // ===== D3D9 =====
    /// Per-stage constant registers
    PerStageConstant = (D3d9, 0, "perstageconstant"),

    // ===== GL =====
    Gl15NoVbo = (Gl, 1, "gl1_5_novbo"),
    /// Frame buffer objects
    Fbo = (Gl, 2, "fbo"),
    FboArb = (Gl, 3, "fbo_arb"),
    FboAti = (Gl, 4, "fbo_ati"),
    PBuffer = (Gl, 5, "pbuffer"),
    /// GL 1.5 without the hardware occlusion workaround
    Gl15NoHwOcclusion = (Gl, 6, "gl1_5_nohwocclusion"),
    PointExtendedParametersArb = (Gl, 7, "point_extended_parameters_arb"),
    PointExtendedParametersExt = (Gl, 8, "point_extended_parameters_ext"),
    SeparateShaderObjects = (Gl, 9, "separate_shader_objects"),
    /// Vertex array objects
    Vao = (Gl, 10, "vao"),
}

impl Capability {
    /// The raw encoded value, category bits included.
    pub const fn bits(self) -> u32 {
        self as u32
    }

    /// The low bits identifying the flag within its category.
    pub const fn mask(self) -> u32 {
        self.bits() & !CAPS_CATEGORY_MASK
    }

    pub const fn category_index(self) -> usize {
        ((self.bits() & CAPS_CATEGORY_MASK) >> CAPS_BITSHIFT) as usize
    }

    pub fn category(self) -> CapabilitiesCategory {
        // Discriminants are built by `caps_value`, so the index is always in range.
        CapabilitiesCategory::from_index(self.category_index()).unwrap_or(CapabilitiesCategory::Common)
    }

    /// Look a flag up by its descriptor keyword.
    ///
    /// The legacy `glew1_5_*` spellings are accepted as aliases.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "glew1_5_novbo" => return Some(Capability::Gl15NoVbo),
            "glew1_5_nohwocclusion" => return Some(Capability::Gl15NoHwOcclusion),
            _ => {}
        }
        Self::ALL.iter().copied().find(|cap| cap.name() == name)
    }

    pub fn in_category(category: CapabilitiesCategory) -> impl Iterator<Item = Capability> {
        Self::ALL
            .iter()
            .copied()
            .filter(move |cap| cap.category() == category)
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_encoding_layout() {
        assert_eq!(Capability::AutoMipmap.bits(), 1);
        assert_eq!(Capability::HwOcclusion.mask(), 1 << 14);
        assert_eq!(
            Capability::TextureCompression.bits(),
            (1 << CAPS_BITSHIFT) | 1
        );
        assert_eq!(Capability::Vao.category(), CapabilitiesCategory::Gl);
        assert_eq!(Capability::PerStageConstant.category(), CapabilitiesCategory::D3d9);
    }

    #[test]
    fn test_every_flag_has_one_low_bit() {
        for cap in Capability::ALL {
            assert_eq!(cap.mask().count_ones(), 1, "{cap}");
            assert!(cap.mask() < (1 << CAPS_BITSHIFT));
        }
    }

    #[test]
    fn test_names_unique_and_resolvable() {
        let mut seen = HashSet::new();
        for cap in Capability::ALL {
            assert!(seen.insert(cap.name()), "duplicate name {}", cap.name());
            assert_eq!(Capability::from_name(cap.name()), Some(*cap));
        }
        assert_eq!(Capability::from_name("no_such_thing"), None);
    }

    #[test]
    fn test_legacy_aliases() {
        assert_eq!(Capability::from_name("glew1_5_novbo"), Some(Capability::Gl15NoVbo));
        assert_eq!(
            Capability::from_name("glew1_5_nohwocclusion"),
            Some(Capability::Gl15NoHwOcclusion)
        );
    }

    #[test]
    fn test_render_system_specific_categories() {
        let specific: Vec<_> = CapabilitiesCategory::ALL
            .iter()
            .filter(|c| c.is_render_system_specific())
            .collect();
        assert_eq!(specific, [&CapabilitiesCategory::D3d9, &CapabilitiesCategory::Gl]);
    }
}
