//! Texture unit state passed from materials to the backend.

use vesper_core::math::ColourValue;

/// Opaque backend texture handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterOption {
    None,
    Point,
    #[default]
    Linear,
    Anisotropic,
}

/// Min, mag and mip filters of one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureFiltering {
    pub min: FilterOption,
    pub mag: FilterOption,
    pub mip: FilterOption,
}

impl Default for TextureFiltering {
    fn default() -> Self {
        Self {
            min: FilterOption::Linear,
            mag: FilterOption::Linear,
            mip: FilterOption::Point,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureAddressingMode {
    #[default]
    Wrap,
    Mirror,
    Clamp,
    Border,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct UvwAddressingMode {
    pub u: TextureAddressingMode,
    pub v: TextureAddressingMode,
    pub w: TextureAddressingMode,
}

impl UvwAddressingMode {
    pub fn uniform(mode: TextureAddressingMode) -> Self {
        Self {
            u: mode,
            v: mode,
            w: mode,
        }
    }

    pub fn uses_border(&self) -> bool {
        [self.u, self.v, self.w].contains(&TextureAddressingMode::Border)
    }
}

/// Which pipeline stage samples the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureBindingType {
    #[default]
    Fragment,
    Vertex,
}

/// Everything bound to one texture unit.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureUnitSettings {
    pub texture: Option<TextureHandle>,
    pub binding: TextureBindingType,
    pub filtering: TextureFiltering,
    pub anisotropy: u32,
    pub mipmap_bias: f32,
    pub addressing: UvwAddressingMode,
    pub border_colour: ColourValue,
}

impl Default for TextureUnitSettings {
    fn default() -> Self {
        Self {
            texture: None,
            binding: TextureBindingType::Fragment,
            filtering: TextureFiltering::default(),
            anisotropy: 1,
            mipmap_bias: 0.0,
            addressing: UvwAddressingMode::default(),
            border_colour: ColourValue::new(0.0, 0.0, 0.0, 1.0),
        }
    }
}

impl TextureUnitSettings {
    pub fn new(texture: TextureHandle) -> Self {
        Self {
            texture: Some(texture),
            ..Self::default()
        }
    }

    pub fn with_binding(mut self, binding: TextureBindingType) -> Self {
        self.binding = binding;
        self
    }

    pub fn with_filtering(mut self, filtering: TextureFiltering) -> Self {
        self.filtering = filtering;
        self
    }

    pub fn with_anisotropy(mut self, anisotropy: u32) -> Self {
        self.anisotropy = anisotropy;
        self
    }

    pub fn with_mipmap_bias(mut self, bias: f32) -> Self {
        self.mipmap_bias = bias;
        self
    }

    pub fn with_addressing(mut self, addressing: UvwAddressingMode) -> Self {
        self.addressing = addressing;
        self
    }

    pub fn with_border_colour(mut self, colour: ColourValue) -> Self {
        self.border_colour = colour;
        self
    }
}
