use image::DynamicImage;

use crate::document::{Extensions, TextureId};

/// The five texture slots a material can reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    BaseColor,
    Normal,
    Emissive,
    Occlusion,
    MetallicRoughness,
}

impl TextureSlot {
    pub const ALL: [TextureSlot; 5] = [
        TextureSlot::BaseColor,
        TextureSlot::Normal,
        TextureSlot::Emissive,
        TextureSlot::Occlusion,
        TextureSlot::MetallicRoughness,
    ];

    fn position(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AlphaMode {
    #[default]
    Opaque,
    Mask,
    Blend,
}

/// Metallic-roughness PBR material. Factors default to the glTF defaults.
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    pub base_color_factor: [f32; 4],
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub emissive_factor: [f32; 3],
    pub alpha_mode: AlphaMode,
    /// only meaningful with [`AlphaMode::Mask`]
    pub alpha_cutoff: Option<f32>,
    pub double_sided: bool,
    pub normal_scale: f32,
    pub occlusion_strength: f32,
    textures: [Option<TextureId>; 5],
    tex_coords: [u32; 5],
    pub extensions: Extensions,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_color_factor: [1.0; 4],
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            emissive_factor: [0.0; 3],
            alpha_mode: AlphaMode::Opaque,
            alpha_cutoff: None,
            double_sided: false,
            normal_scale: 1.0,
            occlusion_strength: 1.0,
            textures: [None; 5],
            tex_coords: [0; 5],
            extensions: Extensions::new(),
        }
    }
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_texture(mut self, slot: TextureSlot, texture: TextureId) -> Self {
        self.set_texture(slot, Some(texture));
        self
    }

    pub fn texture(&self, slot: TextureSlot) -> Option<TextureId> {
        self.textures[slot.position()]
    }

    pub fn set_texture(&mut self, slot: TextureSlot, texture: Option<TextureId>) -> &mut Self {
        self.textures[slot.position()] = texture;
        self
    }

    /// `TEXCOORD_<n>` set sampled by `slot`
    pub fn tex_coord(&self, slot: TextureSlot) -> u32 {
        self.tex_coords[slot.position()]
    }

    pub fn set_tex_coord(&mut self, slot: TextureSlot, set: u32) -> &mut Self {
        self.tex_coords[slot.position()] = set;
        self
    }

    /// occupied slots in [`TextureSlot::ALL`] order
    pub fn textures(&self) -> impl Iterator<Item = (TextureSlot, TextureId)> + '_ {
        TextureSlot::ALL
            .into_iter()
            .filter_map(|slot| self.texture(slot).map(|texture| (slot, texture)))
    }

    pub(crate) fn slots(&self) -> &[Option<TextureId>; 5] {
        &self.textures
    }

    pub(crate) fn tex_coords(&self) -> &[u32; 5] {
        &self.tex_coords
    }
}

pub const NEAREST: u32 = 9728;
pub const LINEAR: u32 = 9729;
pub const NEAREST_MIPMAP_NEAREST: u32 = 9984;
pub const LINEAR_MIPMAP_NEAREST: u32 = 9985;
pub const NEAREST_MIPMAP_LINEAR: u32 = 9986;
pub const LINEAR_MIPMAP_LINEAR: u32 = 9987;
pub const CLAMP_TO_EDGE: u32 = 33071;
pub const MIRRORED_REPEAT: u32 = 33648;
pub const REPEAT: u32 = 10497;

/// Filtering and wrapping of a texture, as GL enum values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Sampler {
    pub mag_filter: Option<u32>,
    pub min_filter: Option<u32>,
    pub wrap_s: u32,
    pub wrap_t: u32,
}

impl Default for Sampler {
    fn default() -> Self {
        Self {
            mag_filter: None,
            min_filter: None,
            wrap_s: REPEAT,
            wrap_t: REPEAT,
        }
    }
}

/// A decoded image referenced by material slots
#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    pub name: String,
    pub image: DynamicImage,
    /// `None` leaves sampling to the viewer's defaults
    pub sampler: Option<Sampler>,
}

impl Texture {
    pub fn new(name: impl Into<String>, image: DynamicImage) -> Self {
        Self {
            name: name.into(),
            image,
            sampler: None,
        }
    }

    pub fn with_sampler(mut self, sampler: Sampler) -> Self {
        self.sampler = Some(sampler);
        self
    }

    pub fn size(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    /// true when either axis is larger than `size`
    pub fn exceeds(&self, size: (u32, u32)) -> bool {
        let (width, height) = self.size();
        width > size.0 || height > size.1
    }
}
