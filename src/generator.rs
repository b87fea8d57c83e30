use log::{debug, info};

use crate::{
    document::{Document, MaterialId, MeshId, TextureId},
    material::TextureSlot,
    mesh::Mesh,
    simplifier::Simplifier,
};

/// Settings of one generated detail level.
#[derive(Clone, Debug, PartialEq)]
pub struct LevelSettings {
    /// fraction of indices to keep, in (0, 1]
    pub ratio: f32,
    /// simplification error bound, relative to mesh extents
    pub error: f32,
    /// textures larger than this get a per-level copy; `None` keeps the originals
    pub texture_size: Option<(u32, u32)>,
}

/// `_LOD<level>` for 1-based variant levels
pub fn level_suffix(level: usize) -> String {
    format!("_LOD{}", level)
}

/// Builds one simplified mesh per entry of `levels`, named `<mesh>_LOD<i+1>`.
///
/// Primitives are cloned before simplification so the source mesh keeps its
/// buffers. Textures are copied only when they exceed the level's target size;
/// the material is copied only when one of its textures was.
pub fn generate_variants<S: Simplifier>(
    doc: &mut Document,
    mesh: MeshId,
    levels: &[LevelSettings],
    simplifier: &S,
) -> anyhow::Result<Vec<MeshId>> {
    let source = doc.mesh(mesh).clone();
    let mut variants = Vec::with_capacity(levels.len());

    for (i, level) in levels.iter().enumerate() {
        let suffix = level_suffix(i + 1);
        let variant_name = format!("{}{}", source.name, suffix);
        let mut variant = Mesh::new(&variant_name);

        for primitive in &source.primitives {
            let clone = doc.clone_primitive(primitive);
            let mut lod_primitive = simplifier.simplify(doc, clone, level.ratio, level.error)?;
            if primitive.name.is_some() {
                lod_primitive.name = Some(variant_name.clone());
            }

            if let (Some(size), Some(material)) = (level.texture_size, primitive.material) {
                lod_primitive.material = Some(lod_material(doc, material, size, &suffix));
            }
            variant.add_primitive(lod_primitive);
        }

        debug!(
            "{}: {} primitives (ratio {}, error {})",
            variant_name,
            variant.primitives.len(),
            level.ratio,
            level.error
        );
        variants.push(doc.create_mesh(variant));
    }

    info!("generated {} variants of {}", variants.len(), source.name);
    Ok(variants)
}

/// Returns `material` itself when none of its textures exceed `size`, otherwise a
/// renamed copy whose oversized textures are replaced by renamed copies.
fn lod_material(
    doc: &mut Document,
    material: MaterialId,
    size: (u32, u32),
    suffix: &str,
) -> MaterialId {
    let original = doc.material(material).clone();
    let textures: Vec<(TextureSlot, Option<TextureId>)> = TextureSlot::ALL
        .into_iter()
        .map(|slot| {
            let texture = original
                .texture(slot)
                .map(|texture| clone_texture_if_needed(doc, texture, size, suffix));
            (slot, texture)
        })
        .collect();

    let unchanged = textures
        .iter()
        .all(|(slot, texture)| *texture == original.texture(*slot));
    if unchanged {
        return material;
    }

    let mut lod_material = original;
    lod_material.name = format!("{}{}", lod_material.name, suffix);
    for (slot, texture) in textures {
        lod_material.set_texture(slot, texture);
    }
    doc.create_material(lod_material)
}

fn clone_texture_if_needed(
    doc: &mut Document,
    texture: TextureId,
    size: (u32, u32),
    suffix: &str,
) -> TextureId {
    let source = doc.texture(texture);
    if !source.exceeds(size) {
        return texture;
    }
    let mut clone = source.clone();
    clone.name = format!("{}{}", clone.name, suffix);
    doc.create_texture(clone)
}
