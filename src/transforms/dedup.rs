use std::{collections::HashMap, hash::Hash};

use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    document::{AccessorId, Document, ExtensionProperty, MaterialId, MeshId, TextureId},
    material::{AlphaMode, Material},
    mesh::Primitive,
};

/// Number of duplicates merged per property type
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupReport {
    pub accessors: usize,
    pub textures: usize,
    pub materials: usize,
    pub meshes: usize,
}

/// Merges byte-identical accessors, textures, materials and meshes, rewiring
/// references to the first occurrence. Names are not compared.
pub fn dedup(doc: &mut Document) -> DedupReport {
    let report = DedupReport {
        accessors: dedup_accessors(doc),
        textures: dedup_textures(doc),
        materials: dedup_materials(doc),
        meshes: dedup_meshes(doc),
    };
    doc.prune();
    info!(
        "dedup: merged {} accessors, {} textures, {} materials, {} meshes",
        report.accessors, report.textures, report.materials, report.meshes
    );
    report
}

/// Maps every duplicate to the first id that produced the same key.
fn duplicates<I: slotmap::Key, K: Hash + Eq>(
    items: impl Iterator<Item = (I, K)>,
) -> HashMap<I, I> {
    let mut first: HashMap<K, I> = HashMap::new();
    let mut remap = HashMap::new();
    for (id, key) in items {
        let canonical = *first.entry(key).or_insert(id);
        if canonical != id {
            remap.insert(id, canonical);
        }
    }
    remap
}

fn dedup_accessors(doc: &mut Document) -> usize {
    let remap: HashMap<AccessorId, AccessorId> =
        duplicates(doc.accessors().iter().map(|(id, accessor)| {
            (
                id,
                (accessor.is_index(), accessor.components(), accessor.to_bytes()),
            )
        }));
    if remap.is_empty() {
        return 0;
    }

    let swap = |id: &mut AccessorId| {
        if let Some(&canonical) = remap.get(id) {
            *id = canonical;
        }
    };
    for primitive in doc.primitives_mut() {
        if let Some(id) = primitive.indices.as_mut() {
            swap(id);
        }
        primitive.attributes.values_mut().for_each(swap);
    }
    for &duplicate in remap.keys() {
        doc.remove_accessor(duplicate);
    }
    remap.len()
}

fn dedup_textures(doc: &mut Document) -> usize {
    let remap: HashMap<TextureId, TextureId> =
        duplicates(doc.textures().iter().map(|(id, texture)| {
            let image = &texture.image;
            (
                id,
                (
                    image.width(),
                    image.height(),
                    format!("{:?}", image.color()),
                    image.as_bytes().to_vec(),
                    texture.sampler,
                ),
            )
        }));
    if remap.is_empty() {
        return 0;
    }

    for material in doc.materials().keys().collect::<Vec<_>>() {
        let material = doc.material_mut(material);
        let rewired: Vec<_> = material
            .textures()
            .filter_map(|(slot, texture)| remap.get(&texture).map(|&canonical| (slot, canonical)))
            .collect();
        for (slot, canonical) in rewired {
            material.set_texture(slot, Some(canonical));
        }
    }
    for &duplicate in remap.keys() {
        doc.remove_texture(duplicate);
    }
    remap.len()
}

#[derive(PartialEq, Eq, Hash)]
struct MaterialKey {
    factors: Vec<u32>,
    alpha_mode: AlphaMode,
    alpha_cutoff: Option<u32>,
    double_sided: bool,
    textures: [Option<TextureId>; 5],
    tex_coords: [u32; 5],
    extensions: Vec<(String, ExtensionProperty)>,
}

fn material_key(material: &Material) -> MaterialKey {
    let factors = material
        .base_color_factor
        .iter()
        .chain(&material.emissive_factor)
        .chain([
            &material.metallic_factor,
            &material.roughness_factor,
            &material.normal_scale,
            &material.occlusion_strength,
        ])
        .map(|v| v.to_bits())
        .collect();
    MaterialKey {
        factors,
        alpha_mode: material.alpha_mode,
        alpha_cutoff: material.alpha_cutoff.map(f32::to_bits),
        double_sided: material.double_sided,
        textures: *material.slots(),
        tex_coords: *material.tex_coords(),
        extensions: material
            .extensions
            .iter()
            .map(|(name, property)| (name.clone(), *property))
            .collect(),
    }
}

fn dedup_materials(doc: &mut Document) -> usize {
    let remap: HashMap<MaterialId, MaterialId> =
        duplicates(
            doc.materials()
                .iter()
                .map(|(id, material)| (id, material_key(material))),
        );
    if remap.is_empty() {
        return 0;
    }

    for primitive in doc.primitives_mut() {
        if let Some(canonical) = primitive.material.and_then(|m| remap.get(&m)) {
            primitive.material = Some(*canonical);
        }
    }
    for &duplicate in remap.keys() {
        doc.remove_material(duplicate);
    }
    remap.len()
}

fn dedup_meshes(doc: &mut Document) -> usize {
    let remap: HashMap<MeshId, MeshId> = duplicates(doc.meshes().iter().map(|(id, mesh)| {
        let primitives: Vec<Primitive> = mesh
            .primitives
            .iter()
            .map(|primitive| Primitive {
                name: None,
                ..primitive.clone()
            })
            .collect();
        (id, primitives)
    }));
    if remap.is_empty() {
        return 0;
    }

    for node in doc.nodes().keys().collect::<Vec<_>>() {
        let node = doc.node_mut(node);
        if let Some(canonical) = node.mesh.and_then(|m| remap.get(&m)) {
            node.mesh = Some(*canonical);
        }
    }
    for &duplicate in remap.keys() {
        doc.remove_mesh(duplicate);
    }
    remap.len()
}
