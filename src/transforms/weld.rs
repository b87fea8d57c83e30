use std::collections::HashMap;

use log::{info, warn};

use crate::{
    accessor::Accessor,
    document::{Document, MeshId},
    mesh::Primitive,
};

/// Merges vertices whose attributes are bit-identical, in every primitive of
/// the document. Returns the number of vertices removed.
pub fn weld(doc: &mut Document) -> usize {
    let mut removed = 0;
    for mesh in doc.meshes().keys().collect::<Vec<_>>() {
        removed += weld_mesh(doc, mesh);
    }
    doc.prune();
    info!("weld: merged {} vertices", removed);
    removed
}

fn weld_mesh(doc: &mut Document, mesh: MeshId) -> usize {
    let mut primitives = doc.mesh(mesh).primitives.clone();
    let mut removed = 0;
    for primitive in primitives.iter_mut() {
        removed += weld_primitive(doc, primitive);
    }
    doc.mesh_mut(mesh).primitives = primitives;
    removed
}

fn weld_primitive(doc: &mut Document, primitive: &mut Primitive) -> usize {
    let accessors: Vec<&Accessor> = primitive
        .attributes
        .values()
        .map(|&id| doc.accessor(id))
        .collect();
    let Some(vertex_count) = accessors.first().map(|a| a.count()) else {
        return 0;
    };
    if accessors.iter().any(|a| a.count() != vertex_count) {
        warn!("attribute counts differ in {:?}; skipping weld", primitive.name);
        return 0;
    }

    let mut first_seen: HashMap<Vec<u32>, u32> = HashMap::new();
    let mut unique = vec![];
    let remap: Vec<u32> = (0..vertex_count)
        .map(|i| {
            let key: Vec<u32> = accessors.iter().flat_map(|a| a.element_bits(i)).collect();
            *first_seen.entry(key).or_insert_with(|| {
                unique.push(i as u32);
                (unique.len() - 1) as u32
            })
        })
        .collect();

    let removed = vertex_count - unique.len();
    if removed == 0 && primitive.indices.is_some() {
        return 0;
    }

    let source_indices: Vec<u32> = match primitive.indices {
        Some(id) => match doc.accessor(id).as_indices() {
            Some(indices) => indices.to_vec(),
            None => {
                warn!("non-integer indices in {:?}; skipping weld", primitive.name);
                return 0;
            }
        },
        None => (0..vertex_count as u32).collect(),
    };
    let indices: Vec<u32> = source_indices.iter().map(|&i| remap[i as usize]).collect();

    let attributes = primitive
        .attributes
        .iter()
        .map(|(semantic, &id)| {
            let source = doc.accessor(id);
            let welded = Accessor {
                name: source.name.clone(),
                data: source.gather(&unique),
            };
            (semantic.clone(), doc.create_accessor(welded))
        })
        .collect();
    let name = primitive
        .indices
        .map(|id| doc.accessor(id).name.clone())
        .unwrap_or_default();

    primitive.attributes = attributes;
    primitive.indices = Some(doc.create_accessor(Accessor::indices(name, indices)));
    removed
}
