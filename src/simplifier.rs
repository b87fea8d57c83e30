use std::collections::HashMap;

use anyhow::{anyhow, Context};
use log::debug;
use meshopt::VertexDataAdapter;

use crate::{
    accessor::{Accessor, AccessorData},
    document::Document,
    error::LodError,
    mesh::{Primitive, POSITION},
};

/// Reduces a primitive to a target ratio of its indices within an error bound.
///
/// The primitive handed in is already a private clone; implementations may
/// rewrite its accessors in place.
#[allow(async_fn_in_trait)]
pub trait Simplifier {
    /// One-time initialization of the simplification engine.
    async fn ready(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn simplify(
        &self,
        doc: &mut Document,
        primitive: Primitive,
        ratio: f32,
        error: f32,
    ) -> anyhow::Result<Primitive>;
}

/// meshoptimizer backed simplifier (`meshopt_simplify`)
#[derive(Clone, Copy, Debug, Default)]
pub struct MeshoptSimplifier;

impl Simplifier for MeshoptSimplifier {
    fn simplify(
        &self,
        doc: &mut Document,
        primitive: Primitive,
        ratio: f32,
        error: f32,
    ) -> anyhow::Result<Primitive> {
        let Some(position) = primitive.attribute(POSITION) else {
            debug!("primitive without {} is kept as is", POSITION);
            return Ok(primitive);
        };

        let positions = doc.accessor(position);
        if positions.components() != 3 || positions.is_index() {
            return Err(LodError::InvalidAccessor(format!(
                "{} of {:?} must be VEC3 floats",
                POSITION, primitive.name
            ))
            .into());
        }
        let vertex_count = positions.count();
        let indices = match primitive.indices {
            Some(indices) => doc
                .accessor(indices)
                .as_indices()
                .map(|values| values.to_vec())
                .ok_or_else(|| LodError::InvalidAccessor("indices must be integers".into()))?,
            None => (0..vertex_count as u32).collect(),
        };
        if indices.len() < 3 {
            return Ok(primitive);
        }

        let target_count = target_index_count(indices.len(), ratio);
        let values = positions.as_floats().unwrap_or_default();
        let adapter = VertexDataAdapter::new(bytemuck::cast_slice(values), 12, 0)
            .map_err(|e| anyhow!("invalid vertex layout: {:?}", e))?;
        let simplified = meshopt::simplify(&indices, &adapter, target_count, error);
        debug!(
            "simplified {} -> {} indices (target {})",
            indices.len(),
            simplified.len(),
            target_count
        );

        compact(doc, primitive, simplified).context("failed to compact simplified primitive")
    }
}

/// Index budget for `ratio`: whole triangles, at least one.
pub fn target_index_count(index_count: usize, ratio: f32) -> usize {
    let target = (index_count as f32 * ratio / 3.0).floor() as usize * 3;
    target.max(3)
}

/// Drops vertices that `indices` no longer reference and renumbers the rest in
/// first-use order. The primitive's own accessors are rewritten in place.
pub fn compact(
    doc: &mut Document,
    mut primitive: Primitive,
    indices: Vec<u32>,
) -> anyhow::Result<Primitive> {
    let mut remap: HashMap<u32, u32> = HashMap::new();
    let mut order = vec![];
    let compacted: Vec<u32> = indices
        .iter()
        .map(|&old| {
            *remap.entry(old).or_insert_with(|| {
                order.push(old);
                (order.len() - 1) as u32
            })
        })
        .collect();

    for &accessor in primitive.attributes.values() {
        let gathered = doc.accessor(accessor).gather(&order);
        doc.accessor_mut(accessor).data = gathered;
    }

    match primitive.indices {
        Some(accessor) => doc.accessor_mut(accessor).data = AccessorData::Index(compacted),
        None => {
            let name = primitive.name.clone().unwrap_or_default();
            primitive.indices = Some(doc.create_accessor(Accessor::indices(name, compacted)));
        }
    }
    Ok(primitive)
}
