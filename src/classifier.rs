use std::{collections::HashMap, hash::Hash};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::document::{AccessorId, Document, NodeId, TextureId};

/// What happens when a resource is reachable from more than one level.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum SharedResourcePolicy {
    /// the level classified last keeps the resource
    #[default]
    LastWriteWins,
    /// the most detailed level keeps the resource
    MinimumLevel,
}

/// Per-serialization map from accessor/texture to the LOD level that owns it.
#[derive(Clone, Debug, Default)]
pub struct LevelClassification {
    policy: SharedResourcePolicy,
    accessor_level: HashMap<AccessorId, usize>,
    texture_level: HashMap<TextureId, usize>,
    max_level: usize,
}

impl LevelClassification {
    pub fn new(policy: SharedResourcePolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    /// Tags the accessors and material textures of the mesh directly on `node`.
    /// Children are not visited.
    pub fn classify(&mut self, doc: &Document, node: NodeId, level: usize) {
        let Some(mesh) = doc.nodes().get(node).and_then(|node| node.mesh) else {
            debug!("node {:?} has no mesh to classify", node);
            return;
        };
        let Some(mesh) = doc.meshes().get(mesh) else {
            return;
        };

        for primitive in &mesh.primitives {
            for accessor in primitive.accessors() {
                tag(&mut self.accessor_level, accessor, level, self.policy);
            }
            let material = primitive
                .material
                .and_then(|material| doc.materials().get(material));
            if let Some(material) = material {
                for (_, texture) in material.textures() {
                    tag(&mut self.texture_level, texture, level, self.policy);
                }
            }
        }
    }

    pub fn accessor_level(&self, accessor: AccessorId) -> Option<usize> {
        self.accessor_level.get(&accessor).copied()
    }

    pub fn texture_level(&self, texture: TextureId) -> Option<usize> {
        self.texture_level.get(&texture).copied()
    }

    /// largest variant count over all associations seen by prewrite
    pub fn max_level(&self) -> usize {
        self.max_level
    }

    pub(crate) fn observe_variant_count(&mut self, count: usize) {
        self.max_level = self.max_level.max(count);
    }

    pub fn is_empty(&self) -> bool {
        self.accessor_level.is_empty() && self.texture_level.is_empty()
    }

    pub fn clear(&mut self) {
        self.accessor_level.clear();
        self.texture_level.clear();
        self.max_level = 0;
    }
}

fn tag<K: Hash + Eq>(
    map: &mut HashMap<K, usize>,
    key: K,
    level: usize,
    policy: SharedResourcePolicy,
) {
    match policy {
        SharedResourcePolicy::LastWriteWins => {
            map.insert(key, level);
        }
        SharedResourcePolicy::MinimumLevel => {
            let entry = map.entry(key).or_insert(level);
            *entry = (*entry).min(level);
        }
    }
}
