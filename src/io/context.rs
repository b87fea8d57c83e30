use std::collections::HashMap;

use gltf::json;

use crate::{
    classifier::{LevelClassification, SharedResourcePolicy},
    document::NodeId,
};

/// Where a serialization session is. `prewrite` must precede `write`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WriteStage {
    #[default]
    Idle,
    Prewritten,
    Written,
}

/// State threaded through one serialization pass.
#[derive(Clone, Debug, Default)]
pub struct WriterContext {
    pub json: json::Root,
    pub classification: LevelClassification,
    node_index_map: HashMap<NodeId, usize>,
    stage: WriteStage,
}

impl WriterContext {
    pub fn new(policy: SharedResourcePolicy) -> Self {
        Self {
            classification: LevelClassification::new(policy),
            ..Default::default()
        }
    }

    pub fn set_node_index(&mut self, node: NodeId, index: usize) {
        self.node_index_map.insert(node, index);
    }

    /// serialized index of `node`, if it has been assigned one
    pub fn node_index(&self, node: NodeId) -> Option<usize> {
        self.node_index_map.get(&node).copied()
    }

    pub fn stage(&self) -> WriteStage {
        self.stage
    }

    pub(crate) fn advance(&mut self, stage: WriteStage) {
        self.stage = stage;
    }
}
