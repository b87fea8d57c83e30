use crate::document::{Extensions, MeshId, NodeId};

/// Scene graph node
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub name: String,
    pub mesh: Option<MeshId>,
    pub children: Vec<NodeId>,
    pub translation: [f32; 3],
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
    pub extensions: Extensions,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            name: String::new(),
            mesh: None,
            children: vec![],
            translation: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0; 3],
            extensions: Extensions::new(),
        }
    }
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_mesh(mut self, mesh: MeshId) -> Self {
        self.mesh = Some(mesh);
        self
    }

    pub fn has_identity_transform(&self) -> bool {
        let identity = Node::default();
        self.translation == identity.translation
            && self.rotation == identity.rotation
            && self.scale == identity.scale
    }
}

/// Only the targets are kept; animations are stripped before LOD generation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Animation {
    pub name: String,
    pub targets: Vec<NodeId>,
}
