use std::collections::BTreeMap;

use crate::document::{AccessorId, MaterialId};

pub const POSITION: &str = "POSITION";
pub const NORMAL: &str = "NORMAL";
pub const TANGENT: &str = "TANGENT";
pub const TEXCOORD_0: &str = "TEXCOORD_0";

/// One draw call: vertex attributes, optional indices and one material
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Primitive {
    pub name: Option<String>,
    pub indices: Option<AccessorId>,
    pub attributes: BTreeMap<String, AccessorId>,
    pub material: Option<MaterialId>,
}

impl Primitive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_attribute(mut self, semantic: impl Into<String>, accessor: AccessorId) -> Self {
        self.attributes.insert(semantic.into(), accessor);
        self
    }

    pub fn with_indices(mut self, accessor: AccessorId) -> Self {
        self.indices = Some(accessor);
        self
    }

    pub fn with_material(mut self, material: MaterialId) -> Self {
        self.material = Some(material);
        self
    }

    pub fn attribute(&self, semantic: &str) -> Option<AccessorId> {
        self.attributes.get(semantic).copied()
    }

    /// index accessor first, then vertex accessors ordered by semantic
    pub fn accessors(&self) -> impl Iterator<Item = AccessorId> + '_ {
        self.indices
            .iter()
            .copied()
            .chain(self.attributes.values().copied())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub name: String,
    pub primitives: Vec<Primitive>,
}

impl Mesh {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primitives: vec![],
        }
    }

    pub fn with_primitive(mut self, primitive: Primitive) -> Self {
        self.primitives.push(primitive);
        self
    }

    pub fn add_primitive(&mut self, primitive: Primitive) -> &mut Self {
        self.primitives.push(primitive);
        self
    }
}
