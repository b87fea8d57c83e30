use crate::document::{MaterialId, NodeId};

/// Extension slot name of LOD associations
pub const MSFT_LOD: &str = "MSFT_lod";
/// extras key carrying the coverage thresholds next to the extension block
pub const MSFT_SCREEN_COVERAGE: &str = "MSFT_screencoverage";

/// Ordered LOD variants of a node (or material) and their screen coverages.
///
/// Level 0 is the parent's own full-detail mesh and is never stored here;
/// `variants[0]` is level 1.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Lod {
    name: String,
    variants: Vec<NodeId>,
    coverages: Vec<f64>,
}

impl Lod {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unchecked append. [`LodExtension::add_variant`] is the checked entry point
    /// that refuses the association's own parent.
    ///
    /// [`LodExtension::add_variant`]: crate::extension::LodExtension::add_variant
    pub fn add_variant(&mut self, node: NodeId) -> &mut Self {
        self.variants.push(node);
        self
    }

    /// Replaces all thresholds. The count is not checked against the variants.
    pub fn set_coverages(&mut self, coverages: Vec<f64>) -> &mut Self {
        self.coverages = coverages;
        self
    }

    pub fn list_variants(&self) -> &[NodeId] {
        &self.variants
    }

    pub fn list_coverages(&self) -> &[f64] {
        &self.coverages
    }

    /// number of levels including the parent's own level 0
    pub fn level_count(&self) -> usize {
        self.variants.len() + 1
    }
}

/// Property types an association can be attached to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LodParent {
    Node(NodeId),
    Material(MaterialId),
}
