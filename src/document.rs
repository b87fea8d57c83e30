use std::collections::{BTreeMap, BTreeSet, HashSet};

use log::debug;
use slotmap::{new_key_type, SlotMap};

use crate::{
    accessor::Accessor,
    lod::{Lod, LodParent},
    material::{Material, Texture},
    mesh::{Mesh, Primitive},
    node::{Animation, Node},
};

new_key_type! {
    pub struct NodeId;
    pub struct MeshId;
    pub struct MaterialId;
    pub struct TextureId;
    pub struct AccessorId;
    pub struct AnimationId;
    pub struct LodId;
}

/// Extension data a node or material carries, keyed by extension slot name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExtensionProperty {
    Lod(LodId),
}

pub type Extensions = BTreeMap<String, ExtensionProperty>;

/// In-memory scene graph.
///
/// Every property lives in a slot map owned by the document and is addressed by
/// a typed key. Back references (which nodes use a mesh, which parents hold an
/// association) are never stored; they are found by scanning when needed.
#[derive(Clone, Debug, Default)]
pub struct Document {
    nodes: SlotMap<NodeId, Node>,
    meshes: SlotMap<MeshId, Mesh>,
    materials: SlotMap<MaterialId, Material>,
    textures: SlotMap<TextureId, Texture>,
    accessors: SlotMap<AccessorId, Accessor>,
    animations: SlotMap<AnimationId, Animation>,
    lods: SlotMap<LodId, Lod>,
    scene: Vec<NodeId>,
    extensions_used: BTreeSet<String>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_node(&mut self, node: Node) -> NodeId {
        self.nodes.insert(node)
    }

    pub fn create_mesh(&mut self, mesh: Mesh) -> MeshId {
        self.meshes.insert(mesh)
    }

    pub fn create_material(&mut self, material: Material) -> MaterialId {
        self.materials.insert(material)
    }

    pub fn create_texture(&mut self, texture: Texture) -> TextureId {
        self.textures.insert(texture)
    }

    pub fn create_accessor(&mut self, accessor: Accessor) -> AccessorId {
        self.accessors.insert(accessor)
    }

    pub fn create_animation(&mut self, animation: Animation) -> AnimationId {
        self.animations.insert(animation)
    }

    pub(crate) fn create_lod(&mut self, lod: Lod) -> LodId {
        self.lods.insert(lod)
    }

    pub fn nodes(&self) -> &SlotMap<NodeId, Node> {
        &self.nodes
    }

    pub fn meshes(&self) -> &SlotMap<MeshId, Mesh> {
        &self.meshes
    }

    pub fn materials(&self) -> &SlotMap<MaterialId, Material> {
        &self.materials
    }

    pub fn textures(&self) -> &SlotMap<TextureId, Texture> {
        &self.textures
    }

    pub fn accessors(&self) -> &SlotMap<AccessorId, Accessor> {
        &self.accessors
    }

    pub fn animations(&self) -> &SlotMap<AnimationId, Animation> {
        &self.animations
    }

    pub fn lods(&self) -> &SlotMap<LodId, Lod> {
        &self.lods
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    pub fn mesh(&self, id: MeshId) -> &Mesh {
        &self.meshes[id]
    }

    pub fn mesh_mut(&mut self, id: MeshId) -> &mut Mesh {
        &mut self.meshes[id]
    }

    pub fn material(&self, id: MaterialId) -> &Material {
        &self.materials[id]
    }

    pub fn material_mut(&mut self, id: MaterialId) -> &mut Material {
        &mut self.materials[id]
    }

    pub fn texture(&self, id: TextureId) -> &Texture {
        &self.textures[id]
    }

    pub(crate) fn textures_mut(&mut self) -> &mut SlotMap<TextureId, Texture> {
        &mut self.textures
    }

    pub fn accessor(&self, id: AccessorId) -> &Accessor {
        &self.accessors[id]
    }

    pub fn accessor_mut(&mut self, id: AccessorId) -> &mut Accessor {
        &mut self.accessors[id]
    }

    pub fn lod(&self, id: LodId) -> &Lod {
        &self.lods[id]
    }

    pub fn lod_mut(&mut self, id: LodId) -> &mut Lod {
        &mut self.lods[id]
    }

    /// adds `node` to the root level of the default scene
    pub fn add_scene_root(&mut self, node: NodeId) {
        self.scene.push(node);
    }

    pub fn scene_roots(&self) -> &[NodeId] {
        &self.scene
    }

    pub fn register_extension(&mut self, name: &str) {
        self.extensions_used.insert(name.to_string());
    }

    pub fn extensions_used(&self) -> impl Iterator<Item = &str> {
        self.extensions_used.iter().map(String::as_str)
    }

    pub fn dispose_animation(&mut self, id: AnimationId) -> Option<Animation> {
        self.animations.remove(id)
    }

    /// Nodes referencing `mesh`.
    pub fn mesh_parents(&self, mesh: MeshId) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.mesh == Some(mesh))
            .map(|(id, _)| id)
            .collect()
    }

    /// Nodes and materials carrying `lod` in their extension maps.
    pub fn lod_parents(&self, lod: LodId) -> Vec<LodParent> {
        let holds = |extensions: &Extensions| {
            extensions
                .values()
                .any(|property| *property == ExtensionProperty::Lod(lod))
        };
        let nodes = self
            .nodes
            .iter()
            .filter(|(_, node)| holds(&node.extensions))
            .map(|(id, _)| LodParent::Node(id));
        let materials = self
            .materials
            .iter()
            .filter(|(_, material)| holds(&material.extensions))
            .map(|(id, _)| LodParent::Material(id));
        nodes.chain(materials).collect()
    }

    /// Copies `primitive` with freshly allocated accessors so that the copy can be
    /// mutated without touching the source buffers. The material is shared.
    pub fn clone_primitive(&mut self, primitive: &Primitive) -> Primitive {
        let indices = primitive.indices.map(|id| {
            let accessor = self.accessors[id].clone();
            self.accessors.insert(accessor)
        });
        let attributes = primitive
            .attributes
            .iter()
            .map(|(semantic, &id)| {
                let accessor = self.accessors[id].clone();
                (semantic.clone(), self.accessors.insert(accessor))
            })
            .collect();
        Primitive {
            name: primitive.name.clone(),
            indices,
            attributes,
            material: primitive.material,
        }
    }

    pub(crate) fn primitives_mut(&mut self) -> impl Iterator<Item = &mut Primitive> {
        self.meshes
            .iter_mut()
            .flat_map(|(_, mesh)| mesh.primitives.iter_mut())
    }

    pub(crate) fn remove_accessor(&mut self, id: AccessorId) -> Option<Accessor> {
        self.accessors.remove(id)
    }

    pub(crate) fn remove_texture(&mut self, id: TextureId) -> Option<Texture> {
        self.textures.remove(id)
    }

    pub(crate) fn remove_material(&mut self, id: MaterialId) -> Option<Material> {
        self.materials.remove(id)
    }

    pub(crate) fn remove_mesh(&mut self, id: MeshId) -> Option<Mesh> {
        self.meshes.remove(id)
    }

    /// Removes accessors no primitive uses, then materials no primitive uses, then
    /// textures no material uses. Meshes and nodes are left alone.
    pub fn prune(&mut self) -> usize {
        let used_accessors: HashSet<AccessorId> = self
            .meshes
            .iter()
            .flat_map(|(_, mesh)| mesh.primitives.iter().flat_map(|p| p.accessors()))
            .collect();
        let used_materials: HashSet<MaterialId> = self
            .meshes
            .iter()
            .flat_map(|(_, mesh)| mesh.primitives.iter().filter_map(|p| p.material))
            .collect();

        let mut removed = 0;
        for id in self.accessors.keys().collect::<Vec<_>>() {
            if !used_accessors.contains(&id) {
                self.accessors.remove(id);
                removed += 1;
            }
        }
        for id in self.materials.keys().collect::<Vec<_>>() {
            let material = &self.materials[id];
            // materials holding an extension property are kept as extension parents
            if !used_materials.contains(&id) && material.extensions.is_empty() {
                self.materials.remove(id);
                removed += 1;
            }
        }

        let used_textures: HashSet<TextureId> = self
            .materials
            .iter()
            .flat_map(|(_, material)| material.textures().map(|(_, texture)| texture))
            .collect();
        for id in self.textures.keys().collect::<Vec<_>>() {
            if !used_textures.contains(&id) {
                self.textures.remove(id);
                removed += 1;
            }
        }

        if removed > 0 {
            debug!("pruned {} unused properties", removed);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        accessor::Accessor,
        material::{Material, TextureSlot},
        mesh::{Mesh, Primitive, POSITION},
        node::Node,
        test_utils::solid_texture,
    };

    use super::Document;

    #[test]
    fn cloned_primitive_owns_its_buffers() {
        let mut doc = Document::new();
        let position = doc.create_accessor(Accessor::vertex("pos", 3, vec![0.; 9]));
        let indices = doc.create_accessor(Accessor::indices("idx", vec![0, 1, 2]));
        let primitive = Primitive::new()
            .with_attribute(POSITION, position)
            .with_indices(indices);

        let clone = doc.clone_primitive(&primitive);
        assert_ne!(clone.attribute(POSITION), Some(position));
        assert_ne!(clone.indices, Some(indices));
        assert_eq!(
            doc.accessor(clone.attribute(POSITION).unwrap()),
            doc.accessor(position)
        );
    }

    #[test]
    fn mesh_parents_scans_nodes() {
        let mut doc = Document::new();
        let mesh = doc.create_mesh(Mesh::new("m"));
        let a = doc.create_node(Node::new("a").with_mesh(mesh));
        let _ = doc.create_node(Node::new("b"));
        let c = doc.create_node(Node::new("c").with_mesh(mesh));
        assert_eq!(doc.mesh_parents(mesh), vec![a, c]);
    }

    #[test]
    fn prune_drops_unreferenced_resources() {
        let mut doc = Document::new();
        let used = doc.create_accessor(Accessor::vertex("pos", 3, vec![0.; 3]));
        let _orphan = doc.create_accessor(Accessor::vertex("orphan", 3, vec![0.; 3]));
        let texture = doc.create_texture(solid_texture("tex", 4, 4));
        let _orphan_texture = doc.create_texture(solid_texture("orphan", 4, 4));
        let material =
            doc.create_material(Material::new("mat").with_texture(TextureSlot::BaseColor, texture));
        let _orphan_material = doc.create_material(Material::new("orphan"));
        doc.create_mesh(Mesh::new("m").with_primitive(
            Primitive::new()
                .with_attribute(POSITION, used)
                .with_material(material),
        ));

        assert_eq!(doc.prune(), 3);
        assert_eq!(doc.accessors().keys().collect::<Vec<_>>(), vec![used]);
        assert_eq!(doc.textures().keys().collect::<Vec<_>>(), vec![texture]);
        assert_eq!(doc.materials().keys().collect::<Vec<_>>(), vec![material]);
    }

    #[test]
    fn removed_keys_no_longer_resolve() {
        let mut doc = Document::new();
        let old = doc.create_accessor(Accessor::vertex("old", 3, vec![0.; 3]));
        doc.remove_accessor(old);
        let new = doc.create_accessor(Accessor::vertex("new", 3, vec![1.; 3]));

        assert_ne!(old, new);
        assert!(doc.accessors().get(old).is_none());
        assert_eq!(doc.accessor(new).name, "new");
    }
}
