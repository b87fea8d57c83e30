use anyhow::ensure;
use gltf::json;
use log::{debug, warn};
use serde_json::{json, value::RawValue, Map, Value};

use crate::{
    document::{Document, ExtensionProperty, LodId, NodeId},
    error::LodError,
    io::context::{WriteStage, WriterContext},
    lod::{Lod, LodParent, MSFT_LOD, MSFT_SCREEN_COVERAGE},
};

/// The `MSFT_lod` extension: creates associations and serializes them.
///
/// Serialization runs in two steps over a [`WriterContext`]: `prewrite` tags
/// every accessor and texture with the level that owns it, `write` emits the
/// extension block on every node parent. Reading the extension back is not
/// supported.
#[derive(Clone, Copy, Debug, Default)]
pub struct LodExtension;

impl LodExtension {
    pub const NAME: &'static str = MSFT_LOD;

    /// Declares the extension on `doc` and returns a handle to it.
    pub fn register(doc: &mut Document) -> Self {
        doc.register_extension(Self::NAME);
        LodExtension
    }

    pub fn create_lod(&self, doc: &mut Document, name: impl Into<String>) -> LodId {
        doc.create_lod(Lod::new(name))
    }

    /// all associations known to the document
    pub fn properties(&self, doc: &Document) -> Vec<LodId> {
        doc.lods().keys().collect()
    }

    /// Appends `node` as the next level of `lod`. A node holding `lod` itself is
    /// rejected.
    pub fn add_variant(&self, doc: &mut Document, lod: LodId, node: NodeId) -> anyhow::Result<()> {
        ensure!(
            doc.node(node).extensions.get(Self::NAME) != Some(&ExtensionProperty::Lod(lod)),
            LodError::InvalidAssociation(format!("node {:?} cannot be its own variant", node))
        );
        doc.lod_mut(lod).add_variant(node);
        Ok(())
    }

    /// Attaches `lod` under the `MSFT_lod` slot of `parent`.
    pub fn attach(&self, doc: &mut Document, parent: LodParent, lod: LodId) -> anyhow::Result<()> {
        let property = ExtensionProperty::Lod(lod);
        match parent {
            LodParent::Node(node) => {
                ensure!(
                    !doc.lod(lod).list_variants().contains(&node),
                    LodError::InvalidAssociation(format!(
                        "node {:?} cannot be its own variant",
                        node
                    ))
                );
                doc.node_mut(node)
                    .extensions
                    .insert(Self::NAME.to_string(), property);
            }
            LodParent::Material(material) => {
                doc.material_mut(material)
                    .extensions
                    .insert(Self::NAME.to_string(), property);
            }
        }
        Ok(())
    }

    /// Always fails: `MSFT_lod` is written but never read.
    pub fn read(&self, _doc: &mut Document, _root: &json::Root) -> anyhow::Result<()> {
        Err(LodError::Unimplemented("MSFT_lod: read()").into())
    }

    /// Classifies every association's resources: parents at level 0, variant `i`
    /// at level `i + 1`. Also records the largest variant count.
    pub fn prewrite(&self, doc: &Document, context: &mut WriterContext) {
        context.classification.clear();

        for lod_id in self.properties(doc) {
            let lod = doc.lod(lod_id);
            for parent in doc.lod_parents(lod_id) {
                if let LodParent::Node(node) = parent {
                    context.classification.classify(doc, node, 0);
                }
            }
            for (i, &variant) in lod.list_variants().iter().enumerate() {
                context.classification.classify(doc, variant, i + 1);
            }
            context
                .classification
                .observe_variant_count(lod.list_variants().len());
        }

        debug!(
            "prewrite: max level {}",
            context.classification.max_level()
        );
        context.advance(WriteStage::Prewritten);
    }

    /// Emits `extensions.MSFT_lod.ids` and `extras.MSFT_screencoverage` on every
    /// serialized node that holds an association.
    pub fn write(&self, doc: &Document, context: &mut WriterContext) -> anyhow::Result<()> {
        if context.stage() != WriteStage::Prewritten {
            warn!("MSFT_lod written without prewrite; resources stay unclassified");
        }

        for lod_id in self.properties(doc) {
            let lod = doc.lod(lod_id);
            let ids: Vec<Option<usize>> = lod
                .list_variants()
                .iter()
                .map(|&variant| resolve(context, variant))
                .collect();
            let coverages = lod.list_coverages().to_vec();
            if !coverages.is_empty() && coverages.len() != lod.level_count() {
                warn!(
                    "{:?} has {} coverages for {} levels",
                    lod.name(),
                    coverages.len(),
                    lod.level_count()
                );
            }

            for parent in doc.lod_parents(lod_id) {
                let LodParent::Node(parent) = parent else {
                    continue;
                };
                let Some(index) = context.node_index(parent) else {
                    warn!("LOD parent {:?} was not serialized", parent);
                    continue;
                };
                let Some(node_def) = context.json.nodes.get_mut(index) else {
                    warn!("no serialized node at index {}", index);
                    continue;
                };
                node_def
                    .extensions
                    .get_or_insert_with(Default::default)
                    .others
                    .insert(Self::NAME.to_string(), json!({ "ids": ids }));
                insert_extra(
                    &mut node_def.extras,
                    MSFT_SCREEN_COVERAGE,
                    Value::from(coverages.clone()),
                )?;
            }
        }

        context.advance(WriteStage::Written);
        Ok(())
    }
}

/// Sets `key` in a node's `extras` object, keeping whatever else it holds.
fn insert_extra(
    extras: &mut Option<Box<RawValue>>,
    key: &str,
    value: Value,
) -> anyhow::Result<()> {
    let mut map: Map<String, Value> = match extras.take() {
        Some(raw) => serde_json::from_str(raw.get())?,
        None => Map::new(),
    };
    map.insert(key.to_string(), value);
    *extras = Some(serde_json::value::to_raw_value(&map)?);
    Ok(())
}

fn resolve(context: &WriterContext, node: NodeId) -> Option<usize> {
    let index = context.node_index(node);
    if index.is_none() {
        warn!("LOD variant {:?} has no serialized index", node);
    }
    index
}

#[cfg(test)]
mod tests {
    use gltf::json;
    use serde_json::{json, Value};

    use crate::{
        classifier::SharedResourcePolicy,
        document::Document,
        error::LodError,
        io::context::{WriteStage, WriterContext},
        lod::LodParent,
        material::{Material, TextureSlot},
        mesh::Mesh,
        node::Node,
        test_utils::{grid_primitive, solid_texture},
        transforms::dedup,
    };

    use super::LodExtension;

    struct Fixture {
        doc: Document,
        extension: LodExtension,
        parent: crate::document::NodeId,
        variants: Vec<crate::document::NodeId>,
    }

    fn fixture() -> Fixture {
        let mut doc = Document::new();
        let extension = LodExtension::register(&mut doc);
        let mut meshes = vec![];
        for name in ["tree", "tree_LOD1", "tree_LOD2"] {
            let primitive = grid_primitive(&mut doc, 2);
            meshes.push(doc.create_mesh(Mesh::new(name).with_primitive(primitive)));
        }
        let parent = doc.create_node(Node::new("tree").with_mesh(meshes[0]));
        let variants: Vec<_> = meshes[1..]
            .iter()
            .map(|&mesh| doc.create_node(Node::new(doc.mesh(mesh).name.clone()).with_mesh(mesh)))
            .collect();

        let lod = extension.create_lod(&mut doc, "");
        for &variant in &variants {
            extension.add_variant(&mut doc, lod, variant).unwrap();
        }
        doc.lod_mut(lod).set_coverages(vec![0.7, 0.3, 0.0]);
        extension
            .attach(&mut doc, LodParent::Node(parent), lod)
            .unwrap();
        Fixture {
            doc,
            extension,
            parent,
            variants,
        }
    }

    fn context_for(doc: &Document) -> WriterContext {
        let mut context = WriterContext::new(SharedResourcePolicy::default());
        for (i, (id, node)) in doc.nodes().iter().enumerate() {
            context.set_node_index(id, i);
            context.json.nodes.push(json::Node {
                name: Some(node.name.clone()),
                ..Default::default()
            });
        }
        context
    }

    fn lod_block(node: &json::Node) -> Option<&Value> {
        node.extensions.as_ref()?.others.get("MSFT_lod")
    }

    fn extras(node: &json::Node) -> Value {
        serde_json::from_str(node.extras.as_ref().unwrap().get()).unwrap()
    }

    #[test]
    fn read_is_unsupported() {
        let mut fixture = fixture();
        let err = fixture
            .extension
            .read(&mut fixture.doc, &json::Root::default())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LodError>(),
            Some(LodError::Unimplemented(_))
        ));
    }

    #[test]
    fn prewrite_classifies_levels() {
        let fixture = fixture();
        let doc = &fixture.doc;
        let mut context = context_for(doc);
        fixture.extension.prewrite(doc, &mut context);

        assert_eq!(context.stage(), WriteStage::Prewritten);
        assert_eq!(context.classification.max_level(), 2);
        let level_of = |node| {
            let mesh = doc.node(node).mesh.unwrap();
            let accessor = doc.mesh(mesh).primitives[0].indices.unwrap();
            context.classification.accessor_level(accessor)
        };
        assert_eq!(level_of(fixture.parent), Some(0));
        assert_eq!(level_of(fixture.variants[0]), Some(1));
        assert_eq!(level_of(fixture.variants[1]), Some(2));
    }

    #[test]
    fn write_emits_ids_and_coverages() {
        let fixture = fixture();
        let doc = &fixture.doc;
        let mut context = context_for(doc);
        fixture.extension.prewrite(doc, &mut context);
        fixture.extension.write(doc, &mut context).unwrap();

        assert_eq!(context.stage(), WriteStage::Written);
        let parent = &context.json.nodes[context.node_index(fixture.parent).unwrap()];
        assert_eq!(lod_block(parent), Some(&json!({ "ids": [1, 2] })));
        assert_eq!(extras(parent)["MSFT_screencoverage"], json!([0.7, 0.3, 0.0]));
        let variant = &context.json.nodes[1];
        assert!(variant.extensions.is_none());
    }

    #[test]
    fn every_node_parent_gets_its_own_copy() {
        let mut fixture = fixture();
        let mesh = fixture.doc.node(fixture.parent).mesh.unwrap();
        let twin = fixture.doc.create_node(Node::new("twin").with_mesh(mesh));
        let lod = fixture.extension.properties(&fixture.doc)[0];
        fixture
            .extension
            .attach(&mut fixture.doc, LodParent::Node(twin), lod)
            .unwrap();

        let mut context = context_for(&fixture.doc);
        fixture.extension.prewrite(&fixture.doc, &mut context);
        fixture.extension.write(&fixture.doc, &mut context).unwrap();
        for node in [fixture.parent, twin] {
            let def = &context.json.nodes[context.node_index(node).unwrap()];
            assert_eq!(lod_block(def), Some(&json!({ "ids": [1, 2] })));
        }
    }

    #[test]
    fn write_without_prewrite_is_unclassified() {
        let fixture = fixture();
        let mut context = context_for(&fixture.doc);
        fixture.extension.write(&fixture.doc, &mut context).unwrap();
        assert!(context.classification.is_empty());
        assert!(lod_block(&context.json.nodes[0]).is_some());
    }

    #[test]
    fn unresolved_variants_are_null() {
        let fixture = fixture();
        let mut context = WriterContext::default();
        context.set_node_index(fixture.parent, 0);
        context.json.nodes.push(json::Node::default());
        fixture.extension.prewrite(&fixture.doc, &mut context);
        fixture.extension.write(&fixture.doc, &mut context).unwrap();
        assert_eq!(
            lod_block(&context.json.nodes[0]),
            Some(&json!({ "ids": [null, null] }))
        );
    }

    #[test]
    fn a_node_cannot_be_its_own_variant() {
        let mut fixture = fixture();
        let lod = fixture.extension.properties(&fixture.doc)[0];
        let variant = fixture.variants[0];
        let err = fixture
            .extension
            .attach(&mut fixture.doc, LodParent::Node(variant), lod)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LodError>(),
            Some(LodError::InvalidAssociation(_))
        ));
    }

    #[test]
    fn a_parent_cannot_be_added_as_a_variant() {
        let mut fixture = fixture();
        let lod = fixture.extension.properties(&fixture.doc)[0];
        let parent = fixture.parent;
        let err = fixture
            .extension
            .add_variant(&mut fixture.doc, lod, parent)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LodError>(),
            Some(LodError::InvalidAssociation(_))
        ));
        assert_eq!(fixture.doc.lod(lod).list_variants(), &fixture.variants[..]);
    }

    #[test]
    fn existing_extras_are_kept() {
        let fixture = fixture();
        let mut context = context_for(&fixture.doc);
        let index = context.node_index(fixture.parent).unwrap();
        context.json.nodes[index].extras =
            Some(serde_json::value::to_raw_value(&json!({ "author": "me" })).unwrap());
        fixture.extension.prewrite(&fixture.doc, &mut context);
        fixture.extension.write(&fixture.doc, &mut context).unwrap();

        let extras = extras(&context.json.nodes[index]);
        assert_eq!(extras["author"], json!("me"));
        assert_eq!(extras["MSFT_screencoverage"], json!([0.7, 0.3, 0.0]));
    }

    #[test]
    fn material_parents_are_kept_but_not_written() {
        let mut fixture = fixture();
        let lod = fixture.extension.properties(&fixture.doc)[0];
        let texture = fixture.doc.create_texture(solid_texture("detail", 4, 4));
        let material = fixture
            .doc
            .create_material(Material::new("detail").with_texture(TextureSlot::BaseColor, texture));
        fixture
            .extension
            .attach(&mut fixture.doc, LodParent::Material(material), lod)
            .unwrap();
        assert_eq!(
            fixture.doc.lod_parents(lod),
            vec![LodParent::Node(fixture.parent), LodParent::Material(material)]
        );

        let mut context = context_for(&fixture.doc);
        fixture.extension.prewrite(&fixture.doc, &mut context);
        assert_eq!(context.classification.texture_level(texture), None);
        fixture.extension.write(&fixture.doc, &mut context).unwrap();
        let blocks = context
            .json
            .nodes
            .iter()
            .filter(|node| lod_block(node).is_some())
            .count();
        assert_eq!(blocks, 1);

        // no primitive uses the material, only the association holds it
        assert_eq!(fixture.doc.prune(), 0);
        dedup(&mut fixture.doc);
        assert!(fixture.doc.materials().contains_key(material));
        assert!(fixture.doc.textures().contains_key(texture));
    }
}
