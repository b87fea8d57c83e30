use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fs::create_dir_all,
    path::Path,
};

use anyhow::Context;
use gltf::json;
use image::DynamicImage;
use json::validation::{Checked::Valid, USize64};
use log::{info, warn};

use crate::{
    accessor::Accessor,
    bounding_box::BoundingBox,
    classifier::SharedResourcePolicy,
    document::{AccessorId, Document, MaterialId, MeshId, TextureId},
    extension::LodExtension,
    io::context::WriterContext,
    material::{
        AlphaMode, Material, Sampler, TextureSlot, CLAMP_TO_EDGE, LINEAR, LINEAR_MIPMAP_LINEAR,
        LINEAR_MIPMAP_NEAREST, MIRRORED_REPEAT, NEAREST, NEAREST_MIPMAP_LINEAR,
        NEAREST_MIPMAP_NEAREST,
    },
    mesh::{Primitive, NORMAL, POSITION, TANGENT},
    meta::Meta,
};

/// One binary buffer holding every accessor classified at `level`
#[derive(Clone, Debug)]
pub struct LevelBuffer {
    pub level: usize,
    pub uri: String,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct WrittenImage {
    pub level: usize,
    pub uri: String,
    pub texture: TextureId,
}

/// Serialized form of a document, not yet on disk.
#[derive(Clone, Debug)]
pub struct WrittenAsset {
    pub context: WriterContext,
    pub buffers: Vec<LevelBuffer>,
    pub images: Vec<WrittenImage>,
    pub bounds: Option<BoundingBox>,
}

/// glTF array positions of every serialized property. Accessors without
/// elements are left out.
struct IndexMaps {
    meshes: HashMap<MeshId, json::Index<json::Mesh>>,
    materials: HashMap<MaterialId, json::Index<json::Material>>,
    textures: HashMap<TextureId, json::Index<json::Texture>>,
    accessors: HashMap<AccessorId, json::Index<json::Accessor>>,
}

impl IndexMaps {
    fn new(doc: &Document) -> Self {
        fn enumerate<K: slotmap::Key, T>(
            ids: impl Iterator<Item = K>,
        ) -> HashMap<K, json::Index<T>> {
            ids.enumerate()
                .map(|(i, id)| (id, json::Index::new(i as u32)))
                .collect()
        }
        Self {
            meshes: enumerate(doc.meshes().keys()),
            materials: enumerate(doc.materials().keys()),
            textures: enumerate(doc.textures().keys()),
            accessors: enumerate(written_accessors(doc).map(|(id, _)| id)),
        }
    }
}

fn written_accessors(doc: &Document) -> impl Iterator<Item = (AccessorId, &Accessor)> {
    doc.accessors()
        .iter()
        .filter(|(_, accessor)| accessor.count() > 0)
}

fn optional_name(name: &str) -> Option<String> {
    (!name.is_empty()).then(|| name.to_string())
}

/// Maps an attribute name to its glTF semantic. Unknown names give `None`.
fn semantic(name: &str) -> Option<json::mesh::Semantic> {
    use json::mesh::Semantic;

    let set = |prefix: &str| name.strip_prefix(prefix)?.parse::<u32>().ok();
    let semantic = match name {
        POSITION => Semantic::Positions,
        NORMAL => Semantic::Normals,
        TANGENT => Semantic::Tangents,
        _ => set("COLOR_")
            .map(Semantic::Colors)
            .or_else(|| set("TEXCOORD_").map(Semantic::TexCoords))
            .or_else(|| set("JOINTS_").map(Semantic::Joints))
            .or_else(|| set("WEIGHTS_").map(Semantic::Weights))
            .or_else(|| {
                name.strip_prefix('_')
                    .map(|extra| Semantic::Extras(extra.to_string()))
            })?,
    };
    Some(semantic)
}

fn primitive_def(primitive: &Primitive, maps: &IndexMaps) -> Option<json::mesh::Primitive> {
    // a primitive with an empty accessor draws nothing
    if primitive.accessors().any(|id| !maps.accessors.contains_key(&id)) {
        return None;
    }
    let mut attributes = BTreeMap::new();
    for (name, id) in &primitive.attributes {
        let Some(semantic) = semantic(name) else {
            warn!("attribute {} has no glTF semantic and is not written", name);
            continue;
        };
        attributes.insert(Valid(semantic), maps.accessors[id]);
    }
    Some(json::mesh::Primitive {
        attributes,
        indices: primitive.indices.map(|id| maps.accessors[&id]),
        material: primitive
            .material
            .and_then(|id| maps.materials.get(&id).copied()),
        mode: Valid(json::mesh::Mode::Triangles),
        targets: None,
        extensions: Default::default(),
        extras: Default::default(),
    })
}

fn material_def(material: &Material, maps: &IndexMaps) -> json::Material {
    use json::material::{
        AlphaCutoff, EmissiveFactor, NormalTexture, OcclusionTexture, PbrBaseColorFactor,
        PbrMetallicRoughness, StrengthFactor,
    };

    let texture = |slot: TextureSlot| {
        material
            .texture(slot)
            .and_then(|id| maps.textures.get(&id).copied())
            .map(|index| (index, material.tex_coord(slot)))
    };
    let info = |slot: TextureSlot| {
        texture(slot).map(|(index, tex_coord)| json::texture::Info {
            index,
            tex_coord,
            extensions: Default::default(),
            extras: Default::default(),
        })
    };

    json::Material {
        name: optional_name(&material.name),
        alpha_mode: Valid(match material.alpha_mode {
            AlphaMode::Opaque => json::material::AlphaMode::Opaque,
            AlphaMode::Mask => json::material::AlphaMode::Mask,
            AlphaMode::Blend => json::material::AlphaMode::Blend,
        }),
        alpha_cutoff: material.alpha_cutoff.map(AlphaCutoff),
        double_sided: material.double_sided,
        pbr_metallic_roughness: PbrMetallicRoughness {
            base_color_factor: PbrBaseColorFactor(material.base_color_factor),
            base_color_texture: info(TextureSlot::BaseColor),
            metallic_factor: StrengthFactor(material.metallic_factor),
            roughness_factor: StrengthFactor(material.roughness_factor),
            metallic_roughness_texture: info(TextureSlot::MetallicRoughness),
            ..Default::default()
        },
        normal_texture: texture(TextureSlot::Normal).map(|(index, tex_coord)| NormalTexture {
            index,
            scale: material.normal_scale,
            tex_coord,
            extensions: Default::default(),
            extras: Default::default(),
        }),
        occlusion_texture: texture(TextureSlot::Occlusion).map(|(index, tex_coord)| {
            OcclusionTexture {
                index,
                strength: StrengthFactor(material.occlusion_strength),
                tex_coord,
                extensions: Default::default(),
                extras: Default::default(),
            }
        }),
        emissive_texture: info(TextureSlot::Emissive),
        emissive_factor: EmissiveFactor(material.emissive_factor),
        ..Default::default()
    }
}

fn sampler_def(sampler: &Sampler) -> json::texture::Sampler {
    use json::texture::{MagFilter, MinFilter, WrappingMode};

    let mag_filter = sampler.mag_filter.and_then(|code| match code {
        NEAREST => Some(MagFilter::Nearest),
        LINEAR => Some(MagFilter::Linear),
        _ => None,
    });
    let min_filter = sampler.min_filter.and_then(|code| match code {
        NEAREST => Some(MinFilter::Nearest),
        LINEAR => Some(MinFilter::Linear),
        NEAREST_MIPMAP_NEAREST => Some(MinFilter::NearestMipmapNearest),
        LINEAR_MIPMAP_NEAREST => Some(MinFilter::LinearMipmapNearest),
        NEAREST_MIPMAP_LINEAR => Some(MinFilter::NearestMipmapLinear),
        LINEAR_MIPMAP_LINEAR => Some(MinFilter::LinearMipmapLinear),
        _ => None,
    });
    let wrap = |code| match code {
        CLAMP_TO_EDGE => WrappingMode::ClampToEdge,
        MIRRORED_REPEAT => WrappingMode::MirroredRepeat,
        _ => WrappingMode::Repeat,
    };
    json::texture::Sampler {
        mag_filter: mag_filter.map(Valid),
        min_filter: min_filter.map(Valid),
        wrap_s: Valid(wrap(sampler.wrap_s)),
        wrap_t: Valid(wrap(sampler.wrap_t)),
        name: None,
        extensions: Default::default(),
        extras: Default::default(),
    }
}

/// Serializes `doc` to glTF JSON.
///
/// Nodes get their indices first, then the extensions run `prewrite` and
/// `write`, and finally accessors and images are laid out by the level the
/// classification gave them: one buffer per level, `<stem>_lod<L>.bin`.
/// Accessors without elements are not written, nor are the primitives using
/// them.
pub fn write_document(
    doc: &Document,
    stem: &str,
    policy: SharedResourcePolicy,
) -> anyhow::Result<WrittenAsset> {
    let mut context = WriterContext::new(policy);
    let maps = IndexMaps::new(doc);
    let root = &mut context.json;
    root.asset = json::Asset {
        generator: Some(format!("mesh-lod {}", env!("CARGO_PKG_VERSION"))),
        ..Default::default()
    };

    let node_indices: HashMap<_, _> = doc
        .nodes()
        .keys()
        .enumerate()
        .map(|(i, id)| (id, json::Index::<json::Node>::new(i as u32)))
        .collect();
    for (_, node) in doc.nodes().iter() {
        let children: Vec<_> = node
            .children
            .iter()
            .filter_map(|child| node_indices.get(child).copied())
            .collect();
        let identity = node.has_identity_transform();
        root.push(json::Node {
            name: optional_name(&node.name),
            mesh: node.mesh.and_then(|mesh| maps.meshes.get(&mesh).copied()),
            children: (!children.is_empty()).then_some(children),
            translation: (!identity).then_some(node.translation),
            rotation: (!identity).then_some(json::scene::UnitQuaternion(node.rotation)),
            scale: (!identity).then_some(node.scale),
            ..Default::default()
        });
    }
    let scene = root.push(json::Scene {
        nodes: doc
            .scene_roots()
            .iter()
            .filter_map(|root| node_indices.get(root).copied())
            .collect(),
        name: None,
        extensions: Default::default(),
        extras: Default::default(),
    });
    root.scene = Some(scene);
    root.extensions_used = doc.extensions_used().map(str::to_string).collect();

    for (_, mesh) in doc.meshes().iter() {
        let primitives = mesh
            .primitives
            .iter()
            .filter_map(|primitive| {
                let def = primitive_def(primitive, &maps);
                if def.is_none() {
                    warn!("dropping a primitive of {:?}: it has an empty accessor", mesh.name);
                }
                def
            })
            .collect();
        root.push(json::Mesh {
            name: optional_name(&mesh.name),
            primitives,
            weights: None,
            extensions: Default::default(),
            extras: Default::default(),
        });
    }
    for (_, material) in doc.materials().iter() {
        root.push(material_def(material, &maps));
    }

    for (id, index) in node_indices {
        context.set_node_index(id, index.value());
    }
    let extension = LodExtension;
    if doc.extensions_used().any(|name| name == LodExtension::NAME) {
        extension.prewrite(doc, &mut context);
        extension.write(doc, &mut context)?;
    }

    let (buffers, bounds) = layout_accessors(doc, stem, &mut context)?;
    let images = layout_images(doc, stem, &mut context);

    Ok(WrittenAsset {
        context,
        buffers,
        images,
        bounds,
    })
}

fn level_uri(stem: &str, level: usize) -> String {
    format!("{}_lod{}.bin", stem, level)
}

/// Appends every non-empty accessor to the buffer of its level. Unclassified
/// accessors belong to level 0.
fn layout_accessors(
    doc: &Document,
    stem: &str,
    context: &mut WriterContext,
) -> anyhow::Result<(Vec<LevelBuffer>, Option<BoundingBox>)> {
    let level_of = |id: AccessorId| context.classification.accessor_level(id).unwrap_or(0);
    let max_level = written_accessors(doc)
        .map(|(id, _)| level_of(id))
        .max()
        .unwrap_or(0)
        .max(context.classification.max_level());

    let mut groups: Vec<Vec<u8>> = vec![vec![]; max_level + 1];
    let mut placements = vec![];
    for (id, accessor) in written_accessors(doc) {
        let level = level_of(id);
        let data = &mut groups[level];
        let offset = data.len();
        let bytes = accessor.to_bytes();
        data.extend_from_slice(&bytes);
        placements.push((level, offset, bytes.len()));
    }

    // empty levels get no buffer
    let mut buffer_index = vec![None; groups.len()];
    let mut buffers = vec![];
    for (level, data) in groups.into_iter().enumerate() {
        if data.is_empty() {
            continue;
        }
        buffer_index[level] = Some(json::Index::<json::Buffer>::new(buffers.len() as u32));
        buffers.push(LevelBuffer {
            level,
            uri: level_uri(stem, level),
            data,
        });
    }

    let position_accessors: HashSet<AccessorId> = doc
        .meshes()
        .iter()
        .flat_map(|(_, mesh)| mesh.primitives.iter().filter_map(|p| p.attribute(POSITION)))
        .collect();

    let root = &mut context.json;
    let mut bounds: Option<BoundingBox> = None;
    for ((id, accessor), (level, offset, length)) in written_accessors(doc).zip(placements) {
        let buffer = buffer_index[level]
            .with_context(|| format!("level {} holds {:?} but has no buffer", level, id))?;
        let target = match accessor.is_index() {
            true => json::buffer::Target::ElementArrayBuffer,
            false => json::buffer::Target::ArrayBuffer,
        };
        let view = root.push(json::buffer::View {
            buffer,
            byte_length: USize64::from(length),
            byte_offset: Some(USize64::from(offset)),
            byte_stride: None,
            target: Some(Valid(target)),
            name: None,
            extensions: Default::default(),
            extras: Default::default(),
        });

        let (min, max) = match position_accessors.contains(&id) {
            true => {
                let accessor_bounds =
                    BoundingBox::from_positions(accessor.as_floats().unwrap_or_default());
                if let Some(b) = &accessor_bounds {
                    bounds = Some(match &bounds {
                        Some(all) => all.union(b),
                        None => b.clone(),
                    });
                }
                match accessor_bounds.map(|b| b.to_min_max()) {
                    Some((min, max)) => {
                        (Some(json::Value::from(min)), Some(json::Value::from(max)))
                    }
                    None => (None, None),
                }
            }
            false => (None, None),
        };
        let element_type = accessor
            .element_type()
            .with_context(|| format!("cannot serialize accessor {:?}", id))?;
        root.push(json::Accessor {
            buffer_view: Some(view),
            byte_offset: Some(USize64(0)),
            count: USize64::from(accessor.count()),
            component_type: Valid(json::accessor::GenericComponentType(
                accessor.component_type(),
            )),
            type_: Valid(element_type),
            min,
            max,
            name: optional_name(&accessor.name),
            normalized: false,
            sparse: None,
            extensions: Default::default(),
            extras: Default::default(),
        });
    }

    root.buffers = buffers
        .iter()
        .map(|buffer| json::Buffer {
            byte_length: USize64::from(buffer.data.len()),
            uri: Some(buffer.uri.clone()),
            name: None,
            extensions: Default::default(),
            extras: Default::default(),
        })
        .collect();
    Ok((buffers, bounds))
}

/// One PNG per texture, named after the level that owns it. Identical samplers
/// are written once.
fn layout_images(doc: &Document, stem: &str, context: &mut WriterContext) -> Vec<WrittenImage> {
    let mut samplers: HashMap<Sampler, json::Index<json::texture::Sampler>> = HashMap::new();
    let mut images = vec![];
    for (i, (id, texture)) in doc.textures().iter().enumerate() {
        let level = context.classification.texture_level(id).unwrap_or(0);
        let uri = format!("{}_lod{}_{}.png", stem, level, i);
        let root = &mut context.json;
        let source = root.push(json::Image {
            name: optional_name(&texture.name),
            uri: Some(uri.clone()),
            mime_type: None,
            buffer_view: None,
            extensions: Default::default(),
            extras: Default::default(),
        });
        let sampler = texture.sampler.map(|sampler| {
            *samplers
                .entry(sampler)
                .or_insert_with(|| root.push(sampler_def(&sampler)))
        });
        root.push(json::Texture {
            name: optional_name(&texture.name),
            source,
            sampler,
            extensions: Default::default(),
            extras: Default::default(),
        });
        images.push(WrittenImage {
            level,
            uri,
            texture: id,
        });
    }
    images
}

/// Writes `<stem>.gltf` into `dir`, next to its per-level buffers, PNG images
/// and `meta.json`.
pub fn export<P: AsRef<Path>>(
    doc: &Document,
    dir: P,
    stem: &str,
    policy: SharedResourcePolicy,
) -> anyhow::Result<Meta> {
    let dir = dir.as_ref();
    create_dir_all(dir).with_context(|| format!("failed to create {:?}", dir))?;

    let asset = write_document(doc, stem, policy)?;
    for buffer in &asset.buffers {
        std::fs::write(dir.join(&buffer.uri), &buffer.data)
            .with_context(|| format!("failed to write {}", buffer.uri))?;
    }
    for image in &asset.images {
        let texture = doc.texture(image.texture);
        let rgba = DynamicImage::from(texture.image.to_rgba8());
        rgba.save_with_format(dir.join(&image.uri), image::ImageFormat::Png)
            .with_context(|| format!("failed to write {}", image.uri))?;
    }

    let gltf = format!("{}.gltf", stem);
    let json = serde_json::to_string_pretty(&asset.context.json)?;
    std::fs::write(dir.join(&gltf), json).with_context(|| format!("failed to write {}", gltf))?;

    let meta = Meta::new(
        asset.context.classification.max_level(),
        gltf,
        asset.buffers.iter().map(|b| b.uri.clone()).collect(),
        asset.images.iter().map(|i| i.uri.clone()).collect(),
        asset.bounds.clone(),
    );
    write_meta(&meta, dir)?;
    info!(
        "exported {} with {} buffers and {} images",
        meta.gltf,
        meta.buffers.len(),
        meta.images.len()
    );
    Ok(meta)
}

/// Writes `meta` as `meta.json` into `dir`.
pub fn write_meta<P: AsRef<Path>>(meta: &Meta, dir: P) -> anyhow::Result<()> {
    let path = dir.as_ref().join("meta.json");
    let json = serde_json::to_string(meta)?;
    std::fs::write(&path, json).with_context(|| format!("failed to write {:?}", path))?;
    Ok(())
}
