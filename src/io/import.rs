use std::path::Path;

use anyhow::{ensure, Context};
use image::{DynamicImage, GrayAlphaImage, GrayImage, RgbImage, RgbaImage};
use itertools::Itertools;
use log::{debug, warn};

use crate::{
    accessor::Accessor,
    document::{Document, MaterialId, MeshId, NodeId, TextureId},
    error::LodError,
    lod::MSFT_LOD,
    material::{AlphaMode, Material, Sampler, Texture, TextureSlot},
    mesh::{Mesh, Primitive},
    node::{Animation, Node},
};

fn decode(data: &gltf::image::Data) -> anyhow::Result<DynamicImage> {
    use gltf::image::Format;

    let (w, h, pixels) = (data.width, data.height, data.pixels.clone());
    let image = match data.format {
        Format::R8 => GrayImage::from_raw(w, h, pixels).map(DynamicImage::from),
        Format::R8G8 => GrayAlphaImage::from_raw(w, h, pixels).map(DynamicImage::from),
        Format::R8G8B8 => RgbImage::from_raw(w, h, pixels).map(DynamicImage::from),
        Format::R8G8B8A8 => RgbaImage::from_raw(w, h, pixels).map(DynamicImage::from),
        other => return Err(LodError::UnsupportedImage(format!("{:?}", other)).into()),
    };
    image.ok_or_else(|| LodError::UnsupportedImage(format!("truncated {}x{} image", w, h)).into())
}

/// `None` for the implicit default sampler
fn sampler(texture: &gltf::Texture) -> Option<Sampler> {
    let sampler = texture.sampler();
    sampler.index()?;
    Some(Sampler {
        mag_filter: sampler.mag_filter().map(|filter| filter.as_gl_enum()),
        min_filter: sampler.min_filter().map(|filter| filter.as_gl_enum()),
        wrap_s: sampler.wrap_s().as_gl_enum(),
        wrap_t: sampler.wrap_t().as_gl_enum(),
    })
}

fn material(material: &gltf::Material, textures: &[TextureId]) -> Material {
    let pbr = material.pbr_metallic_roughness();
    let mut out = Material::new(material.name().unwrap_or_default());
    out.base_color_factor = pbr.base_color_factor();
    out.metallic_factor = pbr.metallic_factor();
    out.roughness_factor = pbr.roughness_factor();
    out.emissive_factor = material.emissive_factor();
    out.alpha_mode = match material.alpha_mode() {
        gltf::material::AlphaMode::Opaque => AlphaMode::Opaque,
        gltf::material::AlphaMode::Mask => AlphaMode::Mask,
        gltf::material::AlphaMode::Blend => AlphaMode::Blend,
    };
    out.alpha_cutoff = material.alpha_cutoff();
    out.double_sided = material.double_sided();

    let normal = material.normal_texture();
    let occlusion = material.occlusion_texture();
    if let Some(normal) = &normal {
        out.normal_scale = normal.scale();
    }
    if let Some(occlusion) = &occlusion {
        out.occlusion_strength = occlusion.strength();
    }
    let slots = [
        (
            TextureSlot::BaseColor,
            pbr.base_color_texture()
                .map(|info| (info.texture().index(), info.tex_coord())),
        ),
        (
            TextureSlot::MetallicRoughness,
            pbr.metallic_roughness_texture()
                .map(|info| (info.texture().index(), info.tex_coord())),
        ),
        (
            TextureSlot::Normal,
            normal.map(|t| (t.texture().index(), t.tex_coord())),
        ),
        (
            TextureSlot::Occlusion,
            occlusion.map(|t| (t.texture().index(), t.tex_coord())),
        ),
        (
            TextureSlot::Emissive,
            material
                .emissive_texture()
                .map(|info| (info.texture().index(), info.tex_coord())),
        ),
    ];
    for (slot, reference) in slots {
        if let Some((index, set)) = reference {
            out.set_texture(slot, textures.get(index).copied());
            out.set_tex_coord(slot, set);
        }
    }
    out
}

/// Loads a `.gltf`/`.glb` file into a [`Document`].
///
/// Only triangle lists are kept. `MSFT_lod` associations in the source are not
/// read back. Skinned primitives (`JOINTS_n`/`WEIGHTS_n`) are refused with
/// [`LodError::UnsupportedAttribute`].
pub fn import<P: AsRef<Path>>(path: P) -> anyhow::Result<Document> {
    let path = path.as_ref();
    ensure!(path.exists(), "{:?} does not exist", path);
    let (gltf, buffers, images) =
        gltf::import(path).with_context(|| format!("failed to load {:?}", path))?;

    let mut doc = Document::new();
    if gltf.extensions_used().any(|name| name == MSFT_LOD) {
        warn!("{:?} declares {}; associations are dropped", path, MSFT_LOD);
    }

    let mut textures: Vec<TextureId> = vec![];
    for texture in gltf.textures() {
        let source = texture.source();
        let name = texture.name().or(source.name()).unwrap_or_default();
        let image = decode(&images[source.index()])
            .with_context(|| format!("texture {} of {:?}", texture.index(), path))?;
        let out = Texture {
            sampler: sampler(&texture),
            ..Texture::new(name, image)
        };
        textures.push(doc.create_texture(out));
    }

    let materials: Vec<MaterialId> = gltf
        .materials()
        .map(|m| doc.create_material(material(&m, &textures)))
        .collect();

    let mut meshes: Vec<MeshId> = vec![];
    for mesh in gltf.meshes() {
        let mut out = Mesh::new(mesh.name().unwrap_or_default());
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                warn!(
                    "skipping {:?} primitive of mesh {:?}",
                    primitive.mode(),
                    mesh.name()
                );
                continue;
            }
            let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));
            let mut p = Primitive::new();
            for (semantic, _) in primitive.attributes() {
                use gltf::Semantic;

                let name = semantic.to_string();
                let read: Option<(usize, Vec<f32>)> = match semantic {
                    Semantic::Positions => {
                        reader.read_positions().map(|v| (3, v.flatten().collect()))
                    }
                    Semantic::Normals => reader.read_normals().map(|v| (3, v.flatten().collect())),
                    Semantic::Tangents => {
                        reader.read_tangents().map(|v| (4, v.flatten().collect()))
                    }
                    Semantic::Colors(set) => reader
                        .read_colors(set)
                        .map(|v| (4, v.into_rgba_f32().flatten().collect())),
                    Semantic::TexCoords(set) => reader
                        .read_tex_coords(set)
                        .map(|v| (2, v.into_f32().flatten().collect())),
                    Semantic::Joints(_) | Semantic::Weights(_) => {
                        return Err(LodError::UnsupportedAttribute(format!(
                            "{} in mesh {:?}; skins are not carried into variants",
                            name,
                            mesh.name()
                        ))
                        .into());
                    }
                    _ => None,
                };
                match read {
                    Some((components, values)) => {
                        let id = doc.create_accessor(Accessor::vertex(&name, components, values));
                        p = p.with_attribute(name, id);
                    }
                    None => warn!("skipping attribute {} of mesh {:?}", name, mesh.name()),
                }
            }
            if let Some(indices) = reader.read_indices() {
                let id = doc.create_accessor(Accessor::indices(
                    "indices",
                    indices.into_u32().collect(),
                ));
                p = p.with_indices(id);
            }
            if let Some(material) = primitive
                .material()
                .index()
                .and_then(|i| materials.get(i).copied())
            {
                p = p.with_material(material);
            }
            out.add_primitive(p);
        }
        meshes.push(doc.create_mesh(out));
    }

    // children may point forward, so indices are assigned before links
    let mut nodes: Vec<NodeId> = vec![];
    for node in gltf.nodes() {
        let (translation, rotation, scale) = node.transform().decomposed();
        let out = Node {
            name: node.name().unwrap_or_default().to_string(),
            mesh: node.mesh().and_then(|mesh| meshes.get(mesh.index()).copied()),
            translation,
            rotation,
            scale,
            ..Default::default()
        };
        nodes.push(doc.create_node(out));
    }
    for node in gltf.nodes() {
        let children = node.children().map(|child| nodes[child.index()]).collect();
        doc.node_mut(nodes[node.index()]).children = children;
    }

    if let Some(scene) = gltf.default_scene().or_else(|| gltf.scenes().next()) {
        for root in scene.nodes() {
            doc.add_scene_root(nodes[root.index()]);
        }
    }

    for animation in gltf.animations() {
        let targets = animation
            .channels()
            .map(|channel| nodes[channel.target().node().index()])
            .unique()
            .collect();
        doc.create_animation(Animation {
            name: animation.name().unwrap_or_default().to_string(),
            targets,
        });
    }

    debug!(
        "imported {:?}: {} nodes, {} meshes, {} materials, {} textures",
        path,
        doc.nodes().len(),
        doc.meshes().len(),
        doc.materials().len(),
        doc.textures().len()
    );
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use serial_test::serial;

    use crate::{
        accessor::Accessor,
        classifier::SharedResourcePolicy,
        document::Document,
        error::LodError,
        io::writer::export,
        material::{
            AlphaMode, Material, Sampler, TextureSlot, CLAMP_TO_EDGE, LINEAR_MIPMAP_LINEAR,
            MIRRORED_REPEAT, NEAREST,
        },
        mesh::{Mesh, POSITION},
        node::Node,
        test_utils::{grid_primitive, solid_texture, textured_scene},
    };

    use super::import;

    #[test]
    fn missing_files_are_reported() {
        let err = import("does/not/exist.gltf").unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    #[serial]
    fn exported_scene_loads_back() {
        let scene = textured_scene(32);
        let dir = std::env::temp_dir().join("mesh-lod-import");
        let _ = std::fs::remove_dir_all(&dir);
        let meta = export(&scene.doc, &dir, "plane", SharedResourcePolicy::default()).unwrap();

        let doc = import(dir.join(&meta.gltf)).unwrap();
        assert_eq!(doc.nodes().len(), 1);
        assert_eq!(doc.meshes().len(), 1);
        assert_eq!(doc.textures().len(), 1);
        assert_eq!(doc.scene_roots().len(), 1);

        let (_, node) = doc.nodes().iter().next().unwrap();
        assert_eq!(node.name, "plane");
        let mesh = doc.mesh(node.mesh.unwrap());
        let primitive = &mesh.primitives[0];
        let source = &scene.doc.mesh(scene.mesh).primitives[0];
        assert_eq!(
            doc.accessor(primitive.attribute(POSITION).unwrap()).as_floats(),
            scene
                .doc
                .accessor(source.attribute(POSITION).unwrap())
                .as_floats()
        );
        let material = doc.material(primitive.material.unwrap());
        let texture = doc.texture(material.texture(TextureSlot::BaseColor).unwrap());
        assert_eq!(texture.size(), (32, 32));
        assert_eq!(texture.name, "albedo");
    }

    #[test]
    #[serial]
    fn material_and_attribute_details_survive_export() {
        let sampler = Sampler {
            mag_filter: Some(NEAREST),
            min_filter: Some(LINEAR_MIPMAP_LINEAR),
            wrap_s: CLAMP_TO_EDGE,
            wrap_t: MIRRORED_REPEAT,
        };
        let mut doc = Document::new();
        let texture = doc.create_texture(solid_texture("albedo", 4, 4).with_sampler(sampler));
        let mut material = Material::new("dielectric")
            .with_texture(TextureSlot::BaseColor, texture)
            .with_texture(TextureSlot::Normal, texture);
        material.metallic_factor = 0.0;
        material.roughness_factor = 0.5;
        material.emissive_factor = [0.25, 0.5, 1.0];
        material.alpha_mode = AlphaMode::Mask;
        material.alpha_cutoff = Some(0.25);
        material.double_sided = true;
        material.normal_scale = 0.5;
        material.set_tex_coord(TextureSlot::BaseColor, 1);
        let material = doc.create_material(material);

        let color = doc.create_accessor(Accessor::vertex("color", 4, vec![0.5; 16]));
        let uv1 = doc.create_accessor(Accessor::vertex("uv1", 2, vec![0.25; 8]));
        let primitive = grid_primitive(&mut doc, 1)
            .with_attribute("COLOR_0", color)
            .with_attribute("TEXCOORD_1", uv1)
            .with_material(material);
        let mesh = doc.create_mesh(Mesh::new("quad").with_primitive(primitive));
        let node = doc.create_node(Node::new("quad").with_mesh(mesh));
        doc.add_scene_root(node);

        let dir = std::env::temp_dir().join("mesh-lod-material");
        let _ = std::fs::remove_dir_all(&dir);
        let meta = export(&doc, &dir, "quad", SharedResourcePolicy::default()).unwrap();
        let back = import(dir.join(&meta.gltf)).unwrap();

        let (_, loaded) = back.materials().iter().next().unwrap();
        assert_eq!(loaded.metallic_factor, 0.0);
        assert_eq!(loaded.roughness_factor, 0.5);
        assert_eq!(loaded.emissive_factor, [0.25, 0.5, 1.0]);
        assert_eq!(loaded.alpha_mode, AlphaMode::Mask);
        assert_eq!(loaded.alpha_cutoff, Some(0.25));
        assert!(loaded.double_sided);
        assert_eq!(loaded.normal_scale, 0.5);
        assert_eq!(loaded.tex_coord(TextureSlot::BaseColor), 1);
        assert_eq!(loaded.tex_coord(TextureSlot::Normal), 0);
        let texture = back.texture(loaded.texture(TextureSlot::BaseColor).unwrap());
        assert_eq!(texture.sampler, Some(sampler));

        let (_, mesh) = back.meshes().iter().next().unwrap();
        let primitive = &mesh.primitives[0];
        let floats = |semantic: &str| {
            back.accessor(primitive.attribute(semantic).unwrap())
                .as_floats()
                .unwrap()
                .to_vec()
        };
        assert_eq!(floats("COLOR_0"), vec![0.5; 16]);
        assert_eq!(floats("TEXCOORD_1"), vec![0.25; 8]);
    }

    #[test]
    #[serial]
    fn skinned_primitives_are_refused() {
        let dir = std::env::temp_dir().join("mesh-lod-skinned");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let positions: [f32; 9] = [0., 0., 0., 1., 0., 0., 0., 1., 0.];
        let mut data: Vec<u8> = bytemuck::cast_slice(&positions).to_vec();
        data.extend_from_slice(&[0u8; 12]);
        std::fs::write(dir.join("skinned.bin"), &data).unwrap();
        let gltf = json!({
            "asset": { "version": "2.0" },
            "buffers": [{ "uri": "skinned.bin", "byteLength": 48 }],
            "bufferViews": [
                { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
                { "buffer": 0, "byteOffset": 36, "byteLength": 12 }
            ],
            "accessors": [
                {
                    "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                    "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
                },
                { "bufferView": 1, "componentType": 5121, "count": 3, "type": "VEC4" }
            ],
            "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0, "JOINTS_0": 1 } }] }],
            "nodes": [{ "mesh": 0 }],
            "scenes": [{ "nodes": [0] }],
            "scene": 0
        });
        std::fs::write(dir.join("skinned.gltf"), gltf.to_string()).unwrap();

        let err = import(dir.join("skinned.gltf")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LodError>(),
            Some(LodError::UnsupportedAttribute(_))
        ));
    }
}
