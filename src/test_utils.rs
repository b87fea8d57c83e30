use image::{DynamicImage, Rgba, RgbaImage};

use crate::{
    accessor::Accessor,
    document::{Document, MaterialId, MeshId, NodeId, TextureId},
    material::{Material, Texture, TextureSlot},
    mesh::{Mesh, Primitive, NORMAL, POSITION, TEXCOORD_0},
    node::Node,
    simplifier::Simplifier,
};

/// Flat `n` x `n` quad grid on the XY plane, indexed, with normals and uvs.
pub fn grid_primitive(doc: &mut Document, n: u32) -> Primitive {
    let side = n + 1;
    let mut positions = vec![];
    let mut normals = vec![];
    let mut uvs = vec![];
    for y in 0..side {
        for x in 0..side {
            let u = x as f32 / n as f32;
            let v = y as f32 / n as f32;
            positions.extend_from_slice(&[u, v, 0.0]);
            normals.extend_from_slice(&[0.0, 0.0, 1.0]);
            uvs.extend_from_slice(&[u, v]);
        }
    }
    let mut indices = vec![];
    for y in 0..n {
        for x in 0..n {
            let i = y * side + x;
            indices.extend_from_slice(&[i, i + 1, i + side, i + 1, i + side + 1, i + side]);
        }
    }

    let position = doc.create_accessor(Accessor::vertex("position", 3, positions));
    let normal = doc.create_accessor(Accessor::vertex("normal", 3, normals));
    let uv = doc.create_accessor(Accessor::vertex("uv", 2, uvs));
    let indices = doc.create_accessor(Accessor::indices("indices", indices));
    Primitive::new()
        .with_attribute(POSITION, position)
        .with_attribute(NORMAL, normal)
        .with_attribute(TEXCOORD_0, uv)
        .with_indices(indices)
}

pub fn solid_texture(name: &str, width: u32, height: u32) -> Texture {
    let image = RgbaImage::from_pixel(width, height, Rgba([200, 120, 40, 255]));
    Texture::new(name, DynamicImage::from(image))
}

pub fn gradient_texture(name: &str, width: u32, height: u32) -> Texture {
    let image = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255])
    });
    Texture::new(name, DynamicImage::from(image))
}

pub struct TexturedScene {
    pub doc: Document,
    pub node: NodeId,
    pub mesh: MeshId,
    pub material: MaterialId,
    pub texture: TextureId,
}

/// One node, one mesh with a single grid primitive and a base-color textured material.
pub fn textured_scene(texture_size: u32) -> TexturedScene {
    let mut doc = Document::new();
    let texture = doc.create_texture(gradient_texture("albedo", texture_size, texture_size));
    let material = doc.create_material(
        Material::new("surface").with_texture(TextureSlot::BaseColor, texture),
    );
    let primitive = grid_primitive(&mut doc, 8).with_material(material);
    let mesh = doc.create_mesh(Mesh::new("plane").with_primitive(primitive));
    let node = doc.create_node(Node::new("plane").with_mesh(mesh));
    doc.add_scene_root(node);
    TexturedScene {
        doc,
        node,
        mesh,
        material,
        texture,
    }
}

/// Returns primitives untouched, so tests can reason about cloning alone.
pub struct PassthroughSimplifier;

impl Simplifier for PassthroughSimplifier {
    fn simplify(
        &self,
        _doc: &mut Document,
        primitive: Primitive,
        _ratio: f32,
        _error: f32,
    ) -> anyhow::Result<Primitive> {
        Ok(primitive)
    }
}
