pub mod accessor;
pub mod bounding_box;
pub mod classifier;
pub mod document;
pub mod error;
pub mod extension;
pub mod generator;
pub mod io;
pub mod lod;
pub mod material;
pub mod mesh;
pub mod meta;
pub mod node;
pub mod options;
pub mod pipeline;
pub mod simplifier;
pub mod transforms;

#[cfg(test)]
mod test_utils;

pub use document::Document;

pub mod prelude {
    pub use crate::accessor::*;
    pub use crate::bounding_box::*;
    pub use crate::classifier::*;
    pub use crate::document::*;
    pub use crate::error::*;
    pub use crate::extension::*;
    pub use crate::generator::*;
    pub use crate::io::{export, import};
    pub use crate::lod::*;
    pub use crate::material::*;
    pub use crate::mesh::*;
    pub use crate::meta::*;
    pub use crate::node::*;
    pub use crate::options::*;
    pub use crate::pipeline::*;
    pub use crate::simplifier::*;
    pub use crate::transforms::*;
}
