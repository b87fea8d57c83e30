//! Whole-document transforms the LOD pipeline runs around variant generation.

mod dedup;
mod resize;
mod weld;

pub use dedup::{dedup, DedupReport};
pub use resize::resize_textures;
pub use weld::weld;
