//! glTF import and per-level export.

pub mod context;
mod import;
mod writer;

pub use context::{WriteStage, WriterContext};
pub use import::import;
pub use writer::{export, write_document, write_meta, LevelBuffer, WrittenAsset, WrittenImage};
