use serde::{Deserialize, Serialize};

use crate::{bounding_box::BoundingBox, pipeline::LodReport};

/// Meta representation of an exported LOD asset, written next to it as `meta.json`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Meta {
    version: String,
    /// highest variant level in the asset
    pub lod: usize,
    /// `.gltf` file name
    pub gltf: String,
    /// binary buffer per level, level 0 first
    pub buffers: Vec<String>,
    pub images: Vec<String>,
    pub bounds: Option<BoundingBox>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<LodReport>,
}

impl Meta {
    pub fn new(
        lod: usize,
        gltf: String,
        buffers: Vec<String>,
        images: Vec<String>,
        bounds: Option<BoundingBox>,
    ) -> Meta {
        Meta {
            version: env!("CARGO_PKG_VERSION").to_string(),
            lod,
            gltf,
            buffers,
            images,
            bounds,
            report: None,
        }
    }

    pub fn lod(&self) -> usize {
        self.lod
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::Meta;

    #[test]
    fn summary_records_the_crate_version() {
        let meta = Meta::new(2, "a.gltf".into(), vec!["a_lod0.bin".into()], vec![], None);
        let json: Value = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(json["lod"], 2);
        assert!(json.get("report").is_none());
    }
}
