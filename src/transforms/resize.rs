use image::imageops::FilterType;
use log::info;
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::document::Document;

/// Shrinks every texture whose name ends with `suffix` to fit inside `size`,
/// keeping its aspect ratio. Textures already within `size` are left as is.
/// Returns the number of resized textures.
pub fn resize_textures(doc: &mut Document, size: (u32, u32), suffix: &str) -> usize {
    let targets: Vec<_> = doc
        .textures_mut()
        .iter_mut()
        .map(|(_, texture)| texture)
        .filter(|texture| texture.name.ends_with(suffix) && texture.exceeds(size))
        .collect();
    let count = targets.len();

    targets.into_par_iter().for_each(|texture| {
        texture.image = texture.image.resize(size.0, size.1, FilterType::Lanczos3);
    });

    info!(
        "resize: {} textures matching *{} to fit {}x{}",
        count, suffix, size.0, size.1
    );
    count
}

#[cfg(test)]
mod tests {
    use crate::{
        document::Document,
        test_utils::{gradient_texture, solid_texture},
    };

    use super::resize_textures;

    #[test]
    fn only_matching_oversized_textures_shrink() {
        let mut doc = Document::new();
        let matching = doc.create_texture(gradient_texture("albedo_LOD1", 64, 32));
        let small = doc.create_texture(solid_texture("normal_LOD1", 8, 8));
        let other = doc.create_texture(solid_texture("albedo_LOD2", 64, 64));
        let original = doc.create_texture(solid_texture("albedo", 64, 64));

        assert_eq!(resize_textures(&mut doc, (16, 16), "_LOD1"), 1);
        assert_eq!(doc.texture(matching).size(), (16, 8));
        assert_eq!(doc.texture(small).size(), (8, 8));
        assert_eq!(doc.texture(other).size(), (64, 64));
        assert_eq!(doc.texture(original).size(), (64, 64));
    }
}
