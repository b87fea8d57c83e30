use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    document::Document,
    extension::LodExtension,
    generator::{generate_variants, level_suffix},
    lod::LodParent,
    node::Node,
    options::LodSettings,
    simplifier::Simplifier,
    transforms::{dedup, resize_textures, weld, DedupReport},
};

/// What a pipeline run did to the document
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LodReport {
    pub animations_removed: usize,
    pub vertices_welded: usize,
    pub meshes_processed: usize,
    pub variants_created: usize,
    pub textures_resized: usize,
    pub dedup: DedupReport,
}

/// Adds `MSFT_lod` variants to every mesh of `doc`.
///
/// Stages run strictly in order: register the extension, wait for the
/// simplifier, weld, strip animations, generate variants and associations per
/// mesh, resize textures per level, dedup. The first failing stage aborts the run.
pub async fn msft_lod<S: Simplifier>(
    doc: &mut Document,
    settings: &LodSettings,
    simplifier: &S,
) -> anyhow::Result<LodReport> {
    let extension = LodExtension::register(doc);
    simplifier.ready().await?;

    let mut report = LodReport {
        vertices_welded: weld(doc),
        ..Default::default()
    };

    // variants carry no animation data; channels would point at diverging meshes
    for animation in doc.animations().keys().collect::<Vec<_>>() {
        doc.dispose_animation(animation);
        report.animations_removed += 1;
    }
    debug!("removed {} animations", report.animations_removed);

    for mesh in doc.meshes().keys().collect::<Vec<_>>() {
        let variants = generate_variants(doc, mesh, &settings.levels, simplifier)?;
        report.meshes_processed += 1;
        if variants.is_empty() {
            continue;
        }
        report.variants_created += variants.len();

        let lod = extension.create_lod(doc, "");
        doc.lod_mut(lod).set_coverages(settings.coverages.clone());
        for variant in variants {
            let name = doc.mesh(variant).name.clone();
            let node = doc.create_node(Node::new(name).with_mesh(variant));
            extension.add_variant(doc, lod, node)?;
        }
        for parent in doc.mesh_parents(mesh) {
            extension.attach(doc, LodParent::Node(parent), lod)?;
        }
    }

    for (i, &size) in settings.texture_sizes.iter().enumerate() {
        report.textures_resized += resize_textures(doc, size, &level_suffix(i + 1));
    }

    report.dedup = dedup(doc);
    info!(
        "msft-lod: {} meshes, {} variants, {} textures resized",
        report.meshes_processed, report.variants_created, report.textures_resized
    );
    Ok(report)
}
