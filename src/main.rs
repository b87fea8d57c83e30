use std::path::PathBuf;

use anyhow::{ensure, Context};
use clap::Parser;
use log::info;

use mesh_lod::{
    classifier::SharedResourcePolicy,
    io::{export, import, write_meta},
    options::LodOptions,
    pipeline::msft_lod,
    simplifier::MeshoptSimplifier,
};

#[derive(Parser)]
#[clap(author, version, about)]
struct Args {
    /// glTF file to be input (.gltf, .glb)
    #[clap(long)]
    input: String,

    /// folder name to be output
    #[clap(long)]
    output: String,

    /// comma-separated simplification ratios, one per level (default: 0.5,0.1)
    #[clap(long)]
    ratio: Option<String>,

    /// comma-separated simplification error bounds, one per ratio (default: 0.01,0.05)
    #[clap(long)]
    error: Option<String>,

    /// comma-separated screen coverages, level 0 first (default: 0.7,0.3,0.0)
    #[clap(long)]
    coverage: Option<String>,

    /// comma-separated WxH texture sizes, one per level (default: 512x512,128x128)
    #[clap(long)]
    texture: Option<String>,

    /// which level keeps a resource shared between levels
    #[clap(long, value_enum, default_value_t = SharedResourcePolicy::LastWriteWins)]
    shared_resource_policy: SharedResourcePolicy,
}

impl Args {
    fn options(&self) -> LodOptions {
        let defaults = LodOptions::default();
        LodOptions {
            ratio: self.ratio.clone().unwrap_or(defaults.ratio),
            error: self.error.clone().unwrap_or(defaults.error),
            coverage: self.coverage.clone().unwrap_or(defaults.coverage),
            texture: self.texture.clone().unwrap_or(defaults.texture),
        }
    }
}

async fn handler() -> anyhow::Result<()> {
    let args: Args = Args::parse();

    let input = PathBuf::from(&args.input);
    ensure!(
        input.exists(),
        "input file {:?} is not existed!",
        input.to_string_lossy()
    );
    let stem = input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .context("input file has no name")?
        .to_string();
    let settings = args.options().parse()?;

    let mut doc = import(&input)?;
    info!("loaded {:?}", input);

    let report = msft_lod(&mut doc, &settings, &MeshoptSimplifier).await?;

    let mut meta = export(&doc, &args.output, &stem, args.shared_resource_policy)?;
    meta.report = Some(report);
    write_meta(&meta, &args.output)?;

    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match handler().await {
        Ok(_) => {
            println!("success");
        }
        Err(e) => {
            println!("error: {:?}", e);
        }
    }
}
