use std::str::FromStr;

use itertools::Itertools;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::{error::LodError, generator::LevelSettings};

/// Flat, string-typed pipeline options as given on the command line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LodOptions {
    /// comma-separated simplification ratios, one per level
    pub ratio: String,
    /// comma-separated error bounds, one per ratio
    pub error: String,
    /// comma-separated screen coverage thresholds, level 0 first
    pub coverage: String,
    /// comma-separated `WxH` texture targets, one per level
    pub texture: String,
}

impl Default for LodOptions {
    fn default() -> Self {
        Self {
            ratio: "0.5,0.1".to_string(),
            error: "0.01,0.05".to_string(),
            coverage: "0.7,0.3,0.0".to_string(),
            texture: "512x512,128x128".to_string(),
        }
    }
}

/// Validated form of [`LodOptions`]
#[derive(Clone, Debug, PartialEq)]
pub struct LodSettings {
    pub levels: Vec<LevelSettings>,
    pub coverages: Vec<f64>,
    pub texture_sizes: Vec<(u32, u32)>,
}

impl LodOptions {
    pub fn parse(&self) -> anyhow::Result<LodSettings> {
        let ratios: Vec<f32> = parse_list("ratio", &self.ratio)?;
        let errors: Vec<f32> = parse_list("error", &self.error)?;
        let coverages: Vec<f64> = parse_list("coverage", &self.coverage)?;
        let texture_sizes = split(&self.texture)
            .map(parse_size)
            .collect::<anyhow::Result<Vec<_>>>()?;

        if let Some(ratio) = ratios.iter().find(|r| !(**r > 0.0 && **r <= 1.0)) {
            return Err(invalid("ratio", format!("{} is outside (0, 1]", ratio)));
        }
        if let Some(error) = errors.iter().find(|e| !(**e >= 0.0)) {
            return Err(invalid("error", format!("{} is negative", error)));
        }
        if errors.len() < ratios.len() {
            return Err(invalid(
                "error",
                format!("{} bounds for {} ratios", errors.len(), ratios.len()),
            ));
        }
        if errors.len() > ratios.len() {
            warn!("ignoring {} extra error bounds", errors.len() - ratios.len());
        }

        let levels = ratios
            .iter()
            .zip(errors.iter())
            .enumerate()
            .map(|(i, (&ratio, &error))| LevelSettings {
                ratio,
                error,
                texture_size: texture_sizes.get(i).copied(),
            })
            .collect();

        Ok(LodSettings {
            levels,
            coverages,
            texture_sizes,
        })
    }
}

fn invalid(name: &'static str, reason: String) -> anyhow::Error {
    LodError::InvalidOption { name, reason }.into()
}

/// Empty input yields no tokens; otherwise every comma-separated token counts.
fn split(list: &str) -> impl Iterator<Item = &str> {
    let list = list.trim();
    list.split(',')
        .map(str::trim)
        .filter(move |_| !list.is_empty())
}

fn parse_list<T: FromStr>(name: &'static str, list: &str) -> anyhow::Result<Vec<T>> {
    split(list)
        .map(|token| {
            token
                .parse::<T>()
                .map_err(|_| invalid(name, format!("`{}` is not a number", token)))
        })
        .collect()
}

/// `WxH`, e.g. `512x512`
pub fn parse_size(size: &str) -> anyhow::Result<(u32, u32)> {
    let parsed = size
        .split('x')
        .map(|v| v.trim().parse::<u32>())
        .collect_tuple()
        .and_then(|(w, h)| w.ok().zip(h.ok()))
        .filter(|&(w, h)| w > 0 && h > 0);
    parsed.ok_or_else(|| invalid("texture", format!("`{}` is not WxH", size)))
}
