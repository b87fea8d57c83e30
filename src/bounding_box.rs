use std::iter::FromIterator;

use nalgebra::{zero, Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounds of a set of vertex positions
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl BoundingBox {
    /// Bounds of a flat `[x, y, z, x, y, z, ..]` buffer; `None` when empty.
    pub fn from_positions(values: &[f32]) -> Option<BoundingBox> {
        if values.len() < 3 {
            return None;
        }
        Some(
            values
                .chunks_exact(3)
                .map(|p| Point3::new(p[0] as f64, p[1] as f64, p[2] as f64))
                .collect(),
        )
    }

    pub fn size(&self) -> Vector3<f64> {
        self.max - self.min
    }

    pub fn max_size(&self) -> f64 {
        let size = self.size();
        size.x.max(size.y).max(size.z)
    }

    pub fn center(&self) -> Point3<f64> {
        let p = (self.max.coords + self.min.coords) * 0.5;
        Point3::from(p)
    }

    pub fn extend(&mut self, p: &Point3<f64>) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// glTF accessor `min`/`max` arrays
    pub fn to_min_max(&self) -> (Vec<f32>, Vec<f32>) {
        let min = self.min.iter().map(|v| *v as f32).collect();
        let max = self.max.iter().map(|v| *v as f32).collect();
        (min, max)
    }
}

impl FromIterator<Point3<f64>> for BoundingBox {
    fn from_iter<I: IntoIterator<Item = Point3<f64>>>(iter: I) -> Self {
        let mut min: Vector3<f64> = zero();
        min.fill(f64::MAX);
        let mut max: Vector3<f64> = zero();
        max.fill(f64::MIN);
        let mut b = Self {
            min: min.into(),
            max: max.into(),
        };
        for p in iter {
            b.extend(&p);
        }
        b
    }
}
