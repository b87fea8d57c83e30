use gltf::json::accessor::{ComponentType, Type};

use crate::error::LodError;

/// Typed payload of an accessor.
#[derive(Clone, Debug, PartialEq)]
pub enum AccessorData {
    /// interleaved-free vertex attribute, `components` floats per element
    Float { components: usize, values: Vec<f32> },
    /// triangle list indices
    Index(Vec<u32>),
}

/// A typed view over raw vertex or index data
#[derive(Clone, Debug, PartialEq)]
pub struct Accessor {
    pub name: String,
    pub data: AccessorData,
}

impl Accessor {
    pub fn vertex(name: impl Into<String>, components: usize, values: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            data: AccessorData::Float { components, values },
        }
    }

    pub fn indices(name: impl Into<String>, values: Vec<u32>) -> Self {
        Self {
            name: name.into(),
            data: AccessorData::Index(values),
        }
    }

    pub fn components(&self) -> usize {
        match &self.data {
            AccessorData::Float { components, .. } => *components,
            AccessorData::Index(_) => 1,
        }
    }

    /// element count
    pub fn count(&self) -> usize {
        match &self.data {
            AccessorData::Float { components, values } => {
                if *components == 0 {
                    0
                } else {
                    values.len() / components
                }
            }
            AccessorData::Index(values) => values.len(),
        }
    }

    pub fn as_floats(&self) -> Option<&[f32]> {
        match &self.data {
            AccessorData::Float { values, .. } => Some(values),
            AccessorData::Index(_) => None,
        }
    }

    pub fn as_indices(&self) -> Option<&[u32]> {
        match &self.data {
            AccessorData::Index(values) => Some(values),
            AccessorData::Float { .. } => None,
        }
    }

    pub fn is_index(&self) -> bool {
        matches!(self.data, AccessorData::Index(_))
    }

    /// Raw bit patterns of one element, usable as an exact-equality key.
    pub fn element_bits(&self, idx: usize) -> Vec<u32> {
        match &self.data {
            AccessorData::Float { components, values } => values
                [idx * components..(idx + 1) * components]
                .iter()
                .map(|v| v.to_bits())
                .collect(),
            AccessorData::Index(values) => vec![values[idx]],
        }
    }

    /// New data made of the elements at `order`, in that order.
    pub fn gather(&self, order: &[u32]) -> AccessorData {
        match &self.data {
            AccessorData::Float { components, values } => {
                let c = *components;
                let mut out = Vec::with_capacity(order.len() * c);
                for &i in order {
                    let i = i as usize;
                    out.extend_from_slice(&values[i * c..(i + 1) * c]);
                }
                AccessorData::Float {
                    components: c,
                    values: out,
                }
            }
            AccessorData::Index(values) => {
                AccessorData::Index(order.iter().map(|&i| values[i as usize]).collect())
            }
        }
    }

    /// little-endian bytes as laid out in a glTF buffer
    pub fn to_bytes(&self) -> Vec<u8> {
        match &self.data {
            AccessorData::Float { values, .. } => bytemuck::cast_slice(values).to_vec(),
            AccessorData::Index(values) => bytemuck::cast_slice(values).to_vec(),
        }
    }

    pub fn component_type(&self) -> ComponentType {
        match self.data {
            AccessorData::Float { .. } => ComponentType::F32,
            AccessorData::Index(_) => ComponentType::U32,
        }
    }

    pub fn element_type(&self) -> anyhow::Result<Type> {
        let kind = match self.components() {
            1 => Type::Scalar,
            2 => Type::Vec2,
            3 => Type::Vec3,
            4 => Type::Vec4,
            n => {
                return Err(LodError::InvalidAccessor(format!(
                    "{} has {} components per element",
                    self.name, n
                ))
                .into())
            }
        };
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use gltf::json::accessor::Type;

    use super::{Accessor, AccessorData};

    #[test]
    fn gather_selects_whole_elements() {
        let accessor = Accessor::vertex("uv", 2, vec![0., 1., 2., 3., 4., 5.]);
        assert_eq!(accessor.count(), 3);
        assert_eq!(
            accessor.gather(&[2, 0]),
            AccessorData::Float {
                components: 2,
                values: vec![4., 5., 0., 1.]
            }
        );
    }

    #[test]
    fn bytes_follow_element_layout() {
        let accessor = Accessor::indices("idx", vec![1, 2]);
        assert_eq!(accessor.to_bytes(), vec![1, 0, 0, 0, 2, 0, 0, 0]);
        assert_eq!(accessor.element_type().unwrap(), Type::Scalar);
        assert!(Accessor::vertex("bad", 5, vec![0.; 5]).element_type().is_err());
    }
}
