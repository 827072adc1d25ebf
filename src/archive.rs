use std::{
    borrow::Cow,
    collections::{BTreeMap, HashMap},
    fs,
    path::Path,
};

use bytemuck::Pod;
use geo_vectorizer::FeatureLayout;
use ndarray::{Array, ArrayD, Dimension, IxDyn};
use safetensors::{Dtype, SafeTensors, View, serialize_to_file};

use crate::{PrepError, Result};

const LAYOUT_KEY: &str = "layout";

/// A file of named numeric arrays.
///
/// Geometry tensors, distance fields and labels are stored side by side under their field name,
/// together with string metadata such as the feature layout the geometries were encoded with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Archive {
    arrays: BTreeMap<String, NamedArray>,
    metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
struct NamedArray {
    dtype: Dtype,
    shape: Vec<usize>,
    bytes: Vec<u8>,
}

impl View for &NamedArray {
    fn dtype(&self) -> Dtype {
        self.dtype
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn data(&self) -> Cow<[u8]> {
        Cow::Borrowed(&self.bytes)
    }

    fn data_len(&self) -> usize {
        self.bytes.len()
    }
}

impl Archive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a float array of any dimensionality under `name`, replacing any previous one.
    pub fn insert_f64<D: Dimension>(&mut self, name: &str, array: &Array<f64, D>) {
        self.insert(name, Dtype::F64, array.shape().to_vec(), array.iter().copied());
    }

    /// Stores a one dimensional integer array, e.g. class labels.
    pub fn insert_i64(&mut self, name: &str, values: &[i64]) {
        self.insert(name, Dtype::I64, vec![values.len()], values.iter().copied());
    }

    fn insert<T: Pod>(
        &mut self,
        name: &str,
        dtype: Dtype,
        shape: Vec<usize>,
        values: impl Iterator<Item = T>,
    ) {
        let values: Vec<T> = values.collect();
        let bytes = bytemuck::cast_slice::<T, u8>(values.as_slice()).to_vec();
        self.arrays
            .insert(name.to_string(), NamedArray { dtype, shape, bytes });
    }

    /// Reads back a float array.
    ///
    /// # Returns
    /// The array with its stored shape, or an error if it is missing or holds another type.
    pub fn get_f64(&self, name: &str) -> Result<ArrayD<f64>> {
        let array = self.array(name, Dtype::F64, "f64")?;
        let values = decode::<f64>(&array.bytes);
        Ok(ArrayD::from_shape_vec(IxDyn(&array.shape), values)?)
    }

    /// Reads back a float array with a fixed dimensionality, e.g. `Ix3` for geometry batches.
    pub fn get_f64_dim<D: Dimension>(&self, name: &str) -> Result<Array<f64, D>> {
        Ok(self.get_f64(name)?.into_dimensionality::<D>()?)
    }

    pub fn get_i64(&self, name: &str) -> Result<Vec<i64>> {
        let array = self.array(name, Dtype::I64, "i64")?;
        Ok(decode::<i64>(&array.bytes))
    }

    fn array(&self, name: &str, dtype: Dtype, expected: &'static str) -> Result<&NamedArray> {
        let array = self
            .arrays
            .get(name)
            .ok_or_else(|| PrepError::MissingArray(name.to_string()))?;

        if array.dtype != dtype {
            return Err(PrepError::ArrayType {
                name: name.to_string(),
                expected,
            });
        }

        Ok(array)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.arrays.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.arrays.keys().map(String::as_str)
    }

    pub fn set_metadata(&mut self, key: &str, value: &str) {
        self.metadata.insert(key.to_string(), value.to_string());
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Records the layout the geometry arrays were encoded with.
    pub fn set_layout(&mut self, layout: &FeatureLayout) -> Result<()> {
        let json = serde_json::to_string(layout)?;
        self.set_metadata(LAYOUT_KEY, &json);
        Ok(())
    }

    /// The recorded layout, falling back to the default one for archives written without it.
    pub fn layout(&self) -> Result<FeatureLayout> {
        match self.metadata(LAYOUT_KEY) {
            Some(json) => Ok(serde_json::from_str(json)?),
            None => Ok(FeatureLayout::default()),
        }
    }

    /// Writes the archive to `path` in the safetensors format.
    pub fn save(&self, path: &Path) -> Result<()> {
        let metadata = (!self.metadata.is_empty()).then(|| self.metadata.clone());
        let arrays = self.arrays.iter().map(|(name, array)| (name.as_str(), array));
        serialize_to_file(arrays, &metadata, path)?;
        Ok(())
    }

    /// Reads an archive written by `save`.
    pub fn load(path: &Path) -> Result<Self> {
        let buffer = fs::read(path)?;
        let tensors = SafeTensors::deserialize(&buffer)?;
        let (_, header) = SafeTensors::read_metadata(&buffer)?;

        let mut archive = Self::new();
        if let Some(metadata) = header.metadata() {
            archive.metadata = metadata.clone();
        }

        for (name, tensor) in tensors.tensors() {
            let array = NamedArray {
                dtype: tensor.dtype(),
                shape: tensor.shape().to_vec(),
                bytes: tensor.data().to_vec(),
            };
            archive.arrays.insert(name, array);
        }

        Ok(archive)
    }
}

// Tensor data carries no alignment guarantee inside the file buffer.
fn decode<T: Pod>(bytes: &[u8]) -> Vec<T> {
    bytes
        .chunks_exact(size_of::<T>())
        .map(bytemuck::pod_read_unaligned)
        .collect()
}
