use std::{fs, path::Path};

use geo_vectorizer::FeatureLayout;
use log::{debug, info};
use ndarray::{Array2, Array3, Axis, Ix3, concatenate};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

use crate::{PrepError, Result, archive::Archive};

const ARCHIVE_EXTENSION: &str = "safetensors";
const SCALED_SUFFIX: &str = "_scaled";

/// A batch of vectorized geometries with one class label per record.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryDataset {
    geoms: Array3<f64>,
    labels: Vec<i64>,
}

impl GeometryDataset {
    /// Creates a new `GeometryDataset`.
    ///
    /// # Arguments
    /// * `geoms` - A `(records, max_points, width)` batch.
    /// * `labels` - The class of every record.
    ///
    /// # Returns
    /// The dataset or `LengthMismatch` if there isn't exactly one label per record.
    pub fn new(geoms: Array3<f64>, labels: Vec<i64>) -> Result<Self> {
        let records = geoms.dim().0;
        if labels.len() != records {
            return Err(PrepError::LengthMismatch {
                what: "labels",
                got: labels.len(),
                expected: records,
            });
        }

        Ok(Self { geoms, labels })
    }

    /// Reads the dataset stored in `archive` under the given array names.
    pub fn from_archive(archive: &Archive, geoms_name: &str, labels_name: &str) -> Result<Self> {
        let geoms = archive.get_f64_dim::<Ix3>(geoms_name)?;
        let labels = archive.get_i64(labels_name)?;
        Self::new(geoms, labels)
    }

    /// Loads a single dataset archive.
    ///
    /// # Returns
    /// The dataset together with the layout its geometries were encoded with.
    pub fn load(path: &Path, geoms_name: &str, labels_name: &str) -> Result<(Self, FeatureLayout)> {
        let archive = Archive::load(path)?;
        let dataset = Self::from_archive(&archive, geoms_name, labels_name)?;
        Ok((dataset, archive.layout()?))
    }

    /// Loads and appends every dataset archive of `folder` whose name starts with `prefix`.
    ///
    /// Archives are read in file name order. Normalized outputs, whose stem ends in `_scaled`,
    /// are left out.
    ///
    /// # Returns
    /// The merged dataset and their shared layout, `LayoutMismatch` if the archives disagree on
    /// it or `Empty` if nothing matched.
    pub fn load_prefixed(
        folder: &Path,
        prefix: &str,
        geoms_name: &str,
        labels_name: &str,
    ) -> Result<(Self, FeatureLayout)> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(folder)? {
            let path = entry?.path();
            let matches = path.extension().is_some_and(|ext| ext == ARCHIVE_EXTENSION)
                && path.file_stem().and_then(|stem| stem.to_str()).is_some_and(|stem| {
                    stem.starts_with(prefix) && !stem.ends_with(SCALED_SUFFIX)
                });
            if matches {
                paths.push(path);
            }
        }
        paths.sort();

        let mut parts = Vec::with_capacity(paths.len());
        let mut layout = None;
        for path in &paths {
            let (part, part_layout) = Self::load(path, geoms_name, labels_name)?;
            debug!("loaded {} records from {}", part.len(), path.display());
            let expected = *layout.get_or_insert(part_layout);
            if part_layout != expected {
                return Err(PrepError::LayoutMismatch {
                    expected,
                    got: part_layout,
                });
            }
            parts.push(part);
        }

        let layout = layout.ok_or_else(|| {
            PrepError::Empty(format!("{prefix}* archives in {}", folder.display()))
        })?;
        info!("loaded {} archives from {}", paths.len(), folder.display());

        Ok((Self::concat(&parts)?, layout))
    }

    /// Appends datasets along the record axis.
    pub fn concat(parts: &[Self]) -> Result<Self> {
        let views: Vec<_> = parts.iter().map(|part| part.geoms.view()).collect();
        let geoms = concatenate(Axis(0), &views)?;
        let labels = parts.iter().flat_map(|part| part.labels.iter().copied()).collect();
        Self::new(geoms, labels)
    }

    /// Stores the dataset in a new archive under the given array names.
    pub fn to_archive(
        &self,
        geoms_name: &str,
        labels_name: &str,
        layout: &FeatureLayout,
    ) -> Result<Archive> {
        let mut archive = Archive::new();
        archive.insert_f64(geoms_name, &self.geoms);
        archive.insert_i64(labels_name, &self.labels);
        archive.set_layout(layout)?;
        Ok(archive)
    }

    pub fn geoms(&self) -> &Array3<f64> {
        &self.geoms
    }

    pub fn labels(&self) -> &[i64] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Returns a dataset holding the same labels and the given geometries.
    pub fn with_geoms(&self, geoms: Array3<f64>) -> Result<Self> {
        Self::new(geoms, self.labels.clone())
    }

    /// The amount of classes, that is the largest label plus one.
    pub fn num_classes(&self) -> Result<usize> {
        self.check_labels()?;
        Ok(self
            .labels
            .iter()
            .max()
            .map_or(0, |&label| label as usize + 1))
    }

    /// Encodes the labels as one-hot rows of `num_classes` columns.
    pub fn one_hot(&self) -> Result<Array2<f64>> {
        let mut targets = Array2::zeros((self.len(), self.num_classes()?));
        for (index, &label) in self.labels.iter().enumerate() {
            targets[[index, label as usize]] = 1.;
        }
        Ok(targets)
    }

    fn check_labels(&self) -> Result<()> {
        match self.labels.iter().position(|&label| label < 0) {
            Some(index) => Err(PrepError::NegativeLabel {
                index,
                label: self.labels[index],
            }),
            None => Ok(()),
        }
    }

    /// Takes the records at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            geoms: self.geoms.select(Axis(0), indices),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }

    /// Shuffles the records and splits them into a training and a test dataset.
    ///
    /// # Arguments
    /// * `test_ratio` - The share of records that go to the test dataset, rounded to the nearest
    ///   record.
    /// * `seed` - The shuffling seed. A random one is drawn and logged when absent so that the
    ///   split can be reproduced.
    ///
    /// # Returns
    /// The `(train, test)` datasets, which are disjoint and together hold every record.
    pub fn split(&self, test_ratio: f64, seed: Option<u64>) -> (Self, Self) {
        let seed = seed.unwrap_or_else(rand::random);
        info!("splitting {} records with seed {seed}", self.len());

        let mut rng = StdRng::seed_from_u64(seed);
        let mut indices: Vec<usize> = (0..self.len()).collect();
        indices.shuffle(&mut rng);

        let test_len = ((self.len() as f64 * test_ratio).round() as usize).min(self.len());
        let (test, train) = indices.split_at(test_len);
        (self.select(train), self.select(test))
    }
}
