use std::{fs, path::Path};

use geo_vectorizer::FeatureLayout;
use geom_scaler::{GeomScale, localized_mean, localized_normal, localized_scale, scale, transform};
use log::info;
use ndarray::{Array3, ArrayView3};
use serde::{Deserialize, Serialize};

use crate::{PrepError, Result, config::NormalizeConfig, dataset::GeometryDataset};

/// A fitted normalization, global or localized.
///
/// Serializes as `{"variance": v, "localized": false}`, a plain `{"variance": v}` reads back as
/// a global normalization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Normalizer {
    #[serde(flatten)]
    scale: GeomScale,
    #[serde(default)]
    localized: bool,
}

impl Normalizer {
    /// Fits the scale on a training batch.
    ///
    /// # Arguments
    /// * `train` - The training `(records, max_points, width)` batch.
    /// * `layout` - The channel layout of the batch.
    /// * `localized` - Whether records get centered on their own centroid before scaling.
    pub fn fit(train: ArrayView3<f64>, layout: &FeatureLayout, localized: bool) -> Result<Self> {
        let scale = if localized {
            localized_scale(train, layout)?
        } else {
            scale(train, layout)?
        };

        Ok(Self { scale, localized })
    }

    /// Uses an already known scale.
    pub fn with_scale(scale: GeomScale, localized: bool) -> Self {
        Self { scale, localized }
    }

    /// Normalizes a batch with the fitted scale.
    ///
    /// A localized normalizer centers every record on its own centroid first.
    pub fn apply(&self, batch: ArrayView3<f64>, layout: &FeatureLayout) -> Result<Array3<f64>> {
        let normal = if self.localized {
            let means = localized_mean(batch, layout)?;
            localized_normal(batch, means.view(), self.scale, layout)?
        } else {
            transform(batch, self.scale, layout)?
        };

        Ok(normal)
    }

    pub fn scale(&self) -> GeomScale {
        self.scale
    }

    pub fn localized(&self) -> bool {
        self.localized
    }

    /// Writes the normalizer as json.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Reads a normalizer written by `save`, validating the stored variance.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// What a normalization run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeSummary {
    pub train_records: usize,
    pub test_records: usize,
    pub num_classes: usize,
    pub normalizer: Normalizer,
}

/// Loads the prefixed dataset archives, splits them, fits or takes the scale and writes the
/// normalized `<prefix>_train_scaled` and `<prefix>_test_scaled` archives next to a
/// `<prefix>_scale.json` file.
pub fn normalize_datasets(config: &NormalizeConfig) -> Result<NormalizeSummary> {
    let (geoms_name, labels_name) = (config.geoms_array(), config.labels_array());
    let (data, layout) = GeometryDataset::load_prefixed(
        config.data_folder(),
        config.prefix(),
        geoms_name,
        labels_name,
    )?;

    let (train, test) = match config.test_file() {
        Some(path) => {
            let (test, test_layout) = GeometryDataset::load(path, geoms_name, labels_name)?;
            if test_layout != layout {
                return Err(PrepError::LayoutMismatch {
                    expected: layout,
                    got: test_layout,
                });
            }
            (data, test)
        }
        None => data.split(config.test_split(), config.seed()),
    };

    let normalizer = match config.scale() {
        Some(scale) => {
            info!("using fixed variance {}", scale.variance());
            Normalizer::with_scale(scale, config.localized())
        }
        None => Normalizer::fit(train.geoms().view(), &layout, config.localized())?,
    };

    let folder = config.data_folder();
    let prefix = config.prefix();
    for (name, dataset) in [("train", &train), ("test", &test)] {
        let scaled = dataset.with_geoms(normalizer.apply(dataset.geoms().view(), &layout)?)?;
        let path = folder.join(format!("{prefix}_{name}_scaled.safetensors"));
        scaled
            .to_archive(geoms_name, labels_name, &layout)?
            .save(&path)?;
        info!("saved {} {name} records to {}", scaled.len(), path.display());
    }
    normalizer.save(&folder.join(format!("{prefix}_scale.json")))?;

    Ok(NormalizeSummary {
        train_records: train.len(),
        test_records: test.len(),
        num_classes: train.num_classes()?.max(test.num_classes()?),
        normalizer,
    })
}

#[cfg(test)]
mod tests {
    use std::env;

    use geom_scaler::ScaleError;
    use ndarray::array;

    use super::*;

    fn batch() -> Array3<f64> {
        array![
            [[1., 2., 1., 0., 0.], [3., 4., 1., 0., 1.]],
            [[-2., 6., 1., 0., 1.], [0., 0., 0., 0., 0.]],
        ]
    }

    #[test]
    fn global_apply_matches_transform() {
        let layout = FeatureLayout::default();
        let normalizer = Normalizer::fit(batch().view(), &layout, false).unwrap();
        let expected = transform(batch().view(), normalizer.scale(), &layout).unwrap();
        assert_eq!(normalizer.apply(batch().view(), &layout).unwrap(), expected);
    }

    #[test]
    fn localized_apply_centers_records() {
        let layout = FeatureLayout::default();
        let normalizer = Normalizer::fit(batch().view(), &layout, true).unwrap();
        let out = normalizer.apply(batch().view(), &layout).unwrap();

        assert_eq!(out[[0, 0, 0]], -out[[0, 1, 0]]);
        assert_eq!(out[[1, 0, 0]], 0.);
        assert_eq!(out[[1, 1, 2]], 0.);
    }

    #[test]
    fn saved_normalizer_reads_back() {
        let path = env::temp_dir().join(format!("topoml-scale-{}.json", std::process::id()));
        let normalizer = Normalizer::with_scale(GeomScale::new(3.5).unwrap(), true);
        normalizer.save(&path).unwrap();
        let loaded = Normalizer::load(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(loaded, normalizer);
    }

    #[test]
    fn bare_variance_is_a_global_normalizer() {
        let normalizer: Normalizer = serde_json::from_str(r#"{"variance": 2.0}"#).unwrap();
        assert!(!normalizer.localized());
        assert_eq!(normalizer.scale().variance(), 2.);
        assert!(serde_json::from_str::<Normalizer>(r#"{"variance": -1.0}"#).is_err());
    }

    #[test]
    fn padding_only_batch_cannot_be_fitted() {
        let layout = FeatureLayout::default();
        assert!(matches!(
            Normalizer::fit(Array3::zeros((2, 3, 5)).view(), &layout, false),
            Err(PrepError::Scale(ScaleError::EmptyBatch))
        ));
    }
}
