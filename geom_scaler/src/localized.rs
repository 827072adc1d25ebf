use geo_vectorizer::FeatureLayout;
use ndarray::{Array2, Array3, ArrayView2, ArrayView3, s};

use crate::{
    GeomScale, Result, ScaleError,
    global::{check_width, scale, transform},
};

/// Computes the centroid of every record over its rendered rows.
///
/// # Arguments
/// * `batch` - A `(records, max_points, width)` batch.
/// * `layout` - The channel layout of the batch.
///
/// # Returns
/// A `(records, coord_channels)` array of centroids. A record made only of padding gets a zero
/// centroid.
pub fn localized_mean(batch: ArrayView3<f64>, layout: &FeatureLayout) -> Result<Array2<f64>> {
    check_width(&batch, layout)?;

    let mut means = Array2::zeros((batch.dim().0, layout.coord_channels()));
    for (record, mut mean) in batch.outer_iter().zip(means.outer_iter_mut()) {
        let mut count = 0usize;

        for row in record.outer_iter() {
            if layout.is_rendered(row) {
                mean += &row.slice(s![layout.coords()]);
                count += 1;
            }
        }

        if count > 0 {
            mean /= count as f64;
        }
    }

    Ok(means)
}

/// Centers every record on its own centroid, then scales it with the shared training scale.
///
/// Only rendered rows get centered, padding rows are skipped and therefore stay exactly zero.
///
/// # Arguments
/// * `batch` - A `(records, max_points, width)` batch.
/// * `means` - The centroids of `batch`, as returned by `localized_mean`.
/// * `scale` - The scale fitted on the centered training batch.
/// * `layout` - The channel layout of the batch.
///
/// # Returns
/// The centered and scaled batch, or a `ShapeMismatch` if `means` doesn't match the batch.
pub fn localized_normal(
    batch: ArrayView3<f64>,
    means: ArrayView2<f64>,
    scale: GeomScale,
    layout: &FeatureLayout,
) -> Result<Array3<f64>> {
    let centered = center(batch, means, layout)?;
    transform(centered.view(), scale, layout)
}

/// Fits the shared scale of a batch that will be normalized with `localized_normal`.
///
/// The variance is taken over the centered coordinates, so it measures the spread of the shapes
/// rather than the spread of their positions.
pub fn localized_scale(batch: ArrayView3<f64>, layout: &FeatureLayout) -> Result<GeomScale> {
    let means = localized_mean(batch, layout)?;
    let centered = center(batch, means.view(), layout)?;
    scale(centered.view(), layout)
}

fn center(
    batch: ArrayView3<f64>,
    means: ArrayView2<f64>,
    layout: &FeatureLayout,
) -> Result<Array3<f64>> {
    check_width(&batch, layout)?;

    let (records, channels) = means.dim();
    if records != batch.dim().0 {
        return Err(ScaleError::ShapeMismatch {
            what: "centroid records",
            got: records,
            expected: batch.dim().0,
        });
    }
    if channels != layout.coord_channels() {
        return Err(ScaleError::ShapeMismatch {
            what: "centroid channels",
            got: channels,
            expected: layout.coord_channels(),
        });
    }

    let mut centered = batch.to_owned();
    for (mut record, mean) in centered.outer_iter_mut().zip(means.outer_iter()) {
        for mut row in record.outer_iter_mut() {
            if layout.is_rendered(row.view()) {
                let mut coords = row.slice_mut(s![layout.coords()]);
                coords -= &mean;
            }
        }
    }

    Ok(centered)
}
