use geo_vectorizer::FeatureLayout;
use log::debug;
use ndarray::{Array3, ArrayView3, s};

use crate::{GeomScale, Result, ScaleError};

/// Fits the scale of a batch of vectorized geometries.
///
/// The variance is computed over the coordinate channels of the rendered rows only, all
/// coordinate channels pooled together. Padding rows are left out so that they don't drag the
/// estimate towards zero.
///
/// # Arguments
/// * `batch` - A `(records, max_points, width)` batch.
/// * `layout` - The channel layout of the batch.
///
/// # Returns
/// The fitted scale, `EmptyBatch` if no row is rendered or `DegenerateScale` if every
/// coordinate has the same value.
pub fn scale(batch: ArrayView3<f64>, layout: &FeatureLayout) -> Result<GeomScale> {
    check_width(&batch, layout)?;

    let values = || {
        batch
            .rows()
            .into_iter()
            .filter(|row| layout.is_rendered(row.view()))
            .flat_map(|row| layout.coords().map(move |channel| row[channel]))
    };

    let (count, sum) = values().fold((0usize, 0.), |(count, sum), v| (count + 1, sum + v));
    if count == 0 {
        return Err(ScaleError::EmptyBatch);
    }

    let mean = sum / count as f64;
    let variance = values().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
    debug!("fitted variance {variance} over {count} coordinate values");

    GeomScale::new(variance)
}

/// Divides the coordinate channels of every row by the standard deviation of `scale`.
///
/// Flag channels are copied untouched and padding rows stay zero.
///
/// # Arguments
/// * `batch` - A `(records, max_points, width)` batch.
/// * `scale` - The scale fitted on the training batch.
/// * `layout` - The channel layout of the batch.
///
/// # Returns
/// The scaled batch or a `ShapeMismatch` if the batch isn't `layout.width()` wide.
pub fn transform(
    batch: ArrayView3<f64>,
    scale: GeomScale,
    layout: &FeatureLayout,
) -> Result<Array3<f64>> {
    let std_dev = scale.std_dev();
    map_coords(batch, layout, |v| v / std_dev)
}

/// Undoes `transform`, bringing coordinates back to their original units.
pub fn inverse_transform(
    batch: ArrayView3<f64>,
    scale: GeomScale,
    layout: &FeatureLayout,
) -> Result<Array3<f64>> {
    let std_dev = scale.std_dev();
    map_coords(batch, layout, |v| v * std_dev)
}

fn map_coords(
    batch: ArrayView3<f64>,
    layout: &FeatureLayout,
    f: impl Fn(f64) -> f64,
) -> Result<Array3<f64>> {
    check_width(&batch, layout)?;

    let mut scaled = batch.to_owned();
    scaled
        .slice_mut(s![.., .., layout.coords()])
        .mapv_inplace(f);

    Ok(scaled)
}

pub(crate) fn check_width(batch: &ArrayView3<f64>, layout: &FeatureLayout) -> Result<()> {
    let width = batch.dim().2;
    if width != layout.width() {
        return Err(ScaleError::ShapeMismatch {
            what: "feature width",
            got: width,
            expected: layout.width(),
        });
    }
    Ok(())
}
