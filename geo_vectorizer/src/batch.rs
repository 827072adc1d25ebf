use ndarray::{Array2, Array3};
use rayon::prelude::*;

use crate::{
    FeatureLayout, OverflowPolicy, Result, VectorizeError,
    vectorizer::{vectorize_two_wkts, vectorize_wkt},
    wkt,
};

/// Counts the points a WKT geometry encodes into.
pub fn point_count(wkt: &str) -> Result<usize> {
    Ok(wkt::parse(wkt)?.point_count())
}

/// Scans every geometry of every collection and returns the largest point count.
///
/// All the records of a batch must share the same `max_points`, this is how it gets sized
/// before vectorizing any record.
///
/// # Arguments
/// * `collections` - The WKT collections to scan.
///
/// # Returns
/// The largest point count, zero for no geometries, or the error of a failing record annotated
/// with its position inside its collection. Records are scanned in parallel, with several
/// failing records any one of them may be reported.
pub fn max_points<S>(collections: &[&[S]]) -> Result<usize>
where
    S: AsRef<str> + Sync,
{
    collections.iter().try_fold(0, |max, collection| {
        let counts = counts(collection)?;
        Ok(counts.into_iter().fold(max, usize::max))
    })
}

/// Returns the largest summed point count of the row aligned pairs `(a[i], b[i])`.
///
/// This is the `max_points` needed by `vectorize_two_wkts` to hold every pair of the batch.
pub fn max_points_paired<S>(a: &[S], b: &[S]) -> Result<usize>
where
    S: AsRef<str> + Sync,
{
    check_pairs(a, b)?;
    let a = counts(a)?;
    let b = counts(b)?;

    Ok(a.into_iter().zip(b).map(|(a, b)| a + b).max().unwrap_or(0))
}

/// Vectorizes a batch of geometries into a `(records, max_points, width)` array.
///
/// Records are encoded in parallel, each one independently from the others.
///
/// # Arguments
/// * `wkts` - The geometry texts.
/// * `max_points` - The shared amount of rows of every record.
/// * `layout` - The channel layout of every row.
/// * `policy` - How to treat geometries longer than `max_points`.
///
/// # Returns
/// The stacked records or the error of a failing record, annotated with its index and text.
pub fn vectorize_batch<S>(
    wkts: &[S],
    max_points: usize,
    layout: &FeatureLayout,
    policy: OverflowPolicy,
) -> Result<Array3<f64>>
where
    S: AsRef<str> + Sync,
{
    let records = wkts
        .par_iter()
        .enumerate()
        .map(|(index, wkt)| {
            let wkt = wkt.as_ref();
            vectorize_wkt(wkt, max_points, layout, policy).map_err(|e| e.at_record(index, wkt))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(stack(&records, max_points, layout))
}

/// Vectorizes the row aligned pairs `(a[i], b[i])` with `vectorize_two_wkts`.
///
/// # Returns
/// The stacked records or the error of a failing record, annotated with its index and both
/// texts.
pub fn vectorize_pair_batch<S>(
    a: &[S],
    b: &[S],
    max_points: usize,
    layout: &FeatureLayout,
    policy: OverflowPolicy,
) -> Result<Array3<f64>>
where
    S: AsRef<str> + Sync,
{
    check_pairs(a, b)?;

    let records = a
        .par_iter()
        .zip(b)
        .enumerate()
        .map(|(index, (a, b))| {
            let (a, b) = (a.as_ref(), b.as_ref());
            vectorize_two_wkts(a, b, max_points, layout, policy)
                .map_err(|e| e.at_record(index, &format!("{a};{b}")))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(stack(&records, max_points, layout))
}

fn counts<S>(wkts: &[S]) -> Result<Vec<usize>>
where
    S: AsRef<str> + Sync,
{
    wkts.par_iter()
        .enumerate()
        .map(|(index, wkt)| {
            let wkt = wkt.as_ref();
            point_count(wkt).map_err(|e| e.at_record(index, wkt))
        })
        .collect()
}

fn check_pairs<S>(a: &[S], b: &[S]) -> Result<()> {
    if a.len() != b.len() {
        return Err(VectorizeError::PairLengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    Ok(())
}

fn stack(records: &[Array2<f64>], max_points: usize, layout: &FeatureLayout) -> Array3<f64> {
    let mut batch = Array3::zeros((records.len(), max_points, layout.width()));
    for (mut slot, record) in batch.outer_iter_mut().zip(records) {
        slot.assign(record);
    }
    batch
}
