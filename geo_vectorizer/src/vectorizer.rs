use log::debug;
use ndarray::Array2;

use crate::{
    FeatureLayout, Result, VectorizeError,
    wkt::{self, Coord, Geometry},
};

/// What to do with a geometry that has more points than the record can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Fail with `LengthExceeded`.
    #[default]
    Reject,
    /// Keep the first `max_points` points and end the sequence on the last one kept.
    Truncate,
}

/// Vectorizes a WKT geometry into `max_points` feature vectors.
///
/// Every point becomes one row holding its coordinates and the render flag. The last point of
/// each ring or member carries the stop flag, except the very last point of the geometry which
/// carries the full stop flag instead. Rows past the last point are left as all zero padding.
///
/// An empty geometry yields a record made only of padding, without any full stop.
///
/// # Arguments
/// * `wkt` - The geometry text.
/// * `max_points` - The amount of rows of the record.
/// * `layout` - The channel layout of every row.
/// * `policy` - How to treat geometries longer than `max_points`.
///
/// # Returns
/// A `max_points x layout.width()` array, or an error if the text can't be parsed or the
/// geometry overflows under `OverflowPolicy::Reject`.
pub fn vectorize_wkt(
    wkt: &str,
    max_points: usize,
    layout: &FeatureLayout,
    policy: OverflowPolicy,
) -> Result<Array2<f64>> {
    let geometry = wkt::parse(wkt)?;
    vectorize_geometry(&geometry, max_points, layout, policy)
}

/// Vectorizes an already parsed geometry, see `vectorize_wkt`.
pub fn vectorize_geometry(
    geometry: &Geometry,
    max_points: usize,
    layout: &FeatureLayout,
    policy: OverflowPolicy,
) -> Result<Array2<f64>> {
    encode(&geometry.parts(), max_points, layout, policy)
}

/// Vectorizes two geometries into a single record.
///
/// The points of `wkt_b` follow right after the points of `wkt_a`, the boundary between both is
/// marked by a stop flag and only the end of `wkt_b` carries the full stop. The combined point
/// count is what gets checked against `max_points`.
///
/// # Arguments
/// * `wkt_a` - The first geometry text.
/// * `wkt_b` - The second geometry text.
/// * `max_points` - The amount of rows of the record.
/// * `layout` - The channel layout of every row.
/// * `policy` - How to treat pairs longer than `max_points`.
///
/// # Returns
/// A `max_points x layout.width()` array or an error.
pub fn vectorize_two_wkts(
    wkt_a: &str,
    wkt_b: &str,
    max_points: usize,
    layout: &FeatureLayout,
    policy: OverflowPolicy,
) -> Result<Array2<f64>> {
    let a = wkt::parse(wkt_a)?;
    let b = wkt::parse(wkt_b)?;

    let mut parts = a.parts();
    parts.extend(b.parts());
    encode(&parts, max_points, layout, policy)
}

fn encode(
    parts: &[&[Coord]],
    max_points: usize,
    layout: &FeatureLayout,
    policy: OverflowPolicy,
) -> Result<Array2<f64>> {
    let points: usize = parts.iter().map(|part| part.len()).sum();

    if points > max_points {
        match policy {
            OverflowPolicy::Reject => {
                return Err(VectorizeError::LengthExceeded { points, max_points });
            }
            OverflowPolicy::Truncate => {
                debug!("truncating geometry of {points} points to {max_points}");
            }
        }
    }

    let mut record = Array2::zeros((max_points, layout.width()));
    let rows = points.min(max_points);

    let flattened = parts.iter().flat_map(|part| {
        let last = part.len() - 1;
        part.iter().enumerate().map(move |(i, coord)| (coord, i == last))
    });

    for (mut row, (coord, ends_part)) in record.rows_mut().into_iter().zip(flattened).take(rows) {
        for (channel, value) in layout.coords().zip(coord.ordinates()) {
            row[channel] = value;
        }

        row[layout.render_index()] = 1.;
        if ends_part {
            row[layout.stop_index()] = 1.;
        }
    }

    if rows > 0 {
        let last = rows - 1;
        record[[last, layout.stop_index()]] = 0.;
        record[[last, layout.full_stop_index()]] = 1.;
    }

    Ok(record)
}

#[cfg(test)]
mod tests {
    use ndarray::{Axis, array, s};

    use super::*;

    fn layout() -> FeatureLayout {
        FeatureLayout::default()
    }

    fn column(record: &Array2<f64>, channel: usize) -> Vec<f64> {
        record.column(channel).to_vec()
    }

    #[test]
    fn point_is_one_row_then_padding() {
        let record = vectorize_wkt("POINT(1 2)", 4, &layout(), OverflowPolicy::Reject).unwrap();
        assert_eq!(record.row(0), array![1., 2., 1., 0., 1.]);
        assert!(record.slice(s![1.., ..]).iter().all(|&v| v == 0.));
    }

    #[test]
    fn linestring_flags() {
        let record = vectorize_wkt(
            "LINESTRING(0 0, 1 1, 2 2)",
            3,
            &layout(),
            OverflowPolicy::Reject,
        )
        .unwrap();

        assert_eq!(column(&record, 2), vec![1., 1., 1.]);
        assert_eq!(column(&record, 3), vec![0., 0., 0.]);
        assert_eq!(column(&record, 4), vec![0., 0., 1.]);
    }

    #[test]
    fn polygon_rings_are_separated_by_stops() {
        let record = vectorize_wkt(
            "POLYGON((0 0, 4 0, 4 4, 0 0), (1 1, 2 1, 1 1))",
            8,
            &layout(),
            OverflowPolicy::Reject,
        )
        .unwrap();

        assert_eq!(column(&record, 3), vec![0., 0., 0., 1., 0., 0., 0., 0.]);
        assert_eq!(column(&record, 4), vec![0., 0., 0., 0., 0., 0., 1., 0.]);
        assert_eq!(record.row(4), array![1., 1., 1., 0., 0.]);
    }

    #[test]
    fn two_wkts_are_joined_by_a_stop() {
        let record = vectorize_two_wkts(
            "POINT(0 0)",
            "LINESTRING(1 1, 2 2)",
            5,
            &layout(),
            OverflowPolicy::Reject,
        )
        .unwrap();

        assert_eq!(record.row(0), array![0., 0., 1., 1., 0.]);
        assert_eq!(record.row(1), array![1., 1., 1., 0., 0.]);
        assert_eq!(record.row(2), array![2., 2., 1., 0., 1.]);
        assert_eq!(record.slice(s![3.., ..]).sum(), 0.);
    }

    #[test]
    fn combined_pair_length_is_checked() {
        let result = vectorize_two_wkts(
            "LINESTRING(0 0, 1 1)",
            "LINESTRING(2 2, 3 3)",
            3,
            &layout(),
            OverflowPolicy::Reject,
        );

        assert_eq!(
            result,
            Err(VectorizeError::LengthExceeded {
                points: 4,
                max_points: 3
            })
        );
    }

    #[test]
    fn two_points_match_centroid_pair_encoding() {
        let record =
            vectorize_two_wkts("POINT(3 4)", "POINT(5 6)", 2, &layout(), OverflowPolicy::Reject)
                .unwrap();
        assert_eq!(record, array![[3., 4., 1., 1., 0.], [5., 6., 1., 0., 1.]]);
    }

    #[test]
    fn empty_second_geometry_leaves_full_stop_on_first() {
        let record = vectorize_two_wkts(
            "LINESTRING(0 0, 1 1)",
            "POLYGON EMPTY",
            3,
            &layout(),
            OverflowPolicy::Reject,
        )
        .unwrap();
        assert_eq!(column(&record, 3), vec![0., 0., 0.]);
        assert_eq!(column(&record, 4), vec![0., 1., 0.]);
    }

    #[test]
    fn empty_geometry_is_all_padding() {
        let record =
            vectorize_wkt("GEOMETRYCOLLECTION EMPTY", 3, &layout(), OverflowPolicy::Reject)
                .unwrap();
        assert_eq!(record.dim(), (3, 5));
        assert!(record.iter().all(|&v| v == 0.));
    }

    #[test]
    fn overflow_is_rejected_by_default() {
        let err = vectorize_wkt(
            "LINESTRING(0 0, 1 1, 2 2)",
            2,
            &layout(),
            OverflowPolicy::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            VectorizeError::LengthExceeded {
                points: 3,
                max_points: 2
            }
        );
    }

    #[test]
    fn truncation_moves_the_full_stop() {
        let record = vectorize_wkt(
            "MULTILINESTRING((0 0, 1 1), (2 2, 3 3))",
            3,
            &layout(),
            OverflowPolicy::Truncate,
        )
        .unwrap();

        assert_eq!(column(&record, 2), vec![1., 1., 1.]);
        assert_eq!(column(&record, 3), vec![0., 1., 0.]);
        assert_eq!(column(&record, 4), vec![0., 0., 1.]);
    }

    #[test]
    fn extra_channels_hold_z() {
        let layout = FeatureLayout::new(3).unwrap();
        let record =
            vectorize_wkt("LINESTRING Z (0 0 5, 1 1 6)", 2, &layout, OverflowPolicy::Reject)
                .unwrap();
        assert_eq!(record.index_axis(Axis(1), 2).to_vec(), vec![5., 6.]);
        assert_eq!(record.row(1), array![1., 1., 6., 1., 0., 1.]);

        let flat = vectorize_wkt("POINT(1 2)", 1, &layout, OverflowPolicy::Reject).unwrap();
        assert_eq!(flat.row(0), array![1., 2., 0., 1., 0., 1.]);
    }

    #[test]
    fn ordinates_past_the_layout_are_dropped() {
        let record =
            vectorize_wkt("POINT ZM (1 2 3 4)", 1, &layout(), OverflowPolicy::Reject).unwrap();
        assert_eq!(record.row(0), array![1., 2., 1., 0., 1.]);
    }
}
