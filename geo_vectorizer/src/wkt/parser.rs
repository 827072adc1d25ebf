use ::wkt::{Wkt, types};

use super::{
    canonical::canonicalize,
    geometry::{Coord, Geometry},
};
use crate::{Result, VectorizeError};

/// Parses a WKT (or EWKT with an `SRID=n;` prefix) string.
///
/// # Arguments
/// * `input` - The text to parse. Keywords are case insensitive.
///
/// # Returns
/// The parsed geometry, `UnsupportedKind` for a keyword outside of the supported set, or a
/// `Parse` error pointing at the offending byte.
pub fn parse(input: &str) -> Result<Geometry> {
    let (canonical, offset) = canonicalize(input)?;
    let wkt: Wkt<f64> = canonical
        .parse()
        .map_err(|message: &str| VectorizeError::parse(offset, message))?;

    Ok(wkt.into())
}

impl From<types::Coord<f64>> for Coord {
    fn from(coord: types::Coord<f64>) -> Self {
        Self {
            x: coord.x,
            y: coord.y,
            z: coord.z,
            m: coord.m,
        }
    }
}

fn line(line: types::LineString<f64>) -> Vec<Coord> {
    line.0.into_iter().map(Coord::from).collect()
}

fn rings(polygon: types::Polygon<f64>) -> Vec<Vec<Coord>> {
    polygon.0.into_iter().map(line).collect()
}

impl From<Wkt<f64>> for Geometry {
    fn from(wkt: Wkt<f64>) -> Self {
        match wkt {
            Wkt::Point(point) => Self::Point(point.0.map(Coord::from)),
            Wkt::LineString(string) => Self::LineString(line(string)),
            Wkt::Polygon(polygon) => Self::Polygon(rings(polygon)),
            Wkt::MultiPoint(multi) => Self::MultiPoint(
                multi
                    .0
                    .into_iter()
                    .filter_map(|point| point.0.map(Coord::from))
                    .collect(),
            ),
            Wkt::MultiLineString(multi) => {
                Self::MultiLineString(multi.0.into_iter().map(line).collect())
            }
            Wkt::MultiPolygon(multi) => Self::MultiPolygon(multi.0.into_iter().map(rings).collect()),
            Wkt::GeometryCollection(collection) => {
                Self::GeometryCollection(collection.0.into_iter().map(Self::from).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wkt::GeometryKind;

    #[test]
    fn parses_point() {
        assert_eq!(
            parse("POINT(1 2)").unwrap(),
            Geometry::Point(Some(Coord::xy(1., 2.)))
        );
    }

    #[test]
    fn parses_polygon_with_hole() {
        let polygon = parse("POLYGON ((0 0, 4 0, 4 4, 0 0), (1 1, 2 1, 1 1))").unwrap();
        let Geometry::Polygon(rings) = polygon else {
            panic!("expected a polygon");
        };
        assert_eq!(rings.len(), 2);
        assert_eq!(rings[0][1], Coord::xy(4., 0.));
        assert_eq!(rings[1].len(), 3);
    }

    #[test]
    fn multipoint_accepts_both_notations() {
        let bare = parse("MULTIPOINT (1 2, 3 4)").unwrap();
        let wrapped = parse("MULTIPOINT ((1 2), (3 4))").unwrap();
        assert_eq!(bare, wrapped);
        assert_eq!(bare.point_count(), 2);
    }

    #[test]
    fn parses_multipolygon_and_collection() {
        let multi = parse("MULTIPOLYGON (((0 0, 1 0, 0 0)), ((5 5, 6 5, 5 5)))").unwrap();
        assert_eq!(multi.kind(), GeometryKind::MultiPolygon);
        assert_eq!(multi.parts().len(), 2);

        let collection =
            parse("GEOMETRYCOLLECTION (POINT (1 1), LINESTRING (0 0, 1 1), POINT EMPTY)").unwrap();
        assert_eq!(collection.kind(), GeometryKind::GeometryCollection);
        assert_eq!(collection.point_count(), 3);
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(parse("linestring(0 0, 1 1)").unwrap().point_count(), 2);
    }

    #[test]
    fn parses_empty_geometries() {
        assert_eq!(parse("POINT EMPTY").unwrap(), Geometry::Point(None));
        assert_eq!(
            parse("GEOMETRYCOLLECTION EMPTY").unwrap(),
            Geometry::GeometryCollection(Vec::new())
        );
    }

    #[test]
    fn dimension_tags() {
        let z = parse("POINT Z (1 2 3)").unwrap();
        assert_eq!(
            z,
            Geometry::Point(Some(Coord {
                z: Some(3.),
                ..Coord::xy(1., 2.)
            }))
        );
        assert_eq!(parse("POINT(1 2 3)").unwrap(), z);

        let m = parse("POINTM(1 2 4)").unwrap();
        assert_eq!(
            m,
            Geometry::Point(Some(Coord {
                m: Some(4.),
                ..Coord::xy(1., 2.)
            }))
        );

        assert!(parse("POINT ZM (1 2 3)").is_err());
    }

    #[test]
    fn skips_srid_prefix() {
        assert_eq!(
            parse("SRID=28992;POINT(155000 463000)").unwrap(),
            Geometry::Point(Some(Coord::xy(155000., 463000.)))
        );
    }

    #[test]
    fn unsupported_kind() {
        assert_eq!(
            parse("CIRCULARSTRING(0 0, 1 1, 2 0)"),
            Err(VectorizeError::UnsupportedKind("CIRCULARSTRING".into()))
        );
    }

    #[test]
    fn malformed_text_reports_position() {
        assert!(matches!(
            parse("POINT(1 2"),
            Err(VectorizeError::Parse { position: 9, .. })
        ));
        assert!(matches!(
            parse("LINESTRING(0 0 1 1 2 2 3)"),
            Err(VectorizeError::Parse { position: 11, .. })
        ));
        assert!(matches!(
            parse("POINT(1 2) POINT(3 4)"),
            Err(VectorizeError::Parse { position: 11, .. })
        ));
        assert!(matches!(parse(""), Err(VectorizeError::Parse { position: 0, .. })));
    }

    #[test]
    fn huge_coordinates_are_rejected() {
        assert_eq!(
            parse("POINT(1e400 2)"),
            Err(VectorizeError::parse(6, "coordinate out of range"))
        );
    }

    #[test]
    fn deeply_nested_collections_are_rejected() {
        let depth = 2000;
        let text = "GEOMETRYCOLLECTION(".repeat(depth) + "POINT(1 2)" + &")".repeat(depth);
        assert!(matches!(
            parse(&text),
            Err(VectorizeError::Parse { position: 626, .. })
        ));
    }
}
