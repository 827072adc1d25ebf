use std::{fmt, slice};

/// A single position, with the optional z and m ordinates kept as given.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
    pub m: Option<f64>,
}

impl Coord {
    pub fn xy(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            z: None,
            m: None,
        }
    }

    /// Iterates the ordinates in channel order: x, y, then z and m when present.
    pub fn ordinates(&self) -> impl Iterator<Item = f64> + '_ {
        [Some(self.x), Some(self.y), self.z, self.m]
            .into_iter()
            .flatten()
    }
}

/// The supported geometry kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    GeometryCollection,
}

impl GeometryKind {
    /// Resolves an upper case WKT keyword.
    pub(crate) fn from_keyword(keyword: &str) -> Option<Self> {
        let kind = match keyword {
            "POINT" => Self::Point,
            "LINESTRING" => Self::LineString,
            "POLYGON" => Self::Polygon,
            "MULTIPOINT" => Self::MultiPoint,
            "MULTILINESTRING" => Self::MultiLineString,
            "MULTIPOLYGON" => Self::MultiPolygon,
            "GEOMETRYCOLLECTION" => Self::GeometryCollection,
            _ => return None,
        };

        Some(kind)
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Point => "POINT",
            Self::LineString => "LINESTRING",
            Self::Polygon => "POLYGON",
            Self::MultiPoint => "MULTIPOINT",
            Self::MultiLineString => "MULTILINESTRING",
            Self::MultiPolygon => "MULTIPOLYGON",
            Self::GeometryCollection => "GEOMETRYCOLLECTION",
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

/// A parsed WKT geometry.
///
/// Rings and members keep the order they had in the text, the traversal order of the points
/// is significant for the encoded sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Option<Coord>),
    LineString(Vec<Coord>),
    Polygon(Vec<Vec<Coord>>),
    MultiPoint(Vec<Coord>),
    MultiLineString(Vec<Vec<Coord>>),
    MultiPolygon(Vec<Vec<Vec<Coord>>>),
    GeometryCollection(Vec<Geometry>),
}

impl Geometry {
    pub fn kind(&self) -> GeometryKind {
        match self {
            Self::Point(_) => GeometryKind::Point,
            Self::LineString(_) => GeometryKind::LineString,
            Self::Polygon(_) => GeometryKind::Polygon,
            Self::MultiPoint(_) => GeometryKind::MultiPoint,
            Self::MultiLineString(_) => GeometryKind::MultiLineString,
            Self::MultiPolygon(_) => GeometryKind::MultiPolygon,
            Self::GeometryCollection(_) => GeometryKind::GeometryCollection,
        }
    }

    /// Flattens the geometry into its parts, in traversal order.
    ///
    /// A part is a run of points closed by a stop: a polygon ring, a line, or a single point of
    /// a multi point. Empty parts are left out so that they never produce a stop.
    ///
    /// # Returns
    /// The non empty parts of the geometry.
    pub fn parts(&self) -> Vec<&[Coord]> {
        let mut parts = Vec::new();
        let mut pending = vec![self];

        while let Some(geometry) = pending.pop() {
            match geometry {
                Self::Point(coord) => parts.extend(coord.as_ref().map(slice::from_ref)),
                Self::LineString(line) => parts.push(line.as_slice()),
                Self::Polygon(rings) => parts.extend(rings.iter().map(Vec::as_slice)),
                Self::MultiPoint(points) => parts.extend(points.iter().map(slice::from_ref)),
                Self::MultiLineString(lines) => parts.extend(lines.iter().map(Vec::as_slice)),
                Self::MultiPolygon(polygons) => {
                    parts.extend(polygons.iter().flatten().map(Vec::as_slice))
                }
                // reversed so members pop in text order
                Self::GeometryCollection(members) => pending.extend(members.iter().rev()),
            }
        }

        parts.retain(|part| !part.is_empty());
        parts
    }

    /// The total amount of points the geometry will encode into.
    pub fn point_count(&self) -> usize {
        self.parts().iter().map(|part| part.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.point_count() == 0
    }
}
