mod canonical;
mod geometry;
mod parser;

pub use canonical::MAX_NESTING;
pub use geometry::{Coord, Geometry, GeometryKind};
pub use parser::parse;
