mod batch;
pub mod error;
pub mod layout;
mod vectorizer;
pub mod wkt;

pub use batch::{max_points, max_points_paired, point_count, vectorize_batch, vectorize_pair_batch};
pub use error::{Result, VectorizeError};
pub use layout::FeatureLayout;
pub use vectorizer::{OverflowPolicy, vectorize_geometry, vectorize_two_wkts, vectorize_wkt};
pub use self::wkt::{Coord, Geometry, GeometryKind};
