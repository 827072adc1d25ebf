pub mod error;
mod global;
mod localized;
mod scale;

pub use error::{Result, ScaleError};
pub use global::{inverse_transform, scale, transform};
pub use localized::{localized_mean, localized_normal, localized_scale};
pub use scale::GeomScale;
