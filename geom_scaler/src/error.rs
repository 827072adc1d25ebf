use std::{error::Error, fmt};

/// The scaler crate's result type.
pub type Result<T> = std::result::Result<T, ScaleError>;

/// Normalization failures.
#[derive(Debug, Clone, PartialEq)]
pub enum ScaleError {
    /// The batch has no rendered point to fit a scale on.
    EmptyBatch,
    /// The variance is zero, negative or not finite, dividing by it would yield non finite
    /// coordinates.
    DegenerateScale { variance: f64 },
    ShapeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
}

impl fmt::Display for ScaleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScaleError::EmptyBatch => write!(f, "the batch holds no rendered points"),
            ScaleError::DegenerateScale { variance } => {
                write!(f, "degenerate scale, variance is {variance}")
            }
            ScaleError::ShapeMismatch {
                what,
                got,
                expected,
            } => write!(f, "shape mismatch for {what}: got {got}, expected {expected}"),
        }
    }
}

impl Error for ScaleError {}
