use std::{error::Error, fmt, io};

use geo_vectorizer::{FeatureLayout, VectorizeError};
use geom_scaler::ScaleError;
use ndarray::ShapeError;
use safetensors::SafeTensorError;

/// The result type of the data preparation steps.
pub type Result<T> = std::result::Result<T, PrepError>;

/// Data preparation failures.
#[derive(Debug)]
pub enum PrepError {
    Io(io::Error),
    /// Malformed csv text.
    Csv { line: usize, msg: String },
    MissingColumn(String),
    InvalidField {
        line: usize,
        column: String,
        value: String,
    },
    Archive(SafeTensorError),
    MissingArray(String),
    ArrayType {
        name: String,
        expected: &'static str,
    },
    Shape(ShapeError),
    Json(serde_json::Error),
    Vectorize(VectorizeError),
    Scale(ScaleError),
    /// An environment variable holds a value that can't be parsed.
    Config { key: String, value: String },
    MissingVar(String),
    NegativeLabel { index: usize, label: i64 },
    LengthMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    /// Archives meant to be used together were written with different layouts.
    LayoutMismatch {
        expected: FeatureLayout,
        got: FeatureLayout,
    },
    /// Nothing was left to work with after filtering or loading.
    Empty(String),
}

impl fmt::Display for PrepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Csv { line, msg } => write!(f, "csv line {line}: {msg}"),
            Self::MissingColumn(name) => write!(f, "missing csv column: {name}"),
            Self::InvalidField {
                line,
                column,
                value,
            } => write!(f, "csv line {line}: invalid {column} '{value}'"),
            Self::Archive(e) => write!(f, "archive error: {e}"),
            Self::MissingArray(name) => write!(f, "archive has no array named {name}"),
            Self::ArrayType { name, expected } => {
                write!(f, "array {name} is not of type {expected}")
            }
            Self::Shape(e) => write!(f, "shape error: {e}"),
            Self::Json(e) => write!(f, "json error: {e}"),
            Self::Vectorize(e) => write!(f, "vectorize error: {e}"),
            Self::Scale(e) => write!(f, "scale error: {e}"),
            Self::Config { key, value } => write!(f, "invalid value for {key}: '{value}'"),
            Self::MissingVar(key) => write!(f, "environment variable {key} is not set"),
            Self::NegativeLabel { index, label } => {
                write!(f, "label {label} of record {index} is negative")
            }
            Self::LengthMismatch {
                what,
                got,
                expected,
            } => write!(f, "length mismatch for {what}: got {got}, expected {expected}"),
            Self::LayoutMismatch { expected, got } => write!(
                f,
                "layout with {} coordinate channels (version {}) does not match {} (version {})",
                got.coord_channels(),
                got.version(),
                expected.coord_channels(),
                expected.version()
            ),
            Self::Empty(what) => write!(f, "no {what}"),
        }
    }
}

impl Error for PrepError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Archive(e) => Some(e),
            Self::Shape(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Vectorize(e) => Some(e),
            Self::Scale(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for PrepError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<SafeTensorError> for PrepError {
    fn from(e: SafeTensorError) -> Self {
        Self::Archive(e)
    }
}

impl From<ShapeError> for PrepError {
    fn from(e: ShapeError) -> Self {
        Self::Shape(e)
    }
}

impl From<serde_json::Error> for PrepError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<VectorizeError> for PrepError {
    fn from(e: VectorizeError) -> Self {
        Self::Vectorize(e)
    }
}

impl From<ScaleError> for PrepError {
    fn from(e: ScaleError) -> Self {
        Self::Scale(e)
    }
}
