use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type used in the entire vectorizer crate.
pub type Result<T> = std::result::Result<T, VectorizeError>;

/// The vectorizer crate's error type.
#[derive(Debug, Clone, PartialEq)]
pub enum VectorizeError {
    /// The text is not well formed WKT.
    Parse { position: usize, message: String },
    /// The keyword names a geometry kind outside of the supported set.
    UnsupportedKind(String),
    /// The geometry has more points than the record can hold.
    LengthExceeded { points: usize, max_points: usize },
    InvalidLayout { coord_channels: usize, min: usize },
    /// The layout was written by a version this crate does not read.
    UnsupportedLayoutVersion { version: u32, expected: u32 },
    PairLengthMismatch { left: usize, right: usize },
    /// Wraps a failure with the offending record of a batch.
    Record {
        index: usize,
        wkt: String,
        source: Box<VectorizeError>,
    },
}

impl VectorizeError {
    pub(crate) fn parse<S: Into<String>>(position: usize, message: S) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }

    /// Attaches the batch position and the raw text of the record that failed.
    ///
    /// # Arguments
    /// * `index` - The position of the record inside its batch, or its line in a source file.
    /// * `wkt` - The raw text of the record.
    ///
    /// # Returns
    /// A `Record` error wrapping `self`.
    pub fn at_record(self, index: usize, wkt: &str) -> Self {
        Self::Record {
            index,
            wkt: wkt.to_string(),
            source: Box::new(self),
        }
    }

    /// Strips any `Record` wrapping and returns the underlying failure.
    pub fn root(&self) -> &VectorizeError {
        match self {
            Self::Record { source, .. } => source.root(),
            other => other,
        }
    }
}

impl Display for VectorizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse { position, message } => {
                write!(f, "invalid wkt at byte {position}: {message}")
            }
            Self::UnsupportedKind(kind) => write!(f, "unsupported geometry kind: {kind}"),
            Self::LengthExceeded { points, max_points } => write!(
                f,
                "geometry has {points} points which exceeds the maximum of {max_points}"
            ),
            Self::InvalidLayout {
                coord_channels,
                min,
            } => write!(
                f,
                "feature layout needs at least {min} coordinate channels, got {coord_channels}"
            ),
            Self::UnsupportedLayoutVersion { version, expected } => write!(
                f,
                "feature layout version {version} is not supported, expected {expected}"
            ),
            Self::PairLengthMismatch { left, right } => write!(
                f,
                "paired collections differ in length, got {left} and {right}"
            ),
            Self::Record { index, wkt, source } => {
                write!(f, "record {index} ({wkt}): {source}")
            }
        }
    }
}

impl Error for VectorizeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Record { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}
