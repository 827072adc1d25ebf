use std::ops::Range;

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use crate::{Result, VectorizeError};

/// Current version of the channel arrangement described by `FeatureLayout`.
pub const LAYOUT_VERSION: u32 = 1;

const MIN_COORD_CHANNELS: usize = 2;
const FLAG_CHANNELS: usize = 3;

/// The arrangement of channels inside every feature vector.
///
/// Coordinates come first, followed by the render, stop and full stop flags:
///
/// ```text
/// | x | y | extra.. | render | stop | full stop |
/// ```
///
/// The same layout must be handed to the vectorizer and to the scaler, the
/// flag positions are always derived from it and never hardcoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawLayout", into = "RawLayout")]
pub struct FeatureLayout {
    version: u32,
    coord_channels: usize,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
struct RawLayout {
    version: u32,
    coord_channels: usize,
}

impl FeatureLayout {
    /// Creates a new `FeatureLayout`.
    ///
    /// # Arguments
    /// * `coord_channels` - The amount of coordinate channels, at least two (x and y). Extra
    ///   channels hold the z and m ordinates when the geometry carries them.
    ///
    /// # Returns
    /// A new layout or an error if there are fewer than two coordinate channels.
    pub fn new(coord_channels: usize) -> Result<Self> {
        if coord_channels < MIN_COORD_CHANNELS {
            return Err(VectorizeError::InvalidLayout {
                coord_channels,
                min: MIN_COORD_CHANNELS,
            });
        }

        Ok(Self {
            version: LAYOUT_VERSION,
            coord_channels,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn coord_channels(&self) -> usize {
        self.coord_channels
    }

    /// The channel range holding coordinates.
    pub fn coords(&self) -> Range<usize> {
        0..self.coord_channels
    }

    pub fn render_index(&self) -> usize {
        self.coord_channels
    }

    pub fn stop_index(&self) -> usize {
        self.coord_channels + 1
    }

    pub fn full_stop_index(&self) -> usize {
        self.coord_channels + 2
    }

    /// The total length of a feature vector.
    pub fn width(&self) -> usize {
        self.coord_channels + FLAG_CHANNELS
    }

    /// Whether the given feature vector holds a real point rather than padding.
    ///
    /// # Arguments
    /// * `row` - A feature vector of `width()` values.
    pub fn is_rendered(&self, row: ArrayView1<f64>) -> bool {
        row[self.render_index()] != 0.0
    }
}

impl Default for FeatureLayout {
    fn default() -> Self {
        Self {
            version: LAYOUT_VERSION,
            coord_channels: MIN_COORD_CHANNELS,
        }
    }
}

impl TryFrom<RawLayout> for FeatureLayout {
    type Error = VectorizeError;

    fn try_from(raw: RawLayout) -> Result<Self> {
        if raw.version != LAYOUT_VERSION {
            return Err(VectorizeError::UnsupportedLayoutVersion {
                version: raw.version,
                expected: LAYOUT_VERSION,
            });
        }

        Self::new(raw.coord_channels)
    }
}

impl From<FeatureLayout> for RawLayout {
    fn from(layout: FeatureLayout) -> Self {
        Self {
            version: layout.version,
            coord_channels: layout.coord_channels,
        }
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn default_layout_is_five_wide() {
        let layout = FeatureLayout::default();
        assert_eq!(layout.width(), 5);
        assert_eq!(layout.coords(), 0..2);
        assert_eq!(layout.render_index(), 2);
        assert_eq!(layout.stop_index(), 3);
        assert_eq!(layout.full_stop_index(), 4);
    }

    #[test]
    fn extra_channels_shift_the_flags() {
        let layout = FeatureLayout::new(4).unwrap();
        assert_eq!(layout.width(), 7);
        assert_eq!(layout.render_index(), 4);
        assert_eq!(layout.full_stop_index(), 6);
    }

    #[test]
    fn rejects_single_coordinate_channel() {
        assert_eq!(
            FeatureLayout::new(1),
            Err(VectorizeError::InvalidLayout {
                coord_channels: 1,
                min: 2
            })
        );
    }

    #[test]
    fn rendered_rows_are_detected_by_flag() {
        let layout = FeatureLayout::default();
        assert!(layout.is_rendered(array![1., 2., 1., 0., 1.].view()));
        assert!(!layout.is_rendered(array![0., 0., 0., 0., 0.].view()));
    }

    #[test]
    fn json_roundtrip_validates() {
        let layout = FeatureLayout::new(3).unwrap();
        let json = serde_json::to_string(&layout).unwrap();
        assert_eq!(json, r#"{"version":1,"coord_channels":3}"#);
        assert_eq!(serde_json::from_str::<FeatureLayout>(&json).unwrap(), layout);

        let bad = r#"{"version":1,"coord_channels":0}"#;
        assert!(serde_json::from_str::<FeatureLayout>(bad).is_err());
    }

    #[test]
    fn unknown_versions_are_rejected() {
        let raw = RawLayout {
            version: 2,
            coord_channels: 2,
        };
        assert_eq!(
            FeatureLayout::try_from(raw),
            Err(VectorizeError::UnsupportedLayoutVersion {
                version: 2,
                expected: LAYOUT_VERSION
            })
        );

        let json = r#"{"version":0,"coord_channels":2}"#;
        assert!(serde_json::from_str::<FeatureLayout>(json).is_err());
    }
}
