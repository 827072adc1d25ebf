use serde::{Deserialize, Serialize};

use crate::{Result, ScaleError};

/// The fitted variance of the coordinate channels of a training batch.
///
/// A `GeomScale` can only hold a strictly positive and finite variance. Once fitted it is never
/// modified: the very same value has to be handed to every transform of the experiment, for the
/// training batch as well as for the validation, test and inference batches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ScaleRecord", into = "ScaleRecord")]
pub struct GeomScale {
    variance: f64,
}

#[derive(Serialize, Deserialize)]
struct ScaleRecord {
    variance: f64,
}

impl GeomScale {
    /// Creates a new `GeomScale` from a known variance, e.g. one persisted by an earlier run.
    ///
    /// # Arguments
    /// * `variance` - The variance of the coordinate channels.
    ///
    /// # Returns
    /// The scale or `DegenerateScale` if the variance is not a positive normal number.
    pub fn new(variance: f64) -> Result<Self> {
        if !variance.is_finite() || variance < f64::MIN_POSITIVE {
            return Err(ScaleError::DegenerateScale { variance });
        }

        Ok(Self { variance })
    }

    pub fn variance(&self) -> f64 {
        self.variance
    }

    /// The divisor applied to the coordinate channels.
    pub fn std_dev(&self) -> f64 {
        self.variance.sqrt()
    }
}

impl TryFrom<ScaleRecord> for GeomScale {
    type Error = ScaleError;

    fn try_from(record: ScaleRecord) -> Result<Self> {
        Self::new(record.variance)
    }
}

impl From<GeomScale> for ScaleRecord {
    fn from(scale: GeomScale) -> Self {
        Self {
            variance: scale.variance,
        }
    }
}
