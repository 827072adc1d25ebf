use std::{env, path::PathBuf, str::FromStr};

use geom_scaler::GeomScale;

use crate::{PrepError, Result};

const DEFAULT_MAX_SEQUENCE_LEN: usize = 250;
const DEFAULT_TEST_SPLIT: f64 = 0.1;
const DEFAULT_GEOMS_ARRAY: &str = "geoms";
const DEFAULT_LABELS_ARRAY: &str = "building_type";

/// Settings of the corpus vectorization step, read once at startup.
#[derive(Debug, Clone)]
pub struct VectorizeConfig {
    csv: PathBuf,
    output: PathBuf,
    max_sequence_len: usize,
    skip_invalid: bool,
}

impl VectorizeConfig {
    /// Creates a new vectorization configuration.
    ///
    /// # Args
    /// * `csv` - The topology training csv file.
    /// * `output` - Where to write the vectorized archive.
    /// * `max_sequence_len` - The maximum length of the `brt;osm` text of a kept record.
    /// * `skip_invalid` - Whether records that fail to parse are skipped instead of aborting.
    pub fn new(csv: PathBuf, output: PathBuf, max_sequence_len: usize, skip_invalid: bool) -> Self {
        Self {
            csv,
            output,
            max_sequence_len,
            skip_invalid,
        }
    }

    /// Reads the configuration from `TOPOLOGY_TRAINING_CSV`, `GEODATA_VECTORIZED`,
    /// `MAX_SEQUENCE_LEN` and `SKIP_INVALID`.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(
            required("TOPOLOGY_TRAINING_CSV")?.into(),
            required("GEODATA_VECTORIZED")?.into(),
            parsed("MAX_SEQUENCE_LEN", DEFAULT_MAX_SEQUENCE_LEN)?,
            parsed("SKIP_INVALID", true)?,
        ))
    }

    pub fn csv(&self) -> &PathBuf {
        &self.csv
    }

    pub fn output(&self) -> &PathBuf {
        &self.output
    }

    pub fn max_sequence_len(&self) -> usize {
        self.max_sequence_len
    }

    pub fn skip_invalid(&self) -> bool {
        self.skip_invalid
    }
}

/// Settings of the dataset normalization step, read once at startup.
#[derive(Debug, Clone)]
pub struct NormalizeConfig {
    data_folder: PathBuf,
    prefix: String,
    geoms_array: String,
    labels_array: String,
    test_split: f64,
    seed: Option<u64>,
    scale: Option<GeomScale>,
    localized: bool,
    test_file: Option<PathBuf>,
}

impl NormalizeConfig {
    /// Creates a new normalization configuration with the default array names, a tenth of the
    /// records held out, a random seed and a fitted global scale.
    ///
    /// # Args
    /// * `data_folder` - The folder holding the dataset archives.
    /// * `prefix` - The file name prefix of the archives to load.
    pub fn new(data_folder: PathBuf, prefix: String) -> Self {
        Self {
            data_folder,
            prefix,
            geoms_array: DEFAULT_GEOMS_ARRAY.to_string(),
            labels_array: DEFAULT_LABELS_ARRAY.to_string(),
            test_split: DEFAULT_TEST_SPLIT,
            seed: None,
            scale: None,
            localized: false,
            test_file: None,
        }
    }

    /// Reads the configuration from the environment.
    ///
    /// `DATA_FOLDER` and `FILENAME_PREFIX` are required. A `GEOM_SCALE` of zero, the default,
    /// means the scale gets fitted on the training split. `TEST_FILE` is only read when
    /// `separate_test` is set.
    pub fn from_env(separate_test: bool) -> Result<Self> {
        let mut config = Self::new(required("DATA_FOLDER")?.into(), required("FILENAME_PREFIX")?)
            .with_test_split(parsed("TEST_SPLIT", DEFAULT_TEST_SPLIT)?)?
            .with_localized(parsed("LOCALIZED", false)?);

        if let Ok(name) = env::var("GEOMS_ARRAY") {
            config.geoms_array = name;
        }
        if let Ok(name) = env::var("LABELS_ARRAY") {
            config.labels_array = name;
        }
        if let Some(seed) = optional("SEED")? {
            config = config.with_seed(seed);
        }

        let variance: f64 = parsed("GEOM_SCALE", 0.)?;
        if variance != 0. {
            let scale = GeomScale::new(variance).map_err(|_| PrepError::Config {
                key: "GEOM_SCALE".into(),
                value: variance.to_string(),
            })?;
            config = config.with_scale(scale);
        }

        if separate_test {
            config = config.with_test_file(required("TEST_FILE")?.into());
        }

        Ok(config)
    }

    /// Sets the share of held out records, which must lie in `[0, 1)`.
    pub fn with_test_split(mut self, test_split: f64) -> Result<Self> {
        if !(0. ..1.).contains(&test_split) {
            return Err(PrepError::Config {
                key: "TEST_SPLIT".into(),
                value: test_split.to_string(),
            });
        }
        self.test_split = test_split;
        Ok(self)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_scale(mut self, scale: GeomScale) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn with_localized(mut self, localized: bool) -> Self {
        self.localized = localized;
        self
    }

    pub fn with_test_file(mut self, test_file: PathBuf) -> Self {
        self.test_file = Some(test_file);
        self
    }

    pub fn data_folder(&self) -> &PathBuf {
        &self.data_folder
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn geoms_array(&self) -> &str {
        &self.geoms_array
    }

    pub fn labels_array(&self) -> &str {
        &self.labels_array
    }

    /// The share of records held out for testing, in `[0, 1)`.
    pub fn test_split(&self) -> f64 {
        self.test_split
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// A fixed scale overriding the fitted one.
    pub fn scale(&self) -> Option<GeomScale> {
        self.scale
    }

    pub fn localized(&self) -> bool {
        self.localized
    }

    /// The archive used as test set instead of a split of the training data.
    pub fn test_file(&self) -> Option<&PathBuf> {
        self.test_file.as_ref()
    }
}

fn required(key: &str) -> Result<String> {
    env::var(key).map_err(|_| PrepError::MissingVar(key.to_string()))
}

fn optional<T: FromStr>(key: &str) -> Result<Option<T>> {
    match env::var(key) {
        Ok(value) => parse(key, &value).map(Some),
        Err(_) => Ok(None),
    }
}

fn parsed<T: FromStr>(key: &str, default: T) -> Result<T> {
    Ok(optional(key)?.unwrap_or(default))
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| PrepError::Config {
        key: key.to_string(),
        value: value.to_string(),
    })
}
