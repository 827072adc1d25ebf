pub mod archive;
pub mod config;
pub mod corpus;
mod csv;
pub mod dataset;
pub mod error;
pub mod normalizer;

pub use archive::Archive;
pub use config::{NormalizeConfig, VectorizeConfig};
pub use corpus::{
    TopologyRecord, VectorizedCorpus, parse_records, prepare_corpus, read_records,
    vectorize_corpus,
};
pub use dataset::GeometryDataset;
pub use error::{PrepError, Result};
pub use normalizer::{NormalizeSummary, Normalizer, normalize_datasets};
