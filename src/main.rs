use std::env;

use anyhow::{Result, bail};
use geo_vectorizer::FeatureLayout;
use log::info;

use topoml::{NormalizeConfig, VectorizeConfig, normalize_datasets, prepare_corpus};

const USAGE: &str = "usage: topoml <vectorize | normalize [--test]>";

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["vectorize"] => vectorize(),
        ["normalize"] => normalize(false),
        ["normalize", "--test" | "-t"] => normalize(true),
        _ => bail!(USAGE),
    }
}

fn vectorize() -> Result<()> {
    let config = VectorizeConfig::from_env()?;
    let layout = FeatureLayout::default();

    let corpus = prepare_corpus(
        config.csv(),
        config.output(),
        config.max_sequence_len(),
        config.skip_invalid(),
        &layout,
    )?;

    info!(
        "vectorized {} records of up to {} points into {}",
        corpus.len(),
        corpus.max_points(),
        config.output().display()
    );
    Ok(())
}

fn normalize(separate_test: bool) -> Result<()> {
    let config = NormalizeConfig::from_env(separate_test)?;
    let summary = normalize_datasets(&config)?;

    info!(
        "normalized {} training and {} test records over {} classes, variance {}{}",
        summary.train_records,
        summary.test_records,
        summary.num_classes,
        summary.normalizer.scale().variance(),
        if summary.normalizer.localized() { " (localized)" } else { "" },
    );
    Ok(())
}
