use std::{
    env, fs,
    path::{Path, PathBuf},
};

use geo_vectorizer::{FeatureLayout, OverflowPolicy, vectorize_batch};
use geom_scaler::GeomScale;
use ndarray::{Ix3, array, s};
use topoml::{
    Archive, GeometryDataset, NormalizeConfig, Normalizer, PrepError, normalize_datasets,
    prepare_corpus,
};

const CSV: &str = "\
brt_wkt,osm_wkt,intersection_wkt,centroid_distance,geom_distance,brt_centroid,osm_centroid,brt_centroid_rd,osm_centroid_rd
\"POLYGON((0 0, 4 0, 4 4, 0 4, 0 0))\",\"POLYGON((2 2, 6 2, 6 6, 2 2))\",\"POLYGON((2 2, 4 2, 4 4, 2 2))\",2.83,0,\"POINT(2 2)\",\"POINT(4.67 3.33)\",\"POINT(155000 463000)\",\"POINT(155002 463001)\"
\"LINESTRING(0 0, 1 1)\",\"POINT(3 3)\",\"GEOMETRYCOLLECTION EMPTY\",2.12,2.83,\"POINT(0.5 0.5)\",\"POINT(3 3)\",\"POINT(1 1)\",\"POINT(4 4)\"
\"POLYGON((0 0, 1 0, 1 1, 0 0)\",\"POINT(3 3)\",\"POINT(0 0)\",1,1,\"POINT(0 0)\",\"POINT(3 3)\",\"POINT(1 1)\",\"POINT(4 4)\"
";

fn scratch(name: &str) -> PathBuf {
    let folder = env::temp_dir().join(format!("topoml-{name}-{}", std::process::id()));
    fs::create_dir_all(&folder).unwrap();
    folder
}

#[test]
fn csv_is_vectorized_into_an_archive() {
    let folder = scratch("corpus");
    let csv = folder.join("topology-training.csv");
    let output = folder.join("geodata_vectorized.safetensors");
    fs::write(&csv, CSV).unwrap();

    let layout = FeatureLayout::default();
    let corpus = prepare_corpus(&csv, &output, 250, true, &layout).unwrap();
    let archive = Archive::load(&output).unwrap();
    fs::remove_dir_all(&folder).unwrap();

    // the third line has an unclosed polygon
    assert_eq!(corpus.len(), 2);
    assert_eq!(corpus.max_points(), 9);

    let input = archive.get_f64_dim::<Ix3>("input_geoms").unwrap();
    assert_eq!(input, corpus.input_geoms);
    assert_eq!(input.dim(), (2, 9, 5));
    // the last point of the brt polygon closes the first part
    assert_eq!(input.slice(s![0, 4, 2..]), array![1., 1., 0.]);
    assert_eq!(input.slice(s![0, 8, 2..]), array![1., 0., 1.]);

    let intersection = archive.get_f64_dim::<Ix3>("intersection").unwrap();
    assert!(intersection.slice(s![1, .., ..]).iter().all(|&v| v == 0.));

    assert_eq!(
        archive.get_f64("geom_distance").unwrap().shape(),
        &[2, 1, 2]
    );
    let centroids_rd = archive.get_f64_dim::<Ix3>("centroids_rd").unwrap();
    assert_eq!(centroids_rd[[0, 1, 0]], 155002.);
    assert_eq!(archive.layout().unwrap(), layout);
}

fn buildings(wkts: &[&str], labels: Vec<i64>) -> GeometryDataset {
    let geoms = vectorize_batch(wkts, 5, &FeatureLayout::default(), OverflowPolicy::Reject).unwrap();
    GeometryDataset::new(geoms, labels).unwrap()
}

// Writes ten records over two prefixed training archives.
fn write_training(folder: &Path, layout: &FeatureLayout) {
    let first = buildings(
        &[
            "POLYGON((0 0, 10 0, 10 10, 0 0))",
            "POLYGON((5 5, 25 5, 25 30, 5 5))",
            "POINT(-4 8)",
            "LINESTRING(0 0, 3 4)",
        ],
        vec![0, 1, 2, 1],
    );
    let second = buildings(
        &[
            "POLYGON((100 100, 110 100, 110 120, 100 100))",
            "MULTIPOINT((1 2), (3 4))",
            "POINT(9 9)",
            "LINESTRING(-5 -5, 5 5, 5 -5)",
            "POINT(0 1)",
            "POINT(2 0)",
        ],
        vec![2, 0, 0, 1, 2, 0],
    );
    for (i, part) in [&first, &second].into_iter().enumerate() {
        let path = folder.join(format!("buildings-train-{i}.safetensors"));
        part.to_archive("geoms", "building_type", layout).unwrap().save(&path).unwrap();
    }
}

fn holdout() -> GeometryDataset {
    buildings(
        &[
            "POLYGON((0 0, 2 0, 2 2, 0 0))",
            "POINT(7 3)",
            "LINESTRING(1 1, 4 5, 9 9)",
        ],
        vec![0, 3, 1],
    )
}

#[test]
fn datasets_are_split_and_normalized() {
    let folder = scratch("normalize");
    let layout = FeatureLayout::default();
    write_training(&folder, &layout);

    let config = NormalizeConfig::new(folder.clone(), "buildings-train".into())
        .with_test_split(0.2)
        .unwrap()
        .with_seed(7);
    let summary = normalize_datasets(&config).unwrap();

    assert_eq!(summary.train_records, 8);
    assert_eq!(summary.test_records, 2);
    assert_eq!(summary.num_classes, 3);

    let normalizer = Normalizer::load(&folder.join("buildings-train_scale.json")).unwrap();
    assert_eq!(normalizer, summary.normalizer);

    let (train, _) = GeometryDataset::load(
        &folder.join("buildings-train_train_scaled.safetensors"),
        "geoms",
        "building_type",
    )
    .unwrap();
    let refitted = Normalizer::fit(train.geoms().view(), &layout, false).unwrap();
    assert!((refitted.scale().variance() - 1.).abs() < 1e-9);

    // a rerun with a fixed scale leaves the scaled outputs out of its input
    let fixed = GeomScale::new(4.).unwrap();
    let rerun = normalize_datasets(&config.clone().with_scale(fixed)).unwrap();
    fs::remove_dir_all(&folder).unwrap();

    assert_eq!(rerun.train_records, 8);
    assert_eq!(rerun.normalizer.scale(), fixed);
}

#[test]
fn separate_test_archive_replaces_the_split() {
    let folder = scratch("test-file");
    let layout = FeatureLayout::default();
    write_training(&folder, &layout);

    let test_path = folder.join("holdout.safetensors");
    let test = holdout();
    test.to_archive("geoms", "building_type", &layout).unwrap().save(&test_path).unwrap();

    let config = NormalizeConfig::new(folder.clone(), "buildings-train".into())
        .with_test_file(test_path);
    let summary = normalize_datasets(&config).unwrap();

    let (scaled, scaled_layout) = GeometryDataset::load(
        &folder.join("buildings-train_test_scaled.safetensors"),
        "geoms",
        "building_type",
    )
    .unwrap();
    fs::remove_dir_all(&folder).unwrap();

    // every training record is kept, the test set is the archive as given
    assert_eq!(summary.train_records, 10);
    assert_eq!(summary.test_records, 3);
    assert_eq!(summary.num_classes, 4);
    assert_eq!(scaled_layout, layout);
    assert_eq!(scaled.labels(), test.labels());
    assert_eq!(
        *scaled.geoms(),
        summary.normalizer.apply(test.geoms().view(), &layout).unwrap()
    );
}

#[test]
fn test_archive_must_share_the_training_layout() {
    let folder = scratch("test-layout");
    write_training(&folder, &FeatureLayout::default());

    let test_path = folder.join("holdout.safetensors");
    let other = FeatureLayout::new(3).unwrap();
    holdout()
        .to_archive("geoms", "building_type", &other)
        .unwrap()
        .save(&test_path)
        .unwrap();

    let config = NormalizeConfig::new(folder.clone(), "buildings-train".into())
        .with_test_file(test_path);
    let result = normalize_datasets(&config);
    fs::remove_dir_all(&folder).unwrap();

    assert!(matches!(
        result,
        Err(PrepError::LayoutMismatch { expected, got }) if got == other && expected != other
    ));
}

#[test]
fn localized_normalization_centers_every_record() {
    let folder = scratch("localized");
    let layout = FeatureLayout::default();
    write_training(&folder, &layout);

    let config = NormalizeConfig::new(folder.clone(), "buildings-train".into())
        .with_test_split(0.2)
        .unwrap()
        .with_seed(3)
        .with_localized(true);
    let summary = normalize_datasets(&config).unwrap();

    let sidecar = Normalizer::load(&folder.join("buildings-train_scale.json")).unwrap();
    let (train, _) = GeometryDataset::load(
        &folder.join("buildings-train_train_scaled.safetensors"),
        "geoms",
        "building_type",
    )
    .unwrap();
    fs::remove_dir_all(&folder).unwrap();

    assert!(summary.normalizer.localized());
    assert_eq!(sidecar, summary.normalizer);
    assert_eq!(train.len(), 8);

    for record in train.geoms().outer_iter() {
        let rendered: Vec<_> = record
            .outer_iter()
            .filter(|row| layout.is_rendered(row.view()))
            .collect();
        assert!(!rendered.is_empty());

        for channel in layout.coords() {
            let mean = rendered.iter().map(|row| row[channel]).sum::<f64>() / rendered.len() as f64;
            assert!(mean.abs() < 1e-9, "record mean {mean} on channel {channel}");
        }
    }
}
