use std::{fs, path::Path};

use geo_vectorizer::{
    FeatureLayout, OverflowPolicy, max_points, max_points_paired, point_count, vectorize_batch,
    vectorize_pair_batch,
};
use log::{debug, info, warn};
use ndarray::Array3;

use crate::{PrepError, Result, archive::Archive, csv::CsvTable};

const COLUMNS: [&str; 9] = [
    "brt_wkt",
    "osm_wkt",
    "intersection_wkt",
    "centroid_distance",
    "geom_distance",
    "brt_centroid",
    "osm_centroid",
    "brt_centroid_rd",
    "osm_centroid_rd",
];

/// One line of the topology training csv.
#[derive(Debug, Clone, PartialEq)]
pub struct TopologyRecord {
    pub line: usize,
    pub brt_wkt: String,
    pub osm_wkt: String,
    pub intersection_wkt: String,
    pub centroid_distance: f64,
    pub geom_distance: f64,
    pub brt_centroid: String,
    pub osm_centroid: String,
    pub brt_centroid_rd: String,
    pub osm_centroid_rd: String,
}

impl TopologyRecord {
    /// The length of the `brt;osm` text of the record.
    pub fn sequence_len(&self) -> usize {
        self.brt_wkt.len() + 1 + self.osm_wkt.len()
    }

    fn geometries(&self) -> [&str; 3] {
        [&self.brt_wkt, &self.osm_wkt, &self.intersection_wkt].map(String::as_str)
    }

    fn centroids(&self) -> [(&'static str, &str); 4] {
        [
            ("brt_centroid", self.brt_centroid.as_str()),
            ("osm_centroid", self.osm_centroid.as_str()),
            ("brt_centroid_rd", self.brt_centroid_rd.as_str()),
            ("osm_centroid_rd", self.osm_centroid_rd.as_str()),
        ]
    }
}

/// Reads the topology training csv at `path`.
pub fn read_records(path: &Path) -> Result<Vec<TopologyRecord>> {
    let text = fs::read_to_string(path)?;
    parse_records(&text)
}

/// Parses topology training csv text into records.
///
/// # Returns
/// The records in file order, or an error for a missing column or a distance that isn't a number.
pub fn parse_records(text: &str) -> Result<Vec<TopologyRecord>> {
    let table = CsvTable::parse(text)?;
    let columns = COLUMNS
        .iter()
        .map(|name| table.column(name))
        .collect::<Result<Vec<_>>>()?;

    table
        .rows()
        .iter()
        .map(|row| {
            let field = |i: usize| row.fields[columns[i]].clone();
            let number = |i: usize| {
                let value = &row.fields[columns[i]];
                value.trim().parse::<f64>().map_err(|_| PrepError::InvalidField {
                    line: row.line,
                    column: COLUMNS[i].to_string(),
                    value: value.clone(),
                })
            };

            Ok(TopologyRecord {
                line: row.line,
                brt_wkt: field(0),
                osm_wkt: field(1),
                intersection_wkt: field(2),
                centroid_distance: number(3)?,
                geom_distance: number(4)?,
                brt_centroid: field(5),
                osm_centroid: field(6),
                brt_centroid_rd: field(7),
                osm_centroid_rd: field(8),
            })
        })
        .collect()
}

/// The named arrays of a vectorized topology corpus.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorizedCorpus {
    pub input_geoms: Array3<f64>,
    pub intersection: Array3<f64>,
    pub centroid_distance: Array3<f64>,
    pub geom_distance: Array3<f64>,
    pub brt_centroid: Array3<f64>,
    pub osm_centroid: Array3<f64>,
    pub centroids: Array3<f64>,
    pub centroids_rd: Array3<f64>,
}

impl VectorizedCorpus {
    /// The amount of records in the corpus.
    pub fn len(&self) -> usize {
        self.input_geoms.dim().0
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The shared amount of rows of `input_geoms` and `intersection`.
    pub fn max_points(&self) -> usize {
        self.input_geoms.dim().1
    }

    /// Packs the arrays under their field names, recording `layout` in the metadata.
    pub fn to_archive(&self, layout: &FeatureLayout) -> Result<Archive> {
        let mut archive = Archive::new();
        archive.insert_f64("input_geoms", &self.input_geoms);
        archive.insert_f64("intersection", &self.intersection);
        archive.insert_f64("centroid_distance", &self.centroid_distance);
        archive.insert_f64("geom_distance", &self.geom_distance);
        archive.insert_f64("brt_centroid", &self.brt_centroid);
        archive.insert_f64("osm_centroid", &self.osm_centroid);
        archive.insert_f64("centroids", &self.centroids);
        archive.insert_f64("centroids_rd", &self.centroids_rd);
        archive.set_layout(layout)?;
        Ok(archive)
    }
}

/// Turns topology records into the arrays of a `VectorizedCorpus`.
///
/// Records whose `brt;osm` text is longer than `max_sequence_len` are dropped first. Every
/// remaining record is then screened: its geometries must parse and each centroid must be a
/// single point. A record failing the screening is skipped with a warning when `skip_invalid`
/// is set, otherwise it aborts the whole step.
///
/// # Arguments
/// * `records` - The csv records.
/// * `max_sequence_len` - The text length filter.
/// * `skip_invalid` - Whether to skip records that fail the screening.
/// * `layout` - The channel layout of every geometry row.
///
/// # Returns
/// The vectorized corpus, or an error if a record is invalid and may not be skipped, or if no
/// records remain.
pub fn vectorize_corpus(
    records: &[TopologyRecord],
    max_sequence_len: usize,
    skip_invalid: bool,
    layout: &FeatureLayout,
) -> Result<VectorizedCorpus> {
    let short: Vec<_> = records
        .iter()
        .filter(|record| record.sequence_len() <= max_sequence_len)
        .collect();
    info!(
        "{} of {} records within the sequence length of {max_sequence_len}",
        short.len(),
        records.len()
    );

    let mut kept = Vec::with_capacity(short.len());
    for record in short {
        match screen(record) {
            Ok(()) => kept.push(record),
            Err(e) if skip_invalid => warn!("skipping csv line {}: {e}", record.line),
            Err(e) => return Err(e),
        }
    }

    if kept.is_empty() {
        return Err(PrepError::Empty("topology records left to vectorize".into()));
    }

    let brt = column(&kept, |r| r.brt_wkt.as_str());
    let osm = column(&kept, |r| r.osm_wkt.as_str());
    let intersection = column(&kept, |r| r.intersection_wkt.as_str());
    let brt_centroid = column(&kept, |r| r.brt_centroid.as_str());
    let osm_centroid = column(&kept, |r| r.osm_centroid.as_str());
    let brt_centroid_rd = column(&kept, |r| r.brt_centroid_rd.as_str());
    let osm_centroid_rd = column(&kept, |r| r.osm_centroid_rd.as_str());

    let max = max_points_paired(&brt, &osm)?.max(max_points(&[&intersection[..]])?);
    debug!("vectorizing {} records to {max} points", kept.len());

    let policy = OverflowPolicy::Reject;
    Ok(VectorizedCorpus {
        input_geoms: vectorize_pair_batch(&brt, &osm, max, layout, policy)?,
        intersection: vectorize_batch(&intersection, max, layout, policy)?,
        centroid_distance: distance(&kept, |r| r.centroid_distance),
        geom_distance: distance(&kept, |r| r.geom_distance),
        brt_centroid: vectorize_batch(&brt_centroid, 1, layout, policy)?,
        osm_centroid: vectorize_batch(&osm_centroid, 1, layout, policy)?,
        centroids: vectorize_pair_batch(&brt_centroid, &osm_centroid, 2, layout, policy)?,
        centroids_rd: vectorize_pair_batch(&brt_centroid_rd, &osm_centroid_rd, 2, layout, policy)?,
    })
}

fn column<'a>(
    records: &[&'a TopologyRecord],
    get: impl Fn(&'a TopologyRecord) -> &'a str,
) -> Vec<&'a str> {
    records.iter().map(|&record| get(record)).collect()
}

// A distance value followed by a zero slot, as `(records, 1, 2)`.
fn distance(records: &[&TopologyRecord], get: impl Fn(&TopologyRecord) -> f64) -> Array3<f64> {
    Array3::from_shape_fn((records.len(), 1, 2), |(i, _, c)| {
        if c == 0 { get(records[i]) } else { 0. }
    })
}

// Failures are reported at the csv line of the record.
fn screen(record: &TopologyRecord) -> Result<()> {
    for wkt in record.geometries() {
        point_count(wkt).map_err(|e| e.at_record(record.line, wkt))?;
    }

    for (column, wkt) in record.centroids() {
        let points = point_count(wkt).map_err(|e| e.at_record(record.line, wkt))?;
        if points != 1 {
            return Err(PrepError::InvalidField {
                line: record.line,
                column: column.to_string(),
                value: wkt.to_string(),
            });
        }
    }

    Ok(())
}

/// Reads, vectorizes and archives the topology training csv in one go.
///
/// # Returns
/// The written corpus.
pub fn prepare_corpus(
    csv: &Path,
    output: &Path,
    max_sequence_len: usize,
    skip_invalid: bool,
    layout: &FeatureLayout,
) -> Result<VectorizedCorpus> {
    info!("reading {}", csv.display());
    let records = read_records(csv)?;

    let corpus = vectorize_corpus(&records, max_sequence_len, skip_invalid, layout)?;
    corpus.to_archive(layout)?.save(output)?;
    info!("saved {} vectorized records to {}", corpus.len(), output.display());

    Ok(corpus)
}
