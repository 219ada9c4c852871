//! CSV metadata loading and label encoding
//!
//! The training metadata maps image ids to raw landmark ids; the test
//! metadata carries ids only. Before any batching begins the metadata is
//! filtered down to classes with enough samples and to images that actually
//! exist on the content store, then raw landmark ids are encoded into a dense
//! class-index space. The encoded label space is fixed from that point on and
//! shared by the dataset, the model head, and the GAP metric.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use super::{Locator, Sample, Split};
use crate::utils::error::{LandmarkError, Result};

/// One row of the training metadata CSV (`id,url,landmark_id`).
/// The `url` column is dropped on load.
#[derive(Debug, Clone, Deserialize)]
pub struct TrainRecord {
    pub id: String,
    #[serde(default)]
    #[allow(dead_code)]
    pub url: Option<String>,
    pub landmark_id: String,
}

/// One row of the test metadata CSV (`id`, possibly more columns).
#[derive(Debug, Clone, Deserialize)]
struct TestRecord {
    id: String,
}

/// Read the training metadata CSV into records
pub fn read_train_metadata(path: impl AsRef<Path>) -> Result<Vec<TrainRecord>> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;
    let records: std::result::Result<Vec<TrainRecord>, csv::Error> =
        reader.deserialize().collect();
    let records = records?;
    info!("Loaded {} train metadata rows", records.len());
    Ok(records)
}

/// Read the test metadata CSV into bare ids
pub fn read_test_metadata(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;
    let mut ids = Vec::new();
    for record in reader.deserialize::<TestRecord>() {
        ids.push(record?.id);
    }
    info!("Loaded {} test metadata rows", ids.len());
    Ok(ids)
}

/// Keep only rows whose raw landmark id occurs at least `min_samples` times
pub fn filter_frequent_classes(
    records: Vec<TrainRecord>,
    min_samples: usize,
) -> Vec<TrainRecord> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in &records {
        *counts.entry(record.landmark_id.as_str()).or_insert(0) += 1;
    }

    let selected: BTreeSet<String> = counts
        .iter()
        .filter(|(_, &count)| count >= min_samples)
        .map(|(&label, _)| label.to_string())
        .collect();

    info!(
        "Classes with at least {} samples: {}",
        min_samples,
        selected.len()
    );

    records
        .into_iter()
        .filter(|r| selected.contains(&r.landmark_id))
        .collect()
}

/// Keep only rows whose image file exists under the locator.
///
/// Everything downstream treats existence as a precondition, so this is the
/// single place that touches the filesystem for it.
pub fn filter_existing<T, F>(rows: Vec<T>, locator: &dyn Locator, split: Split, id_of: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    let before = rows.len();
    let kept: Vec<T> = rows
        .into_iter()
        .filter(|row| locator.locate(id_of(row), split).exists())
        .collect();
    info!(
        "Existence filter ({}): {} of {} rows kept",
        split,
        kept.len(),
        before
    );
    kept
}

/// Bidirectional mapping between raw landmark ids and dense class indices.
///
/// Fitted once over the filtered training labels; the index space is the
/// sorted order of the distinct raw labels.
#[derive(Debug, Clone)]
pub struct LabelEncoder {
    label_to_index: HashMap<String, usize>,
    index_to_label: Vec<String>,
}

impl LabelEncoder {
    /// Fit the encoder over raw labels
    pub fn fit<'a>(labels: impl IntoIterator<Item = &'a str>) -> Self {
        let distinct: BTreeSet<&str> = labels.into_iter().collect();
        let index_to_label: Vec<String> = distinct.into_iter().map(str::to_string).collect();
        let label_to_index = index_to_label
            .iter()
            .enumerate()
            .map(|(idx, label)| (label.clone(), idx))
            .collect();

        Self {
            label_to_index,
            index_to_label,
        }
    }

    /// Encode a raw label into its class index
    pub fn transform(&self, label: &str) -> Result<usize> {
        self.label_to_index
            .get(label)
            .copied()
            .ok_or_else(|| LandmarkError::Metadata(format!("unknown label '{label}'")))
    }

    /// Decode a class index back to the raw label
    pub fn inverse(&self, index: usize) -> Result<&str> {
        self.index_to_label
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| LandmarkError::Metadata(format!("class index {index} out of range")))
    }

    /// Size of the encoded label space
    pub fn num_classes(&self) -> usize {
        self.index_to_label.len()
    }
}

/// Encode filtered train records into samples carrying class indices
pub fn encode_samples(records: &[TrainRecord], encoder: &LabelEncoder) -> Result<Vec<Sample>> {
    records
        .iter()
        .map(|r| {
            let label = encoder.transform(&r.landmark_id)?;
            Ok(Sample::labeled(r.id.clone(), label))
        })
        .collect()
}
