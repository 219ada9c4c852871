//! Submission assembly: merge ranked predictions into a template table
//!
//! The template fixes the row set and row order of the output. Predictions
//! overwrite the `landmarks` cell of matching ids with a space-separated
//! string of "label confidence" pairs in descending confidence order; rows
//! the predictions do not cover pass through unchanged. The table is written
//! only after the merge has fully assembled, so an aborted run leaves no
//! partial file behind.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset::metadata::LabelEncoder;
use crate::inference::InferenceOutput;
use crate::utils::error::{LandmarkError, Result};

/// One row of the submission table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRow {
    /// Sample id
    pub id: String,
    /// Space-separated "label confidence" pairs, most confident first
    pub landmarks: String,
}

/// Submission table keyed by sample id, preserving template row order
#[derive(Debug, Clone)]
pub struct SubmissionTable {
    rows: Vec<SubmissionRow>,
    index: HashMap<String, usize>,
}

impl SubmissionTable {
    /// Read the template table (`id`, `landmarks` columns) from a CSV file
    pub fn from_template(path: impl AsRef<Path>) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path.as_ref())?;
        let mut rows = Vec::new();
        for record in reader.deserialize() {
            let row: SubmissionRow = record?;
            rows.push(row);
        }
        Ok(Self::from_rows(rows))
    }

    /// Build a table from rows already in memory
    pub fn from_rows(rows: Vec<SubmissionRow>) -> Self {
        let index = rows
            .iter()
            .enumerate()
            .map(|(i, row)| (row.id.clone(), i))
            .collect();
        Self { rows, index }
    }

    /// Overwrite rows matching the predictions' ids.
    ///
    /// Each covered row receives the sample's top-K classes decoded back to
    /// their original labels, formatted as "label confidence" pairs joined
    /// by single spaces. Prediction ids with no template row are ignored,
    /// mirroring a keyed table update.
    pub fn merge(&mut self, output: &InferenceOutput, encoder: &LabelEncoder) -> Result<()> {
        if output.top_labels.len() != output.ids.len()
            || output.top_confs.len() != output.ids.len()
        {
            return Err(LandmarkError::Submission(format!(
                "{} label rows and {} confidence rows for {} ids",
                output.top_labels.len(),
                output.top_confs.len(),
                output.ids.len()
            )));
        }

        let mut merged = 0usize;
        for ((id, labels), confs) in output
            .ids
            .iter()
            .zip(&output.top_labels)
            .zip(&output.top_confs)
        {
            let Some(&row) = self.index.get(id) else {
                continue;
            };

            let pairs: Vec<String> = labels
                .iter()
                .zip(confs)
                .map(|(&class, &conf)| Ok(format!("{} {}", encoder.inverse(class)?, conf)))
                .collect::<Result<_>>()?;
            self.rows[row].landmarks = pairs.join(" ");
            merged += 1;
        }

        info!(merged, total = self.rows.len(), "merged predictions into submission table");
        Ok(())
    }

    /// Write the assembled table as CSV
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = csv::Writer::from_path(path.as_ref())?;
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Rows in template order
    pub fn rows(&self) -> &[SubmissionRow] {
        &self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoder() -> LabelEncoder {
        LabelEncoder::fit(["1000", "2000", "3000"].into_iter())
    }

    fn template() -> SubmissionTable {
        SubmissionTable::from_rows(vec![
            SubmissionRow {
                id: "aaa".to_string(),
                landmarks: "".to_string(),
            },
            SubmissionRow {
                id: "bbb".to_string(),
                landmarks: "placeholder".to_string(),
            },
            SubmissionRow {
                id: "ccc".to_string(),
                landmarks: "untouched".to_string(),
            },
        ])
    }

    fn output() -> InferenceOutput {
        InferenceOutput {
            top_labels: vec![vec![2, 0], vec![1, 2]],
            top_confs: vec![vec![0.75, 0.25], vec![0.5, 0.5]],
            targets: None,
            ids: vec!["aaa".to_string(), "bbb".to_string()],
        }
    }

    #[test]
    fn test_merge_overwrites_matching_rows() {
        let mut table = template();
        table.merge(&output(), &encoder()).unwrap();

        assert_eq!(table.rows()[0].landmarks, "3000 0.75 1000 0.25");
        assert_eq!(table.rows()[1].landmarks, "2000 0.5 3000 0.5");
    }

    #[test]
    fn test_uncovered_rows_pass_through() {
        let mut table = template();
        table.merge(&output(), &encoder()).unwrap();
        assert_eq!(table.rows()[2].landmarks, "untouched");
        assert_eq!(table.rows()[2].id, "ccc");
    }

    #[test]
    fn test_prediction_without_template_row_is_ignored() {
        let mut table = template();
        let mut out = output();
        out.ids[1] = "zzz".to_string();
        table.merge(&out, &encoder()).unwrap();

        assert_eq!(table.rows()[0].landmarks, "3000 0.75 1000 0.25");
        assert_eq!(table.rows()[1].landmarks, "placeholder");
    }

    #[test]
    fn test_merge_rejects_row_count_mismatch() {
        let mut table = template();

        let mut out = output();
        out.top_labels.pop();
        assert!(table.merge(&out, &encoder()).is_err());

        let mut out = output();
        out.top_confs.pop();
        assert!(table.merge(&out, &encoder()).is_err());
    }

    #[test]
    fn test_unknown_class_index_fails() {
        let mut table = template();
        let mut out = output();
        out.top_labels[0] = vec![9, 0];
        assert!(table.merge(&out, &encoder()).is_err());
    }

    #[test]
    fn test_csv_round_trip_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("submission.csv");

        let mut table = template();
        table.merge(&output(), &encoder()).unwrap();
        table.write(&path).unwrap();

        let reread = SubmissionTable::from_template(&path).unwrap();
        let ids: Vec<&str> = reread.rows().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["aaa", "bbb", "ccc"]);
        assert_eq!(reread.rows()[0].landmarks, "3000 0.75 1000 0.25");
    }
}
