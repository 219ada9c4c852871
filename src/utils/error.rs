//! Error Handling Module
//!
//! Defines custom error types for the landmark recognition library.
//! Uses thiserror for ergonomic error definitions.
//!
//! All variants are unrecoverable at the point of occurrence: a failed batch
//! aborts the iteration, a metric contract violation aborts the run. There is
//! no skip-bad-sample tolerance anywhere in the pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for landmark recognition operations
#[derive(Error, Debug)]
pub enum LandmarkError {
    /// Decoded image is not RGB; augmentation and tensor conversion assume
    /// three channels
    #[error("Unsupported color mode for sample '{id}': expected RGB, got {mode}")]
    UnsupportedColorMode { id: String, mode: String },

    /// Error decoding or reading an image file
    #[error("Failed to load image at '{0}': {1}")]
    ImageLoad(PathBuf, String),

    /// A worker failed while constructing a batch (decode or augment)
    #[error("Batch construction failed: {0}")]
    BatchConstruction(String),

    /// Metric inputs of unequal length or wrong dimensionality
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Error with dataset metadata
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// Error with submission assembly
    #[error("Submission error: {0}")]
    Submission(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenience Result type for landmark recognition operations
pub type Result<T> = std::result::Result<T, LandmarkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LandmarkError::UnsupportedColorMode {
            id: "abc123".to_string(),
            mode: "L8".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("abc123"));
        assert!(msg.contains("RGB"));
    }

    #[test]
    fn test_image_load_error() {
        let path = PathBuf::from("/path/to/image.jpg");
        let err = LandmarkError::ImageLoad(path, "file not found".to_string());
        assert!(format!("{}", err).contains("image.jpg"));
    }

    #[test]
    fn test_shape_mismatch_display() {
        let err = LandmarkError::ShapeMismatch("3 predicts vs 2 targets".to_string());
        assert!(format!("{}", err).contains("3 predicts"));
    }
}
