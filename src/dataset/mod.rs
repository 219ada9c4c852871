//! Dataset module for landmark image handling
//!
//! This module provides functionality for:
//! - Resolving sample ids to sharded file locations
//! - Loading CSV metadata with class-frequency and existence filtering
//! - On-the-fly data augmentation for training robustness
//! - Grouping samples into fixed-size batches with parallel decoding
//!
//! ## Split semantics
//!
//! Behavior is keyed on the [`Split`] a dataset was constructed with:
//! only the train split augments, and only train/val carry labels. The
//! split is fixed at construction and never changes afterwards.

pub mod augmentation;
pub mod dataset;
pub mod loader;
pub mod locator;
pub mod metadata;

// Re-export main types for convenience
pub use augmentation::Augmenter;
pub use dataset::{LandmarkDataset, LandmarkItem};
pub use loader::{BatchLoader, LandmarkBatch, LandmarkBatcher};
pub use locator::{Locator, ShardedLocator};
pub use metadata::{LabelEncoder, TrainRecord};

/// Which portion of the data a dataset serves, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    /// Whether samples are augmented on access
    pub fn augmented(&self) -> bool {
        matches!(self, Split::Train)
    }

    /// Whether samples carry a class label
    pub fn labeled(&self) -> bool {
        !matches!(self, Split::Test)
    }

    /// Whether a trailing partial batch is dropped by the loader
    pub fn drop_last(&self) -> bool {
        matches!(self, Split::Train)
    }
}

impl std::fmt::Display for Split {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Split::Train => write!(f, "train"),
            Split::Val => write!(f, "val"),
            Split::Test => write!(f, "test"),
        }
    }
}

/// A single sample: an image id plus its encoded label, when the split
/// carries one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    /// Image identifier (hex string in the source metadata)
    pub id: String,
    /// Encoded class index; `None` iff the sample belongs to the test split
    pub label: Option<usize>,
}

impl Sample {
    /// Create a labeled sample
    pub fn labeled(id: impl Into<String>, label: usize) -> Self {
        Self {
            id: id.into(),
            label: Some(label),
        }
    }

    /// Create an unlabeled (test) sample
    pub fn unlabeled(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_capabilities() {
        assert!(Split::Train.augmented());
        assert!(!Split::Val.augmented());
        assert!(!Split::Test.augmented());

        assert!(Split::Train.labeled());
        assert!(Split::Val.labeled());
        assert!(!Split::Test.labeled());

        assert!(Split::Train.drop_last());
        assert!(!Split::Val.drop_last());
        assert!(!Split::Test.drop_last());
    }

    #[test]
    fn test_split_display() {
        assert_eq!(Split::Train.to_string(), "train");
        assert_eq!(Split::Test.to_string(), "test");
    }
}
