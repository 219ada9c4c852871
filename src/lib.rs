//! # Landmark Recognition
//!
//! A Rust library for large-scale landmark image classification using the
//! Burn framework. Trains a CNN over a long-tailed label space and produces
//! a ranked multi-label submission for unlabeled test images.
//!
//! ## Modules
//!
//! - `dataset`: Sharded image resolution, augmentation, and parallel batching
//! - `model`: CNN classifier built with Burn
//! - `training`: Step-capped training loop with scheduled learning-rate decay
//! - `inference`: Ranked top-K prediction over a loader
//! - `submission`: Merging ranked predictions into a submission template
//! - `utils`: Logging, error types, and the GAP@1 ranking metric
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use landmark_recognition::dataset::{LandmarkDataset, BatchLoader, Split};
//! use landmark_recognition::training::Trainer;
//!
//! let dataset = LandmarkDataset::new(samples, Split::Train, locator);
//! let loader = BatchLoader::new(&dataset, 128);
//! // ... training and inference
//! ```

pub mod backend;
pub mod dataset;
pub mod inference;
pub mod model;
pub mod submission;
pub mod training;
pub mod utils;

// Re-export commonly used items for convenience
pub use dataset::augmentation::Augmenter;
pub use dataset::loader::{BatchLoader, LandmarkBatch, LandmarkBatcher};
pub use dataset::locator::{Locator, ShardedLocator};
pub use dataset::metadata::LabelEncoder;
pub use dataset::{LandmarkDataset, LandmarkItem, Sample, Split};
pub use inference::{predict, predict_valid, InferenceConfig, InferenceOutput};
pub use model::LandmarkClassifier;
pub use submission::SubmissionTable;
pub use training::{AverageMeter, TrainConfig, Trainer};
pub use utils::error::{LandmarkError, Result};
pub use utils::metrics::gap;

/// Only classes with at least this many training samples are kept
pub const MIN_SAMPLES_PER_CLASS: usize = 50;

/// Default training batch size
pub const BATCH_SIZE: usize = 128;

/// Initial learning rate for the Adam optimizer
pub const LEARNING_RATE: f64 = 1e-3;

/// Learning rate decays once every this many epochs
pub const LR_STEP: usize = 3;

/// Multiplicative learning-rate decay factor
pub const LR_FACTOR: f64 = 0.5;

/// Upper bound on batches processed per epoch, independent of dataset size
pub const MAX_STEPS_PER_EPOCH: usize = 18_000;

/// Emit a training log line every this many batches
pub const LOG_FREQ: usize = 500;

/// Number of ranked predictions kept per test sample
pub const NUM_TOP_PREDICTS: usize = 10;

/// Square extent of the deterministic center crop
pub const CROP_SIZE: u32 = 200;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
