//! Landmark dataset: resolves a sample index to an augmented image tensor
//! and optional label.
//!
//! The sample subset is fixed at construction and immutable afterwards. Each
//! `get` decodes the image from the sharded store, applies the split's
//! augmentation policy, and produces CHW tensor data. Train-split
//! augmentation is redrawn on every access, so repeated reads of the same
//! index yield different tensors while val/test reads are deterministic.

use std::sync::Arc;

use image::{DynamicImage, ImageReader};

use super::augmentation::Augmenter;
use super::locator::Locator;
use super::{Sample, Split};
use crate::utils::error::{LandmarkError, Result};

/// A single sample ready for batching
#[derive(Clone, Debug)]
pub struct LandmarkItem {
    /// Image data as flattened CHW float array [3 * crop * crop]
    pub image: Vec<f32>,
    /// Encoded class label; `None` for the test split
    pub label: Option<usize>,
    /// Sample id (for submission assembly and debugging)
    pub id: String,
}

/// Dataset over one split of the landmark metadata, with lazy decoding
pub struct LandmarkDataset {
    samples: Vec<Sample>,
    split: Split,
    locator: Arc<dyn Locator>,
    augmenter: Augmenter,
}

impl LandmarkDataset {
    /// Create a dataset over a fixed sample subset.
    ///
    /// File existence for every sample is a precondition established by the
    /// upstream existence filter; the dataset does not defend against
    /// missing files beyond surfacing the decode error.
    pub fn new(samples: Vec<Sample>, split: Split, locator: Arc<dyn Locator>) -> Self {
        Self {
            samples,
            split,
            locator,
            augmenter: Augmenter::with_defaults(crate::CROP_SIZE),
        }
    }

    /// Override the default augmenter (crop extent, jitter limits)
    pub fn with_augmenter(mut self, augmenter: Augmenter) -> Self {
        self.augmenter = augmenter;
        self
    }

    /// Resolve a sample index to an augmented image tensor and optional
    /// label.
    ///
    /// Fails with `UnsupportedColorMode` when the decoded image is not RGB
    /// and with `ImageLoad` when the file cannot be read or decoded.
    pub fn get(&self, index: usize) -> Result<LandmarkItem> {
        let sample = self
            .samples
            .get(index)
            .ok_or_else(|| LandmarkError::InvalidInput(format!("index {index} out of range")))?;

        let path = self.locator.locate(&sample.id, self.split);
        let decoded = ImageReader::open(&path)
            .map_err(|e| LandmarkError::ImageLoad(path.clone(), e.to_string()))?
            .decode()
            .map_err(|e| LandmarkError::ImageLoad(path.clone(), e.to_string()))?;

        let rgb = match decoded {
            DynamicImage::ImageRgb8(_) => decoded,
            other => {
                return Err(LandmarkError::UnsupportedColorMode {
                    id: sample.id.clone(),
                    mode: format!("{:?}", other.color()),
                })
            }
        };

        let image = if self.split.augmented() {
            let mut rng = rand::thread_rng();
            self.augmenter.preprocess(rgb, Some(&mut rng))
        } else {
            self.augmenter.preprocess::<rand::rngs::ThreadRng>(rgb, None)
        };

        Ok(LandmarkItem {
            image,
            label: sample.label,
            id: sample.id.clone(),
        })
    }

    /// Number of samples in the assigned metadata subset
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the dataset is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The split this dataset serves
    pub fn split(&self) -> Split {
        self.split
    }

    /// Side length of the tensors this dataset produces
    pub fn crop_size(&self) -> u32 {
        self.augmenter.crop_size()
    }

    /// The sample at `index`, without decoding its image
    pub fn sample(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }

    /// Ids of all samples, in dataset order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.samples.iter().map(|s| s.id.as_str())
    }
}
