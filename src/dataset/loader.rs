//! Batching Loader
//!
//! Groups dataset samples into fixed-size batches in index order, fanning
//! sample construction (decode + augment) out over a rayon worker pool.
//!
//! Iteration is lazy and deterministic: batches are delivered in index order
//! regardless of worker parallelism, and re-iterating a val/test loader
//! yields an identical batch sequence. Train batches are deterministic in
//! composition but differ run-to-run in pixel content because each access
//! redraws its augmentation. Any worker failure aborts the iteration; there
//! is no skip-and-continue.

use burn::data::dataloader::batcher::Batcher;
use burn::prelude::*;
use rayon::prelude::*;

use super::dataset::{LandmarkDataset, LandmarkItem};
use crate::utils::error::{LandmarkError, Result};

/// A batch of landmark images ready for the model
#[derive(Clone, Debug)]
pub struct LandmarkBatch<B: Backend> {
    /// Batch of images with shape [batch_size, 3, crop, crop]
    pub images: Tensor<B, 4>,
    /// Batch of labels with shape [batch_size]; `None` for the test split
    pub targets: Option<Tensor<B, 1, Int>>,
    /// Sample ids in batch order
    pub ids: Vec<String>,
}

impl<B: Backend> LandmarkBatch<B> {
    /// Number of samples in the batch
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the batch is empty
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Batcher assembling [`LandmarkItem`]s into tensors on a device
#[derive(Clone, Debug)]
pub struct LandmarkBatcher<B: Backend> {
    device: B::Device,
    crop_size: usize,
}

impl<B: Backend> LandmarkBatcher<B> {
    /// Create a new batcher for the given device
    pub fn new(device: B::Device) -> Self {
        Self {
            device,
            crop_size: crate::CROP_SIZE as usize,
        }
    }

    /// Create a batcher with a custom crop extent
    pub fn with_crop_size(device: B::Device, crop_size: usize) -> Self {
        Self { device, crop_size }
    }
}

impl<B: Backend> Batcher<LandmarkItem, LandmarkBatch<B>> for LandmarkBatcher<B> {
    fn batch(&self, items: Vec<LandmarkItem>) -> LandmarkBatch<B> {
        let batch_size = items.len();
        let side = self.crop_size;

        let images_data: Vec<f32> = items.iter().flat_map(|item| item.image.clone()).collect();
        let images = Tensor::<B, 4>::from_floats(
            TensorData::new(images_data, [batch_size, 3, side, side]),
            &self.device,
        );

        // Targets exist iff every item carries a label; splits never mix.
        let targets = if items.iter().all(|item| item.label.is_some()) && batch_size > 0 {
            let targets_data: Vec<i64> = items
                .iter()
                .map(|item| item.label.unwrap_or(0) as i64)
                .collect();
            Some(Tensor::<B, 1, Int>::from_data(
                TensorData::new(targets_data, [batch_size]),
                &self.device,
            ))
        } else {
            None
        };

        let ids = items.into_iter().map(|item| item.id).collect();

        LandmarkBatch {
            images,
            targets,
            ids,
        }
    }
}

/// Lazy, finite sequence of batches over a [`LandmarkDataset`]
pub struct BatchLoader<'a> {
    dataset: &'a LandmarkDataset,
    batch_size: usize,
    drop_last: bool,
}

impl<'a> BatchLoader<'a> {
    /// Create a loader with the split's default drop-last policy: the train
    /// split drops a trailing partial batch, val/test yield it.
    pub fn new(dataset: &'a LandmarkDataset, batch_size: usize) -> Self {
        assert!(batch_size > 0, "batch size must be positive");
        Self {
            dataset,
            batch_size,
            drop_last: dataset.split().drop_last(),
        }
    }

    /// Number of batches one full iteration yields
    pub fn len(&self) -> usize {
        let n = self.dataset.len();
        if self.drop_last {
            n / self.batch_size
        } else {
            n.div_ceil(self.batch_size)
        }
    }

    /// Whether a full iteration yields no batches
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The underlying dataset
    pub fn dataset(&self) -> &LandmarkDataset {
        self.dataset
    }

    /// The configured batch size
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Iterate item groups in index order.
    ///
    /// Each group's samples are constructed in parallel on the rayon pool;
    /// results come back in index order because the fan-out preserves
    /// ordering on collect. A failed sample poisons its whole batch.
    pub fn iter(&self) -> impl Iterator<Item = Result<Vec<LandmarkItem>>> + '_ {
        let num_batches = self.len();
        (0..num_batches).map(move |batch_idx| {
            let start = batch_idx * self.batch_size;
            let end = (start + self.batch_size).min(self.dataset.len());

            (start..end)
                .into_par_iter()
                .map(|i| self.dataset.get(i))
                .collect::<Result<Vec<LandmarkItem>>>()
                .map_err(|e| LandmarkError::BatchConstruction(e.to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::augmentation::Augmenter;
    use crate::dataset::locator::Locator;
    use crate::dataset::{Sample, Split};
    use image::{ImageBuffer, Rgb};
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    type TestBackend = burn::backend::NdArray;

    struct FlatLocator(PathBuf);

    impl Locator for FlatLocator {
        fn locate(&self, id: &str, _split: Split) -> PathBuf {
            self.0.join(format!("{id}.png"))
        }
    }

    fn fixture_dataset(n: usize, split: Split, dir: &Path) -> LandmarkDataset {
        let mut samples = Vec::new();
        for i in 0..n {
            let id = format!("img{i}");
            let img = ImageBuffer::from_fn(48, 48, |x, y| {
                Rgb([(x + i as u32) as u8, y as u8, 9u8])
            });
            img.save(dir.join(format!("{id}.png"))).unwrap();
            samples.push(Sample {
                id,
                label: split.labeled().then_some(i % 3),
            });
        }

        LandmarkDataset::new(samples, split, Arc::new(FlatLocator(dir.to_path_buf())))
            .with_augmenter(Augmenter::with_defaults(16))
    }

    #[test]
    fn test_train_drops_partial_batch() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = fixture_dataset(10, Split::Train, dir.path());
        let loader = BatchLoader::new(&dataset, 4);

        assert_eq!(loader.len(), 2);
        let batches: Vec<_> = loader.iter().collect::<Result<_>>().unwrap();
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.len() == 4));
    }

    #[test]
    fn test_val_keeps_partial_batch() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = fixture_dataset(10, Split::Val, dir.path());
        let loader = BatchLoader::new(&dataset, 4);

        assert_eq!(loader.len(), 3);
        let batches: Vec<_> = loader.iter().collect::<Result<_>>().unwrap();
        assert_eq!(batches[0].len(), 4);
        assert_eq!(batches[2].len(), 2);
    }

    #[test]
    fn test_iteration_preserves_index_order() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = fixture_dataset(6, Split::Val, dir.path());
        let loader = BatchLoader::new(&dataset, 4);

        let ids: Vec<String> = loader
            .iter()
            .flat_map(|batch| batch.unwrap().into_iter().map(|item| item.id))
            .collect();

        let expected: Vec<String> = (0..6).map(|i| format!("img{i}")).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_reiteration_is_identical_for_val() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = fixture_dataset(5, Split::Val, dir.path());
        let loader = BatchLoader::new(&dataset, 2);

        let first: Vec<Vec<f32>> = loader
            .iter()
            .flat_map(|b| b.unwrap().into_iter().map(|item| item.image))
            .collect();
        let second: Vec<Vec<f32>> = loader
            .iter()
            .flat_map(|b| b.unwrap().into_iter().map(|item| item.image))
            .collect();

        assert_eq!(first, second);
    }

    #[test]
    fn test_worker_failure_poisons_batch() {
        let dir = tempfile::tempdir().unwrap();
        let mut dataset = fixture_dataset(3, Split::Val, dir.path());
        // Remove one backing file after construction to simulate a decode
        // failure inside a worker.
        std::fs::remove_file(dir.path().join("img1.png")).unwrap();
        dataset = dataset.with_augmenter(Augmenter::with_defaults(16));

        let loader = BatchLoader::new(&dataset, 3);
        let result: Result<Vec<_>> = loader.iter().collect();
        assert!(matches!(
            result.unwrap_err(),
            LandmarkError::BatchConstruction(_)
        ));
    }

    #[test]
    fn test_batcher_builds_tensors() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = fixture_dataset(4, Split::Val, dir.path());
        let loader = BatchLoader::new(&dataset, 4);

        let device = Default::default();
        let batcher = LandmarkBatcher::<TestBackend>::with_crop_size(device, 16);

        let items = loader.iter().next().unwrap().unwrap();
        let batch = batcher.batch(items);

        assert_eq!(batch.images.dims(), [4, 3, 16, 16]);
        let targets = batch.targets.expect("val batch carries targets");
        assert_eq!(targets.dims(), [4]);
        assert_eq!(batch.ids.len(), 4);
    }

    #[test]
    fn test_batcher_omits_targets_for_test_split() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = fixture_dataset(2, Split::Test, dir.path());
        let loader = BatchLoader::new(&dataset, 2);

        let device = Default::default();
        let batcher = LandmarkBatcher::<TestBackend>::with_crop_size(device, 16);

        let items = loader.iter().next().unwrap().unwrap();
        let batch = batcher.batch(items);
        assert!(batch.targets.is_none());
    }
}
