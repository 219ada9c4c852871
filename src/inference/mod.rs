//! Ranked top-K inference over a batching loader
//!
//! Runs the classifier in non-training mode over every batch of a split,
//! normalizes the class scores with softmax and keeps the K most probable
//! classes per sample in descending order. Batch results are concatenated
//! in loader order, so row i of the output corresponds to sample i of the
//! dataset.

use burn::{
    data::dataloader::batcher::Batcher,
    module::AutodiffModule,
    tensor::backend::{AutodiffBackend, Backend},
};
use indicatif::{ProgressBar, ProgressStyle};

use crate::dataset::loader::{BatchLoader, LandmarkBatcher};
use crate::model::LandmarkClassifier;
use crate::utils::error::{LandmarkError, Result};
use crate::utils::metrics::gap;

/// Inference settings
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Number of ranked classes kept per sample
    pub top_k: usize,
    /// Render an indicatif progress bar while iterating batches
    pub show_progress: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            top_k: crate::NUM_TOP_PREDICTS,
            show_progress: true,
        }
    }
}

/// Per-sample ranked predictions for one split, in dataset order
#[derive(Debug, Clone)]
pub struct InferenceOutput {
    /// Top-K class indices per sample, most probable first
    pub top_labels: Vec<Vec<usize>>,
    /// Softmax probabilities aligned with `top_labels`
    pub top_confs: Vec<Vec<f32>>,
    /// Targets aligned with the rows, when the split carries labels
    pub targets: Option<Vec<usize>>,
    /// Sample ids aligned with the rows
    pub ids: Vec<String>,
}

impl InferenceOutput {
    /// Number of samples covered
    pub fn len(&self) -> usize {
        self.top_labels.len()
    }

    /// Whether the output is empty
    pub fn is_empty(&self) -> bool {
        self.top_labels.is_empty()
    }

    /// GAP@1 over the top-1 predictions, when targets are present
    pub fn gap_at_1(&self) -> Result<Option<f64>> {
        let Some(targets) = &self.targets else {
            return Ok(None);
        };

        let mut predicts = Vec::with_capacity(self.top_labels.len());
        let mut confs = Vec::with_capacity(self.top_confs.len());
        for (labels, row_confs) in self.top_labels.iter().zip(&self.top_confs) {
            let (&label, &conf) = labels.first().zip(row_confs.first()).ok_or_else(|| {
                LandmarkError::ShapeMismatch("empty prediction row".to_string())
            })?;
            predicts.push(label);
            confs.push(conf);
        }
        gap(&predicts, &confs, targets).map(Some)
    }
}

/// Run ranked inference with an autodiff model, switching it to its
/// validation form first (gradient tracking off, dropout disabled).
pub fn predict_valid<B: AutodiffBackend>(
    model: &LandmarkClassifier<B>,
    loader: &BatchLoader,
    device: &<B::InnerBackend as Backend>::Device,
    config: &InferenceConfig,
) -> Result<InferenceOutput> {
    predict(&model.valid(), loader, device, config)
}

/// Run ranked inference over every batch of the loader.
///
/// Output rows follow loader order, which is dataset index order; targets,
/// when present on the batches, are concatenated identically.
pub fn predict<B: Backend>(
    model: &LandmarkClassifier<B>,
    loader: &BatchLoader,
    device: &B::Device,
    config: &InferenceConfig,
) -> Result<InferenceOutput> {
    let crop = loader.dataset().crop_size() as usize;
    let batcher = LandmarkBatcher::<B>::with_crop_size(device.clone(), crop);

    let num_classes = model.num_classes();
    let k = config.top_k.min(num_classes);
    let labeled = loader.dataset().split().labeled();

    let progress = if config.show_progress {
        let bar = ProgressBar::new(loader.len() as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("  {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} batches")
                .unwrap()
                .progress_chars("#>-"),
        );
        Some(bar)
    } else {
        None
    };

    let mut top_labels = Vec::with_capacity(loader.dataset().len());
    let mut top_confs = Vec::with_capacity(loader.dataset().len());
    let mut targets: Vec<usize> = Vec::new();
    let mut ids = Vec::with_capacity(loader.dataset().len());

    for items in loader.iter() {
        let items = items?;
        let batch_size = items.len();
        let batch = batcher.batch(items);

        if let Some(batch_targets) = batch.targets {
            let t: Vec<i64> = batch_targets
                .into_data()
                .to_vec()
                .map_err(|e| LandmarkError::ShapeMismatch(format!("{e:?}")))?;
            targets.extend(t.into_iter().map(|v| v as usize));
        }
        ids.extend(batch.ids);

        // Reading the probabilities back synchronizes with the device.
        let probs: Vec<f32> = model
            .forward_softmax(batch.images)
            .into_data()
            .to_vec()
            .map_err(|e| LandmarkError::ShapeMismatch(format!("{e:?}")))?;

        for row in 0..batch_size {
            let scores = &probs[row * num_classes..(row + 1) * num_classes];
            let mut order: Vec<usize> = (0..num_classes).collect();
            order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then_with(|| a.cmp(&b)));
            order.truncate(k);

            top_confs.push(order.iter().map(|&c| scores[c]).collect());
            top_labels.push(order);
        }

        if let Some(bar) = &progress {
            bar.inc(1);
        }
    }

    if let Some(bar) = &progress {
        bar.finish_and_clear();
    }

    Ok(InferenceOutput {
        top_labels,
        top_confs,
        targets: labeled.then_some(targets),
        ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::augmentation::Augmenter;
    use crate::dataset::locator::Locator;
    use crate::dataset::{LandmarkDataset, Sample, Split};
    use crate::model::LandmarkClassifierConfig;
    use image::{ImageBuffer, Rgb};
    use std::path::PathBuf;
    use std::sync::Arc;

    type TestBackend = burn::backend::NdArray;

    struct FlatLocator(PathBuf);

    impl Locator for FlatLocator {
        fn locate(&self, id: &str, _split: Split) -> PathBuf {
            self.0.join(format!("{id}.png"))
        }
    }

    fn fixture_dataset(n: usize, split: Split, dir: &std::path::Path) -> LandmarkDataset {
        let mut samples = Vec::new();
        for i in 0..n {
            let id = format!("img{i}");
            let img = ImageBuffer::from_fn(24, 24, |x, y| {
                Rgb([((x * 9 + i as u32 * 31) % 256) as u8, (y % 256) as u8, 80u8])
            });
            img.save(dir.join(format!("{id}.png"))).unwrap();
            samples.push(if split.labeled() {
                Sample::labeled(id, i % 3)
            } else {
                Sample::unlabeled(id)
            });
        }

        LandmarkDataset::new(samples, split, Arc::new(FlatLocator(dir.to_path_buf())))
            .with_augmenter(Augmenter::with_defaults(16))
    }

    fn small_model(num_classes: usize) -> LandmarkClassifier<TestBackend> {
        let config = LandmarkClassifierConfig::new(num_classes).with_base_filters(4);
        LandmarkClassifier::new(&config, &Default::default())
    }

    fn quiet() -> InferenceConfig {
        InferenceConfig {
            top_k: 3,
            show_progress: false,
        }
    }

    #[test]
    fn test_predict_covers_all_samples_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = fixture_dataset(5, Split::Test, dir.path());
        let loader = BatchLoader::new(&dataset, 2);

        let model = small_model(7);
        let output = predict(&model, &loader, &Default::default(), &quiet()).unwrap();

        // Test split keeps the partial final batch
        assert_eq!(output.len(), 5);
        assert_eq!(output.ids, vec!["img0", "img1", "img2", "img3", "img4"]);
        assert!(output.targets.is_none());
    }

    #[test]
    fn test_rows_are_ranked_descending() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = fixture_dataset(3, Split::Test, dir.path());
        let loader = BatchLoader::new(&dataset, 2);

        let model = small_model(7);
        let output = predict(&model, &loader, &Default::default(), &quiet()).unwrap();

        for (labels, confs) in output.top_labels.iter().zip(&output.top_confs) {
            assert_eq!(labels.len(), 3);
            assert_eq!(confs.len(), 3);
            for pair in confs.windows(2) {
                assert!(pair[0] >= pair[1]);
            }
            // Probabilities after softmax
            for &c in confs {
                assert!((0.0..=1.0).contains(&c));
            }
        }
    }

    #[test]
    fn test_top_k_clamped_to_class_count() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = fixture_dataset(2, Split::Test, dir.path());
        let loader = BatchLoader::new(&dataset, 2);

        let model = small_model(2);
        let config = InferenceConfig {
            top_k: 10,
            show_progress: false,
        };
        let output = predict(&model, &loader, &Default::default(), &config).unwrap();
        assert_eq!(output.top_labels[0].len(), 2);
    }

    #[test]
    fn test_labeled_split_yields_aligned_targets() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = fixture_dataset(4, Split::Val, dir.path());
        let loader = BatchLoader::new(&dataset, 3);

        let model = small_model(5);
        let output = predict(&model, &loader, &Default::default(), &quiet()).unwrap();

        let targets = output.targets.as_ref().unwrap();
        assert_eq!(targets.len(), output.len());
        assert_eq!(targets, &vec![0, 1, 2, 0]);

        let score = output.gap_at_1().unwrap().unwrap();
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn test_gap_at_1_rejects_empty_prediction_rows() {
        let output = InferenceOutput {
            top_labels: vec![vec![]],
            top_confs: vec![vec![]],
            targets: Some(vec![0]),
            ids: vec!["a".to_string()],
        };
        assert!(matches!(
            output.gap_at_1().unwrap_err(),
            LandmarkError::ShapeMismatch(_)
        ));
    }

    #[test]
    fn test_gap_at_1_absent_without_targets() {
        let output = InferenceOutput {
            top_labels: vec![vec![0]],
            top_confs: vec![vec![1.0]],
            targets: None,
            ids: vec!["a".to_string()],
        };
        assert!(output.gap_at_1().unwrap().is_none());
    }
}
