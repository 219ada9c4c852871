//! Training loop for the landmark classifier
//!
//! Drives forward/backward/update per batch over an externally bounded
//! sequence of epochs. Each epoch processes at most `step_cap` batches so
//! wall-clock epoch duration stays bounded on very large datasets, and the
//! learning rate follows a fixed step-decay schedule across epoch
//! boundaries.

use std::time::Instant;

use burn::{
    data::dataloader::batcher::Batcher,
    nn::loss::CrossEntropyLossConfig,
    optim::{AdamConfig, GradientsParams, Optimizer},
    tensor::{backend::AutodiffBackend, ElementConversion},
};

use super::meter::AverageMeter;
use super::observer::{EpochLog, StepLog, TrainObserver};
use super::TrainConfig;
use crate::dataset::loader::{BatchLoader, LandmarkBatcher};
use crate::model::LandmarkClassifier;
use crate::utils::error::{LandmarkError, Result};
use crate::utils::metrics::gap;

/// Mutable loop state exposed to the stop predicate
#[derive(Debug, Clone, Default)]
pub struct TrainState {
    /// Number of completed epochs (1-based after the first epoch)
    pub epoch: usize,
    /// Average loss of the most recent epoch
    pub last_avg_loss: f64,
    /// Average online train-GAP of the most recent epoch
    pub last_avg_gap: f64,
}

/// Build a stop predicate that ends training after a fixed epoch budget
pub fn epoch_budget(epochs: usize) -> impl FnMut(&TrainState) -> bool {
    move |state: &TrainState| state.epoch >= epochs
}

/// Trainer for the landmark classifier using Burn
pub struct Trainer<B: AutodiffBackend> {
    /// Model being trained
    pub model: LandmarkClassifier<B>,
    /// Adam optimizer
    optimizer: burn::optim::adaptor::OptimizerAdaptor<
        burn::optim::Adam<B::InnerBackend>,
        LandmarkClassifier<B>,
        B,
    >,
    /// Training configuration
    pub config: TrainConfig,
    /// Current loop state
    pub state: TrainState,
    device: B::Device,
}

impl<B: AutodiffBackend> Trainer<B> {
    /// Create a new trainer with the given model and configuration
    pub fn new(model: LandmarkClassifier<B>, config: TrainConfig, device: B::Device) -> Self {
        let optimizer = AdamConfig::new()
            .with_weight_decay(Some(burn::optim::decay::WeightDecayConfig::new(
                config.weight_decay.into(),
            )))
            .init();

        Self {
            model,
            optimizer,
            config,
            state: TrainState::default(),
            device,
        }
    }

    /// Run one epoch over the loader, processing at most `step_cap` batches.
    ///
    /// Per batch: forward pass, cross-entropy loss, online train-GAP from
    /// the top-1 prediction, then backward and one optimizer step at the
    /// scheduled learning rate. The observer receives a snapshot every
    /// `log_freq` batches and a summary at the end.
    pub fn train_epoch(
        &mut self,
        loader: &BatchLoader,
        observer: &mut dyn TrainObserver,
    ) -> Result<EpochLog> {
        let epoch = self.state.epoch;
        let lr = self.config.lr_for_epoch(epoch);
        let num_steps = loader.len().min(self.config.step_cap);

        let crop = loader.dataset().crop_size() as usize;
        let batcher = LandmarkBatcher::<B>::with_crop_size(self.device.clone(), crop);

        let mut batch_time = AverageMeter::new();
        let mut losses = AverageMeter::new();
        let mut avg_score = AverageMeter::new();

        let mut end = Instant::now();

        for (i, items) in loader.iter().take(num_steps).enumerate() {
            let items = items?;
            let batch_size = items.len();
            let batch = batcher.batch(items);

            let targets = batch.targets.clone().ok_or_else(|| {
                LandmarkError::InvalidInput("training batches must carry targets".to_string())
            })?;

            let output = self.model.forward(batch.images.clone());
            let loss = CrossEntropyLossConfig::new()
                .init(&output.device())
                .forward(output.clone(), targets.clone());
            let loss_value: f64 = loss.clone().into_scalar().elem();

            // Top-1 prediction and its score feed the online GAP estimate.
            // Reading the scalars synchronizes with the device.
            let detached = output.detach();
            let confs_data = detached.clone().max_dim(1).into_data();
            let preds_data = detached.argmax(1).into_data();
            let targets_data = targets.into_data();

            let confs: Vec<f32> = confs_data
                .to_vec()
                .map_err(|e| LandmarkError::InvalidInput(format!("{e:?}")))?;
            let preds: Vec<usize> = preds_data
                .to_vec::<i64>()
                .map_err(|e| LandmarkError::InvalidInput(format!("{e:?}")))?
                .into_iter()
                .map(|p| p as usize)
                .collect();
            let target_indices: Vec<usize> = targets_data
                .to_vec::<i64>()
                .map_err(|e| LandmarkError::InvalidInput(format!("{e:?}")))?
                .into_iter()
                .map(|t| t as usize)
                .collect();

            avg_score.update(gap(&preds, &confs, &target_indices)?, 1);
            losses.update(loss_value, batch_size);

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &self.model);
            self.model = self.optimizer.step(lr, self.model.clone(), grads);

            batch_time.update(end.elapsed().as_secs_f64(), 1);
            end = Instant::now();

            if i % self.config.log_freq == 0 {
                observer.on_step(&StepLog {
                    epoch,
                    step: i,
                    total_steps: num_steps,
                    loss: losses.val,
                    loss_avg: losses.average(),
                    gap: avg_score.val,
                    gap_avg: avg_score.average(),
                    batch_time: batch_time.val,
                    batch_time_avg: batch_time.average(),
                    lr,
                });
            }
        }

        let log = EpochLog {
            epoch,
            steps: num_steps,
            avg_loss: losses.average(),
            avg_gap: avg_score.average(),
            lr,
        };
        observer.on_epoch(&log);

        Ok(log)
    }

    /// Run epochs until the injected stop predicate returns true.
    ///
    /// The loop defines no convergence criterion of its own; an unbounded
    /// run is expressed by a predicate that never fires.
    pub fn fit<S>(
        &mut self,
        loader: &BatchLoader,
        observer: &mut dyn TrainObserver,
        mut stop: S,
    ) -> Result<()>
    where
        S: FnMut(&TrainState) -> bool,
    {
        loop {
            self.state.epoch += 1;
            let log = self.train_epoch(loader, observer)?;

            self.state.last_avg_loss = log.avg_loss;
            self.state.last_avg_gap = log.avg_gap;

            if stop(&self.state) {
                return Ok(());
            }
        }
    }

    /// Get reference to the model
    pub fn model(&self) -> &LandmarkClassifier<B> {
        &self.model
    }

    /// Get the device
    pub fn device(&self) -> &B::Device {
        &self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::augmentation::Augmenter;
    use crate::dataset::locator::Locator;
    use crate::dataset::{LandmarkDataset, Sample, Split};
    use crate::model::LandmarkClassifierConfig;
    use crate::training::observer::RecordingObserver;
    use burn::backend::Autodiff;
    use image::{ImageBuffer, Rgb};
    use std::path::PathBuf;
    use std::sync::Arc;

    type TestBackend = Autodiff<burn::backend::NdArray>;

    struct FlatLocator(PathBuf);

    impl Locator for FlatLocator {
        fn locate(&self, id: &str, _split: Split) -> PathBuf {
            self.0.join(format!("{id}.png"))
        }
    }

    fn fixture_dataset(n: usize, dir: &std::path::Path) -> LandmarkDataset {
        let mut samples = Vec::new();
        for i in 0..n {
            let id = format!("img{i}");
            let img = ImageBuffer::from_fn(32, 32, |x, y| {
                Rgb([((x + i as u32 * 40) % 256) as u8, (y % 256) as u8, 50u8])
            });
            img.save(dir.join(format!("{id}.png"))).unwrap();
            samples.push(Sample::labeled(id, i % 2));
        }

        LandmarkDataset::new(
            samples,
            Split::Train,
            Arc::new(FlatLocator(dir.to_path_buf())),
        )
        .with_augmenter(Augmenter::with_defaults(16))
    }

    fn small_trainer(config: TrainConfig) -> Trainer<TestBackend> {
        let device = Default::default();
        let model_config = LandmarkClassifierConfig::new(2).with_base_filters(4);
        let model = LandmarkClassifier::<TestBackend>::new(&model_config, &device);
        Trainer::new(model, config, device)
    }

    #[test]
    fn test_epoch_processes_full_batches() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = fixture_dataset(5, dir.path());
        let loader = BatchLoader::new(&dataset, 2);

        let mut trainer = small_trainer(TrainConfig {
            log_freq: 1,
            ..Default::default()
        });
        trainer.state.epoch = 1;

        let mut observer = RecordingObserver::default();
        let log = trainer.train_epoch(&loader, &mut observer).unwrap();

        // 5 samples, batch 2, drop-last: 2 steps
        assert_eq!(log.steps, 2);
        assert_eq!(observer.steps.len(), 2);
        assert!(log.avg_loss.is_finite());
        assert!((0.0..=1.0).contains(&log.avg_gap));
    }

    #[test]
    fn test_step_cap_bounds_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = fixture_dataset(6, dir.path());
        let loader = BatchLoader::new(&dataset, 2);

        let mut trainer = small_trainer(TrainConfig {
            step_cap: 1,
            log_freq: 1,
            ..Default::default()
        });
        trainer.state.epoch = 1;

        let mut observer = RecordingObserver::default();
        let log = trainer.train_epoch(&loader, &mut observer).unwrap();
        assert_eq!(log.steps, 1);
    }

    #[test]
    fn test_fit_respects_epoch_budget() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = fixture_dataset(4, dir.path());
        let loader = BatchLoader::new(&dataset, 2);

        let mut trainer = small_trainer(TrainConfig {
            log_freq: 10,
            ..Default::default()
        });

        let mut observer = RecordingObserver::default();
        trainer
            .fit(&loader, &mut observer, super::epoch_budget(2))
            .unwrap();

        assert_eq!(trainer.state.epoch, 2);
        assert_eq!(observer.epochs.len(), 2);
        assert_eq!(observer.epochs[0].epoch, 1);
        assert_eq!(observer.epochs[1].epoch, 2);
    }

    #[test]
    fn test_fit_with_custom_stop_predicate() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = fixture_dataset(4, dir.path());
        let loader = BatchLoader::new(&dataset, 2);

        let mut trainer = small_trainer(TrainConfig {
            log_freq: 10,
            ..Default::default()
        });

        let mut observer = RecordingObserver::default();
        let mut calls = 0;
        trainer
            .fit(&loader, &mut observer, |_state: &TrainState| {
                calls += 1;
                calls >= 3
            })
            .unwrap();

        assert_eq!(trainer.state.epoch, 3);
    }
}
