//! Training module: step-capped epoch loop with scheduled LR decay
//!
//! The loop itself computes no convergence criterion; callers bound it with
//! an epoch budget or an arbitrary stop predicate passed to
//! [`Trainer::fit`].

pub mod meter;
pub mod observer;
pub mod trainer;

pub use meter::AverageMeter;
pub use observer::{EpochLog, NullObserver, StepLog, TracingObserver, TrainObserver};
pub use trainer::{epoch_budget, TrainState, Trainer};

/// Hyperparameters of the training loop
#[derive(Debug, Clone)]
pub struct TrainConfig {
    /// Initial learning rate
    pub learning_rate: f64,
    /// The learning rate decays once every this many epochs
    pub lr_step: usize,
    /// Multiplicative decay factor (< 1)
    pub lr_factor: f64,
    /// Upper bound on batches processed per epoch
    pub step_cap: usize,
    /// Emit a step log every this many batches
    pub log_freq: usize,
    /// Optimizer weight decay
    pub weight_decay: f32,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            learning_rate: crate::LEARNING_RATE,
            lr_step: crate::LR_STEP,
            lr_factor: crate::LR_FACTOR,
            step_cap: crate::MAX_STEPS_PER_EPOCH,
            log_freq: crate::LOG_FREQ,
            weight_decay: 1e-4,
        }
    }
}

impl TrainConfig {
    /// Learning rate in effect for a 1-based epoch number: the initial rate
    /// multiplied by `lr_factor` once per completed `lr_step` epochs.
    /// Monotone non-increasing, independent of loss trend.
    pub fn lr_for_epoch(&self, epoch: usize) -> f64 {
        let completed = epoch.saturating_sub(1);
        let num_decays = (completed / self.lr_step) as i32;
        self.learning_rate * self.lr_factor.powi(num_decays)
    }
}
