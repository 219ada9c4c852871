//! Training observers
//!
//! Periodic logging is an observable side effect only; it feeds nothing back
//! into training state. Keeping it behind a trait lets tests drive the loop
//! without console output.

use tracing::info;

/// Snapshot emitted every `log_freq` batches
#[derive(Debug, Clone)]
pub struct StepLog {
    /// 1-based epoch number
    pub epoch: usize,
    /// 0-based step index within the epoch
    pub step: usize,
    /// Number of steps this epoch will run
    pub total_steps: usize,
    /// Loss of the current batch and running average
    pub loss: f64,
    pub loss_avg: f64,
    /// Online train-GAP of the current batch and running average
    pub gap: f64,
    pub gap_avg: f64,
    /// Wall time of the current batch (seconds) and running average
    pub batch_time: f64,
    pub batch_time_avg: f64,
    /// Learning rate in effect
    pub lr: f64,
}

/// Summary emitted at the end of each epoch
#[derive(Debug, Clone)]
pub struct EpochLog {
    /// 1-based epoch number
    pub epoch: usize,
    /// Batches actually processed (after step capping)
    pub steps: usize,
    /// Sample-weighted average loss over the epoch
    pub avg_loss: f64,
    /// Average online train-GAP over the epoch
    pub avg_gap: f64,
    /// Learning rate that was in effect
    pub lr: f64,
}

/// Receiver of training progress events
pub trait TrainObserver {
    fn on_step(&mut self, log: &StepLog);
    fn on_epoch(&mut self, log: &EpochLog);
}

/// Default observer reporting through `tracing`
#[derive(Debug, Default)]
pub struct TracingObserver;

impl TrainObserver for TracingObserver {
    fn on_step(&mut self, log: &StepLog) {
        info!(
            "{} [{}/{}]\ttime {:.3} ({:.3})\tloss {:.4} ({:.4})\tGAP {:.4} ({:.4})\tlr {:.6}",
            log.epoch,
            log.step,
            log.total_steps,
            log.batch_time,
            log.batch_time_avg,
            log.loss,
            log.loss_avg,
            log.gap,
            log.gap_avg,
            log.lr
        );
    }

    fn on_epoch(&mut self, log: &EpochLog) {
        info!(
            "epoch {} done: {} steps, loss {:.4}, average GAP on train {:.4}",
            log.epoch, log.steps, log.avg_loss, log.avg_gap
        );
    }
}

/// Observer that discards all events (for tests)
#[derive(Debug, Default)]
pub struct NullObserver;

impl TrainObserver for NullObserver {
    fn on_step(&mut self, _log: &StepLog) {}
    fn on_epoch(&mut self, _log: &EpochLog) {}
}

/// Observer recording every event, for asserting on loop behavior in tests
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub steps: Vec<StepLog>,
    pub epochs: Vec<EpochLog>,
}

impl TrainObserver for RecordingObserver {
    fn on_step(&mut self, log: &StepLog) {
        self.steps.push(log.clone());
    }

    fn on_epoch(&mut self, log: &EpochLog) {
        self.epochs.push(log.clone());
    }
}
