//! Weighted running mean for smoothing logged quantities

/// Computes and stores the weighted average and current value.
///
/// The sum and weight count are accumulated; the average is computed on
/// read.
#[derive(Debug, Clone, Default)]
pub struct AverageMeter {
    /// Most recently observed value
    pub val: f64,
    sum: f64,
    count: f64,
}

impl AverageMeter {
    /// Create a fresh meter
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all accumulated state, starting a new reporting scope
    pub fn reset(&mut self) {
        self.val = 0.0;
        self.sum = 0.0;
        self.count = 0.0;
    }

    /// Record a value with the given weight
    pub fn update(&mut self, val: f64, weight: usize) {
        self.val = val;
        self.sum += val * weight as f64;
        self.count += weight as f64;
    }

    /// Weighted mean of all values since the last reset (0 when empty)
    pub fn average(&self) -> f64 {
        if self.count > 0.0 {
            self.sum / self.count
        } else {
            0.0
        }
    }
}
