//! CNN Model Architecture for Landmark Classification
//!
//! A convolutional classifier built with the Burn framework. The head is
//! sized to the encoded label space, which fixes the output dimensionality
//! contract shared with the GAP metric and the submission assembler; the
//! backbone itself is swappable.

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d,
        Relu,
    },
    tensor::{backend::Backend, Tensor},
};

/// Configuration for the LandmarkClassifier model
#[derive(Config, Debug)]
pub struct LandmarkClassifierConfig {
    /// Number of output classes (the encoded label space)
    pub num_classes: usize,

    /// Dropout rate for regularization
    #[config(default = "0.3")]
    pub dropout_rate: f64,

    /// Number of input channels (3 for RGB)
    #[config(default = "3")]
    pub in_channels: usize,

    /// Base number of convolutional filters
    #[config(default = "32")]
    pub base_filters: usize,
}

/// A CNN block with Conv2d, BatchNorm, ReLU, and MaxPool
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
    relu: Relu,
    pool: MaxPool2d,
}

impl<B: Backend> ConvBlock<B> {
    /// Create a new convolutional block
    pub fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .init(device);
        let bn = BatchNormConfig::new(out_channels).init(device);
        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();

        Self {
            conv,
            bn,
            relu: Relu::new(),
            pool,
        }
    }

    /// Forward pass through the block
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.bn.forward(x);
        let x = self.relu.forward(x);
        self.pool.forward(x)
    }
}

/// Landmark classifier CNN
///
/// Architecture:
/// - 4 convolutional blocks with doubling filter counts
/// - Global average pooling
/// - Fully connected head with dropout, sized to the label space
#[derive(Module, Debug)]
pub struct LandmarkClassifier<B: Backend> {
    conv1: ConvBlock<B>,
    conv2: ConvBlock<B>,
    conv3: ConvBlock<B>,
    conv4: ConvBlock<B>,

    global_pool: AdaptiveAvgPool2d,

    fc1: Linear<B>,
    dropout: Dropout,
    fc2: Linear<B>,

    num_classes: usize,
}

impl<B: Backend> LandmarkClassifier<B> {
    /// Create a new LandmarkClassifier from configuration
    pub fn new(config: &LandmarkClassifierConfig, device: &B::Device) -> Self {
        let base = config.base_filters;

        let conv1 = ConvBlock::new(config.in_channels, base, device);
        let conv2 = ConvBlock::new(base, base * 2, device);
        let conv3 = ConvBlock::new(base * 2, base * 4, device);
        let conv4 = ConvBlock::new(base * 4, base * 8, device);

        let global_pool = AdaptiveAvgPool2dConfig::new([1, 1]).init();

        let fc1 = LinearConfig::new(base * 8, 256).init(device);
        let dropout = DropoutConfig::new(config.dropout_rate).init();
        let fc2 = LinearConfig::new(256, config.num_classes).init(device);

        Self {
            conv1,
            conv2,
            conv3,
            conv4,
            global_pool,
            fc1,
            dropout,
            fc2,
            num_classes: config.num_classes,
        }
    }

    /// Forward pass through the network
    ///
    /// # Arguments
    /// * `x` - Input tensor of shape [batch_size, 3, height, width]
    ///
    /// # Returns
    /// * Logits tensor of shape [batch_size, num_classes]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.conv1.forward(x);
        let x = self.conv2.forward(x);
        let x = self.conv3.forward(x);
        let x = self.conv4.forward(x);

        // [B, C, H, W] -> [B, C]
        let x = self.global_pool.forward(x);
        let [batch_size, channels, _, _] = x.dims();
        let x = x.reshape([batch_size, channels]);

        let x = self.fc1.forward(x);
        let x = Relu::new().forward(x);
        let x = self.dropout.forward(x);
        self.fc2.forward(x)
    }

    /// Forward pass with softmax over classes, for ranked inference
    pub fn forward_softmax(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let logits = self.forward(x);
        burn::tensor::activation::softmax(logits, 1)
    }

    /// Get the number of output classes
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn::backend::NdArray;

    #[test]
    fn test_classifier_output_shape() {
        let device = Default::default();
        let config = LandmarkClassifierConfig::new(17).with_base_filters(4);
        let model = LandmarkClassifier::<TestBackend>::new(&config, &device);

        let input = Tensor::<TestBackend, 4>::zeros([2, 3, 32, 32], &device);
        let output = model.forward(input);

        assert_eq!(output.dims(), [2, 17]);
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let device = Default::default();
        let config = LandmarkClassifierConfig::new(5).with_base_filters(4);
        let model = LandmarkClassifier::<TestBackend>::new(&config, &device);

        let input = Tensor::<TestBackend, 4>::ones([1, 3, 32, 32], &device);
        let probs = model.forward_softmax(input);

        let row_sum: f32 = probs.sum().into_scalar();
        assert!((row_sum - 1.0).abs() < 1e-4);
    }
}
