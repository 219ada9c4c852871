//! Model module: CNN classifier over the landmark label space

pub mod cnn;

pub use cnn::{ConvBlock, LandmarkClassifier, LandmarkClassifierConfig};
