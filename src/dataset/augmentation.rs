//! Data Augmentation Module for Landmark Classification
//!
//! Provides on-the-fly image augmentations applied to the train split only.
//!
//! # Augmentation Strategy
//!
//! - **Training**: random horizontal flip, then exactly one of color jitter
//!   or a random affine transform, chosen uniformly per access
//! - **Validation/Test**: no augmentations (clean evaluation)
//!
//! All splits finish with a deterministic center crop to a fixed square
//! extent and conversion to a normalized CHW tensor. Augmentation draws are
//! resampled independently on every access; nothing is cached.

use image::{DynamicImage, GenericImageView, ImageBuffer, Rgb, RgbImage};
use rand::Rng;

/// Configuration for train-split augmentation
#[derive(Clone, Debug)]
pub struct AugmentConfig {
    /// Probability of applying horizontal flip (0.0 - 1.0)
    pub horizontal_flip_prob: f32,
    /// Brightness/contrast/saturation factors drawn in 1.0 ± jitter_delta,
    /// hue shifted by ±jitter_delta of a full turn
    pub jitter_delta: f32,
    /// Maximum rotation angle in degrees (applies ±rotation_degrees)
    pub rotation_degrees: f32,
    /// Maximum translation as a fraction of each extent
    pub translate_frac: f32,
    /// Scale factor range
    pub scale_range: (f32, f32),
    /// Maximum shear angle in degrees
    pub shear_degrees: f32,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            horizontal_flip_prob: 0.5,
            jitter_delta: 0.2,
            rotation_degrees: 15.0,
            translate_frac: 0.2,
            scale_range: (0.8, 1.2),
            shear_degrees: 15.0,
        }
    }
}

/// Image augmenter that applies random transformations
#[derive(Clone, Debug)]
pub struct Augmenter {
    config: AugmentConfig,
    crop_size: u32,
}

impl Augmenter {
    /// Create a new augmenter with the given configuration
    pub fn new(config: AugmentConfig, crop_size: u32) -> Self {
        Self { config, crop_size }
    }

    /// Create an augmenter with the default configuration
    pub fn with_defaults(crop_size: u32) -> Self {
        Self::new(AugmentConfig::default(), crop_size)
    }

    /// Apply the train-split augmentation pipeline to an image.
    ///
    /// Order is fixed: horizontal flip (p = 0.5), then exactly one of color
    /// jitter or affine transform, drawn uniformly.
    pub fn augment<R: Rng>(&self, img: DynamicImage, rng: &mut R) -> DynamicImage {
        let mut result = img;

        if rng.gen::<f32>() < self.config.horizontal_flip_prob {
            result = result.fliph();
        }

        if rng.gen_bool(0.5) {
            result = self.color_jitter(&result, rng);
        } else {
            result = self.random_affine(&result, rng);
        }

        result
    }

    /// Perturb brightness, contrast, saturation, and hue, each within the
    /// configured delta
    pub fn color_jitter<R: Rng>(&self, img: &DynamicImage, rng: &mut R) -> DynamicImage {
        let d = self.config.jitter_delta;
        let brightness = rng.gen_range(1.0 - d..=1.0 + d);
        let contrast = rng.gen_range(1.0 - d..=1.0 + d);
        let saturation = rng.gen_range(1.0 - d..=1.0 + d);
        let hue_degrees = rng.gen_range(-d..=d) * 360.0;

        let result = self.adjust_brightness(img, brightness);
        let result = self.adjust_contrast(&result, contrast);
        let result = self.adjust_saturation(&result, saturation);
        self.shift_hue(&result, hue_degrees)
    }

    /// Apply a random affine transform within the configured limits,
    /// resampled with bilinear interpolation
    pub fn random_affine<R: Rng>(&self, img: &DynamicImage, rng: &mut R) -> DynamicImage {
        let (width, height) = img.dimensions();

        let angle = rng
            .gen_range(-self.config.rotation_degrees..=self.config.rotation_degrees)
            .to_radians();
        let shear = rng
            .gen_range(-self.config.shear_degrees..=self.config.shear_degrees)
            .to_radians();
        let scale = rng.gen_range(self.config.scale_range.0..=self.config.scale_range.1);
        let tx = rng.gen_range(-self.config.translate_frac..=self.config.translate_frac)
            * width as f32;
        let ty = rng.gen_range(-self.config.translate_frac..=self.config.translate_frac)
            * height as f32;

        self.affine(img, angle, shear, scale, tx, ty)
    }

    /// Apply an affine transform around the image center: rotation, x-shear,
    /// uniform scale, then translation
    fn affine(
        &self,
        img: &DynamicImage,
        angle: f32,
        shear: f32,
        scale: f32,
        tx: f32,
        ty: f32,
    ) -> DynamicImage {
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();
        let cx = width as f32 / 2.0;
        let cy = height as f32 / 2.0;

        // Forward matrix M = scale * R(angle) * Shear(shear); destination
        // pixels are mapped back through its inverse.
        let (sin_a, cos_a) = angle.sin_cos();
        let tan_s = shear.tan();
        let a = scale * cos_a;
        let b = scale * (cos_a * tan_s - sin_a);
        let c = scale * sin_a;
        let d = scale * (sin_a * tan_s + cos_a);

        let det = a * d - b * c;
        if det.abs() < 1e-6 {
            return img.clone();
        }
        let (ia, ib, ic, id) = (d / det, -b / det, -c / det, a / det);

        let mut output = ImageBuffer::new(width, height);

        for y in 0..height {
            for x in 0..width {
                let dx = x as f32 - cx - tx;
                let dy = y as f32 - cy - ty;

                let src_x = cx + ia * dx + ib * dy;
                let src_y = cy + ic * dx + id * dy;

                let pixel = self.bilinear_sample(&rgb, src_x, src_y);
                output.put_pixel(x, y, pixel);
            }
        }

        DynamicImage::ImageRgb8(output)
    }

    /// Sample a pixel using bilinear interpolation
    fn bilinear_sample(&self, img: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
        let (width, height) = img.dimensions();

        // Black for out-of-bounds samples
        if x < 0.0 || y < 0.0 || x >= width as f32 - 1.0 || y >= height as f32 - 1.0 {
            return Rgb([0, 0, 0]);
        }

        let x0 = x.floor() as u32;
        let y0 = y.floor() as u32;
        let x1 = (x0 + 1).min(width - 1);
        let y1 = (y0 + 1).min(height - 1);

        let fx = x - x0 as f32;
        let fy = y - y0 as f32;

        let p00 = img.get_pixel(x0, y0);
        let p10 = img.get_pixel(x1, y0);
        let p01 = img.get_pixel(x0, y1);
        let p11 = img.get_pixel(x1, y1);

        let mut result = [0u8; 3];
        for ch in 0..3 {
            let v = p00[ch] as f32 * (1.0 - fx) * (1.0 - fy)
                + p10[ch] as f32 * fx * (1.0 - fy)
                + p01[ch] as f32 * (1.0 - fx) * fy
                + p11[ch] as f32 * fx * fy;
            result[ch] = v.round().clamp(0.0, 255.0) as u8;
        }

        Rgb(result)
    }

    /// Adjust brightness by scaling all channels
    fn adjust_brightness(&self, img: &DynamicImage, factor: f32) -> DynamicImage {
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();

        let mut output = ImageBuffer::new(width, height);
        for (x, y, pixel) in rgb.enumerate_pixels() {
            let r = (pixel[0] as f32 * factor).clamp(0.0, 255.0) as u8;
            let g = (pixel[1] as f32 * factor).clamp(0.0, 255.0) as u8;
            let b = (pixel[2] as f32 * factor).clamp(0.0, 255.0) as u8;
            output.put_pixel(x, y, Rgb([r, g, b]));
        }

        DynamicImage::ImageRgb8(output)
    }

    /// Adjust contrast by scaling pixel values around the mean luminance
    fn adjust_contrast(&self, img: &DynamicImage, factor: f32) -> DynamicImage {
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();

        let mut sum = 0.0f64;
        let count = (width * height) as f64;
        for pixel in rgb.pixels() {
            let lum = 0.299 * pixel[0] as f64 + 0.587 * pixel[1] as f64 + 0.114 * pixel[2] as f64;
            sum += lum;
        }
        let mean = (sum / count) as f32;

        let mut output = ImageBuffer::new(width, height);
        for (x, y, pixel) in rgb.enumerate_pixels() {
            let r = (mean + factor * (pixel[0] as f32 - mean)).clamp(0.0, 255.0) as u8;
            let g = (mean + factor * (pixel[1] as f32 - mean)).clamp(0.0, 255.0) as u8;
            let b = (mean + factor * (pixel[2] as f32 - mean)).clamp(0.0, 255.0) as u8;
            output.put_pixel(x, y, Rgb([r, g, b]));
        }

        DynamicImage::ImageRgb8(output)
    }

    /// Adjust saturation by interpolating between grayscale and the original
    fn adjust_saturation(&self, img: &DynamicImage, factor: f32) -> DynamicImage {
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();

        let mut output = ImageBuffer::new(width, height);
        for (x, y, pixel) in rgb.enumerate_pixels() {
            let gray = 0.299 * pixel[0] as f32 + 0.587 * pixel[1] as f32 + 0.114 * pixel[2] as f32;

            let r = (gray + factor * (pixel[0] as f32 - gray)).clamp(0.0, 255.0) as u8;
            let g = (gray + factor * (pixel[1] as f32 - gray)).clamp(0.0, 255.0) as u8;
            let b = (gray + factor * (pixel[2] as f32 - gray)).clamp(0.0, 255.0) as u8;
            output.put_pixel(x, y, Rgb([r, g, b]));
        }

        DynamicImage::ImageRgb8(output)
    }

    /// Rotate the hue of every pixel by the given angle in degrees
    fn shift_hue(&self, img: &DynamicImage, degrees: f32) -> DynamicImage {
        if degrees.abs() < 1e-3 {
            return img.clone();
        }

        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();

        let mut output = ImageBuffer::new(width, height);
        for (x, y, pixel) in rgb.enumerate_pixels() {
            let (h, s, v) = rgb_to_hsv(pixel[0], pixel[1], pixel[2]);
            let shifted = (h + degrees).rem_euclid(360.0);
            let (r, g, b) = hsv_to_rgb(shifted, s, v);
            output.put_pixel(x, y, Rgb([r, g, b]));
        }

        DynamicImage::ImageRgb8(output)
    }

    /// Deterministic center crop to the configured square extent.
    ///
    /// Images smaller than the crop extent are zero-padded around the
    /// centered content, so output dimensions are always `crop_size`.
    pub fn center_crop(&self, img: &DynamicImage) -> DynamicImage {
        let crop = self.crop_size;
        let (width, height) = img.dimensions();

        let left = width.saturating_sub(crop) / 2;
        let top = height.saturating_sub(crop) / 2;
        let cropped = img
            .crop_imm(left, top, crop.min(width), crop.min(height))
            .to_rgb8();

        if cropped.dimensions() == (crop, crop) {
            return DynamicImage::ImageRgb8(cropped);
        }

        let (cw, ch) = cropped.dimensions();
        let mut padded = ImageBuffer::from_pixel(crop, crop, Rgb([0, 0, 0]));
        let offset_x = (crop - cw) / 2;
        let offset_y = (crop - ch) / 2;
        for (x, y, pixel) in cropped.enumerate_pixels() {
            padded.put_pixel(x + offset_x, y + offset_y, *pixel);
        }

        DynamicImage::ImageRgb8(padded)
    }

    /// Convert image to CHW float tensor data normalized to [0, 1]
    pub fn to_tensor_data(&self, img: &DynamicImage) -> Vec<f32> {
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();
        let mut data = Vec::with_capacity(3 * height as usize * width as usize);

        // CHW format
        for ch in 0..3 {
            for y in 0..height {
                for x in 0..width {
                    let pixel = rgb.get_pixel(x, y);
                    data.push(pixel[ch] as f32 / 255.0);
                }
            }
        }

        data
    }

    /// Full preprocessing pipeline: augment (train only), center crop,
    /// convert to tensor data
    pub fn preprocess<R: Rng>(&self, img: DynamicImage, rng: Option<&mut R>) -> Vec<f32> {
        let result = match rng {
            Some(rng) => self.augment(img, rng),
            None => img,
        };

        let cropped = self.center_crop(&result);
        self.to_tensor_data(&cropped)
    }

    /// The configured crop extent
    pub fn crop_size(&self) -> u32 {
        self.crop_size
    }
}

/// Convert an RGB pixel to HSV (h in degrees, s and v in [0, 1])
fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let r = r as f32 / 255.0;
    let g = g as f32 / 255.0;
    let b = b as f32 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let h = if delta < 1e-6 {
        0.0
    } else if (max - r).abs() < 1e-6 {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if (max - g).abs() < 1e-6 {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    let s = if max < 1e-6 { 0.0 } else { delta / max };

    (h, s, max)
}

/// Convert an HSV triple back to RGB bytes
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (u8, u8, u8) {
    let c = v * s;
    let hp = h / 60.0;
    let x = c * (1.0 - (hp.rem_euclid(2.0) - 1.0).abs());

    let (r1, g1, b1) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    let m = v - c;
    (
        ((r1 + m) * 255.0).round().clamp(0.0, 255.0) as u8,
        ((g1 + m) * 255.0).round().clamp(0.0, 255.0) as u8,
        ((b1 + m) * 255.0).round().clamp(0.0, 255.0) as u8,
    )
}
