//! Image preprocessing
//!
//! Turns an arbitrary image file into the fixed-shape input the classifier
//! expects: RGB, center-cropped to a square, Lanczos-resized to 224×224,
//! scaled with `pixel / 127.0 - 1.0` and laid out NHWC as a batch of one.

use std::path::Path;

use image::{imageops, imageops::FilterType, DynamicImage, ImageReader, RgbImage};

use crate::utils::error::{ClassifierError, Result};

/// Side length of the square model input
pub const INPUT_SIZE: u32 = 224;

/// Color channels per pixel
pub const CHANNELS: usize = 3;

/// Model input shape (batch, height, width, channels)
pub const INPUT_SHAPE: [usize; 4] = [1, INPUT_SIZE as usize, INPUT_SIZE as usize, CHANNELS];

/// Divisor the pretrained model was trained with. Not 127.5.
const PIXEL_SCALE: f32 = 127.0;

/// Batch of one preprocessed image, NHWC, values in [-1, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedTensor {
    data: Vec<f32>,
}

impl PreparedTensor {
    /// Number of elements in a prepared tensor
    pub const LEN: usize = INPUT_SHAPE[0] * INPUT_SHAPE[1] * INPUT_SHAPE[2] * INPUT_SHAPE[3];

    /// Wrap a raw NHWC buffer, checking length and value range
    pub fn from_vec(data: Vec<f32>) -> Result<Self> {
        if data.len() != Self::LEN {
            return Err(ClassifierError::InvalidInput(format!(
                "expected {} tensor elements, got {}",
                Self::LEN,
                data.len()
            )));
        }
        if let Some(bad) = data.iter().find(|v| !(-1.0..=1.0).contains(*v)) {
            return Err(ClassifierError::InvalidInput(format!(
                "tensor value {} outside [-1, 1]",
                bad
            )));
        }
        Ok(Self { data })
    }

    pub fn shape(&self) -> [usize; 4] {
        INPUT_SHAPE
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Value at (row, column, channel) of the single batch item
    pub fn at(&self, y: usize, x: usize, c: usize) -> f32 {
        let width = INPUT_SHAPE[2];
        self.data[(y * width + x) * CHANNELS + c]
    }
}

/// Map an 8-bit channel value into [-1, 1]
///
/// 255 would land slightly above 1.0 with the 127 divisor, so the result is
/// clamped.
#[inline]
pub fn normalize_pixel(value: u8) -> f32 {
    (value as f32 / PIXEL_SCALE - 1.0).clamp(-1.0, 1.0)
}

/// Crop the centered square of `image` and resample it to `size`×`size`
///
/// Equivalent to fitting the image into a square box and cutting away what
/// overflows on the longer axis.
pub fn fit_square(image: &RgbImage, size: u32, filter: FilterType) -> RgbImage {
    let (width, height) = image.dimensions();
    let side = width.min(height);
    let left = (width - side) / 2;
    let top = (height - side) / 2;

    let cropped = imageops::crop_imm(image, left, top, side, side).to_image();
    if side == size {
        return cropped;
    }
    imageops::resize(&cropped, size, size, filter)
}

/// Preprocess an already decoded image
pub fn prepare(image: &DynamicImage) -> Result<PreparedTensor> {
    if image.width() == 0 || image.height() == 0 {
        return Err(ClassifierError::InvalidInput(
            "image has zero width or height".to_string(),
        ));
    }

    let rgb = image.to_rgb8();
    let fitted = fit_square(&rgb, INPUT_SIZE, FilterType::Lanczos3);

    // RgbImage is already row-major interleaved RGB, i.e. HWC.
    let data: Vec<f32> = fitted.as_raw().iter().map(|&v| normalize_pixel(v)).collect();
    debug_assert_eq!(data.len(), PreparedTensor::LEN);

    Ok(PreparedTensor { data })
}

/// Decode the image at `path` and preprocess it
///
/// The format is detected from the file contents, so uploads with a wrong or
/// missing extension still decode.
pub fn prepare_image(path: &Path) -> Result<PreparedTensor> {
    let decode_err = |e: &dyn std::fmt::Display| {
        ClassifierError::ImageDecode(path.to_path_buf(), e.to_string())
    };

    let image = ImageReader::open(path)
        .map_err(|e| decode_err(&e))?
        .with_guessed_format()
        .map_err(|e| decode_err(&e))?
        .decode()
        .map_err(|e| decode_err(&e))?;

    prepare(&image).map_err(|e| decode_err(&e))
}
