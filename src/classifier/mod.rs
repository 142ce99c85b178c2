// src/classifier/mod.rs
//! CAPTCHA classifier: challenge image bytes → five-character code.
//!
//! The model is a fixed, pre-trained network consumed as an opaque function.
//! It expects a single-channel 250×50 image scaled to [-1, 1] (input name
//! `captcha`, NHWC layout) and yields one distribution over [`ALPHABET`] per
//! code position. Loading happens once; the resulting handle is shared
//! read-only by every portal session.

#[cfg(feature = "onnx")]
mod onnx;

#[cfg(feature = "onnx")]
pub use onnx::OnnxCaptchaModel;

use crate::utils::error::ClassifierError;
use image::imageops::FilterType;
use std::path::Path;
use std::sync::Arc;

/// Symbols the model distinguishes, in output index order.
pub const ALPHABET: &[u8; 36] = b"abcdefghijklmnopqrstuvwxyz0123456789";
/// Number of characters in a challenge code.
pub const CODE_LENGTH: usize = 5;
pub const IMAGE_WIDTH: u32 = 250;
pub const IMAGE_HEIGHT: u32 = 50;
/// Name of the model's input tensor.
pub const INPUT_NAME: &str = "captcha";

/// Anything able to turn a challenge image into the code the portal expects.
pub trait CaptchaSolver: Send + Sync {
    fn solve(&self, image: &[u8]) -> Result<String, ClassifierError>;
}

/// Closures work as solvers, e.g. to hand challenges to an operator.
impl<F> CaptchaSolver for F
where
    F: Fn(&[u8]) -> Result<String, ClassifierError> + Send + Sync,
{
    fn solve(&self, image: &[u8]) -> Result<String, ClassifierError> {
        self(image)
    }
}

/// Loads the ONNX model at `path` into a shareable solver handle.
#[cfg(feature = "onnx")]
pub fn load_model(path: &Path) -> Result<Arc<dyn CaptchaSolver>, ClassifierError> {
    Ok(Arc::new(OnnxCaptchaModel::load(path)?))
}

#[cfg(not(feature = "onnx"))]
pub fn load_model(path: &Path) -> Result<Arc<dyn CaptchaSolver>, ClassifierError> {
    Err(ClassifierError::ModelLoad(format!(
        "cannot load {}: built without the `onnx` feature",
        path.display()
    )))
}

/// Decodes an image into the model's input: grayscale, 250×50, row-major, values in [-1, 1].
pub fn preprocess(image_bytes: &[u8]) -> Result<Vec<f32>, ClassifierError> {
    let decoded = image::load_from_memory(image_bytes)
        .map_err(|e| ClassifierError::ImageDecode(e.to_string()))?;
    let mut gray = decoded.to_luma8();

    if gray.dimensions() != (IMAGE_WIDTH, IMAGE_HEIGHT) {
        tracing::debug!(
            "Resizing challenge image from {:?} to {}x{}",
            gray.dimensions(),
            IMAGE_WIDTH,
            IMAGE_HEIGHT
        );
        gray = image::imageops::resize(&gray, IMAGE_WIDTH, IMAGE_HEIGHT, FilterType::Triangle);
    }

    Ok(gray
        .pixels()
        .map(|pixel| f32::from(pixel[0]) / 255.0 * 2.0 - 1.0)
        .collect())
}

/// Turns the model output (`CODE_LENGTH` rows of `ALPHABET.len()` scores) into
/// the uppercase code, taking the arg-max of every row.
pub fn decode_prediction(scores: &[f32]) -> Result<String, ClassifierError> {
    let expected = CODE_LENGTH * ALPHABET.len();
    if scores.len() != expected {
        return Err(ClassifierError::OutputShape { expected, actual: scores.len() });
    }

    let code = scores
        .chunks_exact(ALPHABET.len())
        .map(|row| {
            // First maximum wins on ties.
            let (best, _) = row
                .iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |(best, max), (idx, &score)| {
                    if score > max { (idx, score) } else { (best, max) }
                });
            char::from(ALPHABET[best]).to_ascii_uppercase()
        })
        .collect();
    Ok(code)
}
