// src/classifier/onnx.rs
use super::{decode_prediction, preprocess, CaptchaSolver, IMAGE_HEIGHT, IMAGE_WIDTH, INPUT_NAME};
use crate::utils::error::ClassifierError;
use ort::session::Session;
use ort::value::Tensor;
use parking_lot::Mutex;
use std::path::Path;

/// ONNX Runtime backed classifier. Inference keeps no state between calls;
/// the mutex only exists because `Session::run` takes `&mut self`.
pub struct OnnxCaptchaModel {
    session: Mutex<Session>,
}

impl std::fmt::Debug for OnnxCaptchaModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxCaptchaModel").finish_non_exhaustive()
    }
}

impl OnnxCaptchaModel {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        tracing::info!(?path, "Loading CAPTCHA model");

        let session = Session::builder()
            .map_err(|e| ClassifierError::ModelLoad(format!("Failed to create session builder: {}", e)))?
            .commit_from_file(path)
            .map_err(|e| ClassifierError::ModelLoad(format!("Failed to load {}: {}", path.display(), e)))?;

        Ok(Self { session: Mutex::new(session) })
    }
}

impl CaptchaSolver for OnnxCaptchaModel {
    fn solve(&self, image: &[u8]) -> Result<String, ClassifierError> {
        let pixels = preprocess(image)?;
        let shape = vec![1_i64, i64::from(IMAGE_HEIGHT), i64::from(IMAGE_WIDTH), 1];
        let input = Tensor::from_array((shape, pixels))
            .map_err(|e| ClassifierError::Inference(format!("Failed to create input tensor: {}", e)))?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![INPUT_NAME => input])
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;

        let output = outputs
            .iter()
            .next()
            .map(|(_, value)| value)
            .ok_or_else(|| ClassifierError::Inference("Model produced no output".to_string()))?;
        let (_, scores) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::Inference(format!("Failed to extract output: {}", e)))?;

        let code = decode_prediction(scores)?;
        tracing::debug!("Classified challenge image as {}", code);
        Ok(code)
    }
}
