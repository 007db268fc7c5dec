use super::preprocess::{preprocess_rgb8_image, TARGET_IMAGE_SIZE};
use crate::{
    ort::{load_onnx_model, ONNXModelConfig},
    FeatureExtractor, FeatureVector,
};
use anyhow::anyhow;
use image::RgbImage;
use ort::Session;
use std::path::Path;

/// Image encoder exported to ONNX, e.g. VGG16 cut at its penultimate layer.
pub struct OrtFeatureExtractor {
    model: Session,
    input_name: String,
    output_name: String,
    image_size: u32,
}

impl OrtFeatureExtractor {
    pub fn from_file(model_path: impl AsRef<Path>, intra_threads: usize) -> anyhow::Result<Self> {
        let model = load_onnx_model(
            model_path,
            ONNXModelConfig::with_intra_threads(intra_threads),
        )?;

        let input_name = model
            .inputs
            .first()
            .map(|v| v.name.clone())
            .ok_or(anyhow!("feature extractor has no inputs"))?;
        let output_name = model
            .outputs
            .first()
            .map(|v| v.name.clone())
            .ok_or(anyhow!("feature extractor has no outputs"))?;

        Ok(Self {
            model,
            input_name,
            output_name,
            image_size: TARGET_IMAGE_SIZE,
        })
    }
}

impl FeatureExtractor for OrtFeatureExtractor {
    fn extract(&self, image: &RgbImage) -> anyhow::Result<FeatureVector> {
        let pixels = preprocess_rgb8_image(image, self.image_size);

        let outputs = self
            .model
            .run(ort::inputs![self.input_name.as_str() => pixels.view()]?)?;

        let output = outputs
            .get(self.output_name.as_str())
            .ok_or(anyhow!("output not found"))?
            .try_extract_tensor::<f32>()?;

        Ok(FeatureVector::new(output.iter().copied().collect()))
    }
}
