use crate::{
    ort::{load_onnx_model, ONNXModelConfig},
    FeatureVector, TokenPredictor,
};
use anyhow::{anyhow, bail};
use ndarray::Array2;
use ort::{Session, TensorElementType, ValueType};
use std::path::Path;

/// Caption decoder exported to ONNX.
///
/// The model takes `[features, padded_sequence]` and returns one score per
/// vocabulary id. Keras exports the sequence input as float32 unless the
/// input layer was declared otherwise, so the element type is read from the
/// session instead of being assumed.
pub struct OrtCaptionDecoder {
    model: Session,
    features_input: String,
    sequence_input: String,
    sequence_type: TensorElementType,
    output_name: String,
}

impl OrtCaptionDecoder {
    pub fn from_file(model_path: impl AsRef<Path>, intra_threads: usize) -> anyhow::Result<Self> {
        let model = load_onnx_model(
            model_path,
            ONNXModelConfig::with_intra_threads(intra_threads),
        )?;

        if model.inputs.len() != 2 {
            bail!(
                "caption decoder expects 2 inputs (features, sequence), found {}",
                model.inputs.len()
            );
        }

        let features_input = model.inputs[0].name.clone();
        let sequence_input = model.inputs[1].name.clone();
        let sequence_type = match &model.inputs[1].input_type {
            ValueType::Tensor { ty, .. } => *ty,
            other => bail!("unsupported sequence input type: {:?}", other),
        };
        let output_name = model
            .outputs
            .first()
            .map(|v| v.name.clone())
            .ok_or(anyhow!("caption decoder has no outputs"))?;

        Ok(Self {
            model,
            features_input,
            sequence_input,
            sequence_type,
            output_name,
        })
    }
}

impl TokenPredictor for OrtCaptionDecoder {
    fn predict(&self, features: &FeatureVector, sequence: &[u32]) -> anyhow::Result<Vec<f32>> {
        let features = Array2::from_shape_vec((1, features.dim()), features.as_slice().to_vec())?;

        macro_rules! run_with_sequence {
            ($ty:ty) => {{
                let sequence = Array2::from_shape_vec(
                    (1, sequence.len()),
                    sequence.iter().map(|&id| id as $ty).collect(),
                )?;
                let outputs = self.model.run(ort::inputs![
                    self.features_input.as_str() => features.view(),
                    self.sequence_input.as_str() => sequence.view()
                ]?)?;
                let scores = outputs
                    .get(self.output_name.as_str())
                    .ok_or(anyhow!("output not found"))?
                    .try_extract_tensor::<f32>()?
                    .iter()
                    .copied()
                    .collect::<Vec<f32>>();
                scores
            }};
        }

        let scores = match self.sequence_type {
            TensorElementType::Int64 => run_with_sequence!(i64),
            TensorElementType::Int32 => run_with_sequence!(i32),
            TensorElementType::Float32 => run_with_sequence!(f32),
            other => bail!("unsupported sequence element type: {:?}", other),
        };

        Ok(scores)
    }
}
