use std::path::Path;

use anyhow::bail;
use ort::{GraphOptimizationLevel, Session};
use tracing::debug;

pub(crate) struct ONNXModelConfig {
    pub num_intra_thread: usize,
    pub optimization_level: GraphOptimizationLevel,
}

impl ONNXModelConfig {
    pub fn with_intra_threads(num_intra_thread: usize) -> Self {
        Self {
            num_intra_thread: num_intra_thread.max(1),
            optimization_level: GraphOptimizationLevel::Level3,
        }
    }
}

/// Load ONNX model from file with some predefined config
///
/// Missing files are reported before the runtime is touched, so an absent
/// artifact shows up as a plain load error.
pub(crate) fn load_onnx_model(
    model_path: impl AsRef<Path>,
    config: ONNXModelConfig,
) -> anyhow::Result<Session> {
    let model_path = model_path.as_ref();
    if !model_path.is_file() {
        bail!("model artifact not found: {}", model_path.display());
    }

    debug!(
        "loading onnx model {} with {} intra threads",
        model_path.display(),
        config.num_intra_thread
    );

    let session = Session::builder()?
        .with_intra_threads(config.num_intra_thread)?
        .with_optimization_level(config.optimization_level)?
        .commit_from_file(model_path)?;

    Ok(session)
}
