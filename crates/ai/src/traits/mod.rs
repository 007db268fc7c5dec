mod image_caption;

pub use image_caption::*;
use image::RgbImage;

/// Maps a decoded image into a fixed-length embedding.
///
/// Implementations own whatever resizing or normalization their model expects,
/// and must be safe to share across requests.
pub trait FeatureExtractor: Send + Sync {
    fn extract(&self, image: &RgbImage) -> anyhow::Result<FeatureVector>;
}

/// Scores every vocabulary id as the next token.
///
/// `sequence` is already padded to the decoder's fixed input length. The
/// returned vector is indexed by token id.
pub trait TokenPredictor: Send + Sync {
    fn predict(&self, features: &FeatureVector, sequence: &[u32]) -> anyhow::Result<Vec<f32>>;
}
