use crate::DegradeReason;
use thiserror::Error;

pub type CaptionResult<T> = std::result::Result<T, CaptionError>;

#[derive(Error, Debug)]
pub enum CaptionError {
    #[error("caption model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("failed to fetch image: {0}")]
    Fetch(String),

    #[error("failed to decode image: {0}")]
    ImageDecode(String),

    #[error("caption inference failed: {0}")]
    Inference(String),
}

impl From<&CaptionError> for DegradeReason {
    fn from(value: &CaptionError) -> Self {
        match value {
            CaptionError::ModelUnavailable(_) => DegradeReason::ModelUnavailable,
            CaptionError::Fetch(_) => DegradeReason::Fetch,
            CaptionError::ImageDecode(_) => DegradeReason::ImageDecode,
            CaptionError::Inference(_) => DegradeReason::Inference,
        }
    }
}
