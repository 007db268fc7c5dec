use bytes::Bytes;
use strum_macros::AsRefStr;

#[derive(Debug, Clone)]
pub enum ImageSource {
    Bytes(Bytes),
    Url(String),
}

impl From<Bytes> for ImageSource {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<Vec<u8>> for ImageSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(value))
    }
}

/// Embedding produced once per request and consumed by a single decoding run.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

#[derive(AsRefStr, Debug, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "snake_case")]
pub enum DegradeReason {
    ModelUnavailable,
    Fetch,
    ImageDecode,
    Inference,
    EmptyCaption,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptionOutcome {
    Generated(String),
    Degraded {
        caption: String,
        reason: DegradeReason,
    },
}

impl CaptionOutcome {
    pub fn caption(&self) -> &str {
        match self {
            Self::Generated(caption) => caption,
            Self::Degraded { caption, .. } => caption,
        }
    }

    pub fn degrade_reason(&self) -> Option<DegradeReason> {
        match self {
            Self::Generated(_) => None,
            Self::Degraded { reason, .. } => Some(*reason),
        }
    }
}
