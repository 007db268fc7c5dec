mod clean;
mod decoder;
mod fallback;
mod feature;
mod greedy;
mod preprocess;
mod vocabulary;

#[cfg(test)]
pub(crate) mod stub;

pub use clean::clean_caption;
pub use decoder::OrtCaptionDecoder;
pub use fallback::{FallbackCaptions, UNIVERSAL_CAPTIONS};
pub use feature::OrtFeatureExtractor;
pub use greedy::{pad_sequence, DecodedSequence, GreedyDecoder, StopReason, MAX_LENGTH};
pub use preprocess::{decode_image, preprocess_rgb8_image, TARGET_IMAGE_SIZE};
pub use vocabulary::{Vocabulary, VocabularyError, END_WORD, PADDING_ID, START_WORD};

use crate::{
    loader::ModelLoader, CaptionError, CaptionOutcome, CaptionResult, DegradeReason,
    FeatureExtractor, ImageSource, TokenPredictor,
};
use bytes::Bytes;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct CaptionModelPaths {
    pub vocabulary: PathBuf,
    pub feature_extractor: PathBuf,
    pub decoder: PathBuf,
}

impl CaptionModelPaths {
    pub fn from_resources_dir(resources_dir: impl AsRef<Path>) -> Self {
        let dir = resources_dir.as_ref().join("caption");
        Self {
            vocabulary: dir.join("vocabulary.json"),
            feature_extractor: dir.join("feature_extractor.onnx"),
            decoder: dir.join("decoder.onnx"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaptionConfig {
    pub paths: CaptionModelPaths,
    pub fetch_timeout: Duration,
    pub inference_workers: usize,
}

impl CaptionConfig {
    pub fn new(paths: CaptionModelPaths) -> Self {
        let inference_workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        Self {
            paths,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            inference_workers,
        }
    }

    /// ONNX intra-op threads per session, so that all workers together use
    /// about one thread per core.
    pub fn intra_threads(&self) -> usize {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        (cores / self.inference_workers.max(1)).max(1)
    }
}

/// The three loaded artifacts, shared read-only by every request.
pub struct CaptionModels {
    vocabulary: Vocabulary,
    feature_extractor: Box<dyn FeatureExtractor>,
    decoder: Box<dyn TokenPredictor>,
}

impl CaptionModels {
    pub fn new(
        vocabulary: Vocabulary,
        feature_extractor: Box<dyn FeatureExtractor>,
        decoder: Box<dyn TokenPredictor>,
    ) -> Self {
        Self {
            vocabulary,
            feature_extractor,
            decoder,
        }
    }

    pub fn from_files(paths: &CaptionModelPaths, intra_threads: usize) -> anyhow::Result<Self> {
        let vocabulary = Vocabulary::from_file(&paths.vocabulary)?;
        debug!("vocabulary loaded with {} words", vocabulary.len());

        let feature_extractor =
            OrtFeatureExtractor::from_file(&paths.feature_extractor, intra_threads)?;
        let decoder = OrtCaptionDecoder::from_file(&paths.decoder, intra_threads)?;

        Ok(Self::new(
            vocabulary,
            Box::new(feature_extractor),
            Box::new(decoder),
        ))
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Decode, extract features, run greedy search and clean the result.
    /// Blocking; call from a blocking-friendly thread.
    pub fn caption_image(&self, data: &[u8]) -> CaptionResult<String> {
        let image = decode_image(data)?;

        let features = self
            .feature_extractor
            .extract(&image)
            .map_err(|e| CaptionError::Inference(format!("{:#}", e)))?;

        let decoded = GreedyDecoder::new(&self.vocabulary, self.decoder.as_ref())
            .decode(&features)
            .map_err(|e| CaptionError::Inference(format!("{:#}", e)))?;

        debug!(
            "decoded {} tokens, stopped by {:?}",
            decoded.token_ids.len(),
            decoded.stop_reason
        );

        Ok(clean_caption(&decoded.text()))
    }
}

/// Entry point of the caption pipeline.
///
/// Never fails: anything that goes wrong between loading the models and
/// cleaning the caption is turned into a fallback caption.
pub struct CaptionGenerator {
    loader: ModelLoader<CaptionModels>,
    client: reqwest::Client,
    fallback: FallbackCaptions,
    workers: Arc<Semaphore>,
}

impl CaptionGenerator {
    /// Models are loaded lazily on the first caption request, or by `preload`.
    pub fn new(config: CaptionConfig) -> anyhow::Result<Self> {
        let paths = config.paths.clone();
        let intra_threads = config.intra_threads();
        let loader = ModelLoader::new(move || CaptionModels::from_files(&paths, intra_threads));

        Self::with_loader(loader, config.fetch_timeout, config.inference_workers)
    }

    pub fn from_models(models: CaptionModels, inference_workers: usize) -> anyhow::Result<Self> {
        Self::with_loader(
            ModelLoader::ready(models),
            DEFAULT_FETCH_TIMEOUT,
            inference_workers,
        )
    }

    fn with_loader(
        loader: ModelLoader<CaptionModels>,
        fetch_timeout: Duration,
        inference_workers: usize,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(fetch_timeout).build()?;

        Ok(Self {
            loader,
            client,
            fallback: FallbackCaptions::default(),
            workers: Arc::new(Semaphore::new(inference_workers.max(1))),
        })
    }

    /// Trigger model loading ahead of the first request.
    pub async fn preload(&self) {
        match self.loader.load().await {
            Ok(models) => info!(
                "caption models ready, vocabulary size {}",
                models.vocabulary().len()
            ),
            Err(e) => warn!("caption models unavailable, fallback captions only: {}", e),
        }
    }

    #[tracing::instrument(skip_all)]
    pub async fn caption(&self, source: impl Into<ImageSource>) -> CaptionOutcome {
        match self.try_caption(source.into()).await {
            Ok(caption) if !caption.is_empty() => CaptionOutcome::Generated(caption),
            Ok(_) => {
                warn!("model produced an empty caption");
                self.degraded(DegradeReason::EmptyCaption)
            }
            Err(e) => {
                warn!("caption generation degraded: {}", e);
                self.degraded(DegradeReason::from(&e))
            }
        }
    }

    /// Run the pipeline without the fallback.
    pub async fn try_caption(&self, source: ImageSource) -> CaptionResult<String> {
        let models = self.loader.load().await?;

        let data = match source {
            ImageSource::Bytes(data) => data,
            ImageSource::Url(url) => self.fetch(&url).await?,
        };

        let _permit = self
            .workers
            .acquire()
            .await
            .map_err(|e| CaptionError::Inference(e.to_string()))?;

        tokio::task::spawn_blocking(move || models.caption_image(&data))
            .await
            .map_err(|e| CaptionError::Inference(e.to_string()))?
    }

    async fn fetch(&self, url: &str) -> CaptionResult<Bytes> {
        debug!("fetching image from {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CaptionError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CaptionError::Fetch(format!(
                "unexpected status {} from {}",
                response.status(),
                url
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| CaptionError::Fetch(e.to_string()))
    }

    fn degraded(&self, reason: DegradeReason) -> CaptionOutcome {
        CaptionOutcome::Degraded {
            caption: self.fallback.pick(),
            reason,
        }
    }
}
