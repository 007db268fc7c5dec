use crate::{
    auth::Identity,
    db::{CaptionRepository, NewCaption},
    session::SessionStore,
};
use ai::{caption::CaptionGenerator, CaptionOutcome};
use bytes::Bytes;
use std::{future::Future, sync::Arc, time::Duration};
use storage::{Storage, StorageError};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Accepted content types and the extension their blobs are stored with.
const ALLOWED_CONTENT_TYPES: [(&str, &str); 4] = [
    ("image/jpeg", "jpg"),
    ("image/jpg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid file type. Only JPEG, PNG, and GIF are allowed.")]
    UnsupportedContentType(String),

    #[error("File too large. Maximum size is 10MB.")]
    TooLarge,

    #[error("Empty file uploaded.")]
    Empty,
}

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("guest caption quota already used")]
    QuotaExceeded,

    #[error("blob upload failed: {0}")]
    Storage(#[from] StorageError),

    #[error("persistence failed: {0:#}")]
    Persistence(anyhow::Error),

    #[error("{0} timed out")]
    Timeout(&'static str),
}

/// Check a content type against the allowed set, returning the blob extension.
/// Case and `;` parameters are ignored.
pub fn validate_content_type(content_type: &str) -> Result<&'static str, ValidationError> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    ALLOWED_CONTENT_TYPES
        .iter()
        .find(|(allowed, _)| *allowed == essence)
        .map(|(_, ext)| *ext)
        .ok_or(ValidationError::UnsupportedContentType(content_type.to_string()))
}

pub fn validate_size(size: usize) -> Result<(), ValidationError> {
    match size {
        0 => Err(ValidationError::Empty),
        n if n > MAX_UPLOAD_BYTES => Err(ValidationError::TooLarge),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub data: Bytes,
    pub content_type: String,
    pub identity: Option<Identity>,
    pub session_id: String,
}

#[derive(Debug, Clone)]
pub struct UploadReceipt {
    pub outcome: CaptionOutcome,
    pub image_url: String,
    /// Set only for authenticated callers.
    pub caption_id: Option<i64>,
}

impl UploadReceipt {
    pub fn caption(&self) -> &str {
        self.outcome.caption()
    }

    pub fn is_saved(&self) -> bool {
        self.caption_id.is_some()
    }
}

/// Runs an upload end to end: validation, guest quota, blob upload, caption
/// generation and finally either persisting the caption or spending the
/// session's free caption.
pub struct UploadCoordinator {
    generator: Arc<CaptionGenerator>,
    storage: Arc<dyn Storage>,
    repository: Arc<dyn CaptionRepository>,
    sessions: Arc<dyn SessionStore>,
    upstream_timeout: Duration,
}

impl UploadCoordinator {
    pub fn new(
        generator: Arc<CaptionGenerator>,
        storage: Arc<dyn Storage>,
        repository: Arc<dyn CaptionRepository>,
        sessions: Arc<dyn SessionStore>,
        upstream_timeout: Duration,
    ) -> Self {
        Self {
            generator,
            storage,
            repository,
            sessions,
            upstream_timeout,
        }
    }

    async fn with_timeout<T, E, F>(&self, what: &'static str, fut: F) -> Result<T, WorkflowError>
    where
        F: Future<Output = Result<T, E>>,
        WorkflowError: From<E>,
    {
        match tokio::time::timeout(self.upstream_timeout, fut).await {
            Ok(result) => result.map_err(WorkflowError::from),
            Err(_) => Err(WorkflowError::Timeout(what)),
        }
    }

    #[tracing::instrument(
        skip_all,
        fields(
            user_id = request.identity.map(|i| i.user_id),
            size = request.data.len()
        )
    )]
    pub async fn upload(&self, request: UploadRequest) -> Result<UploadReceipt, WorkflowError> {
        let UploadRequest {
            data,
            content_type,
            identity,
            session_id,
        } = request;

        let ext = validate_content_type(&content_type)?;
        validate_size(data.len())?;

        if identity.is_none() && self.sessions.is_used(&session_id).await {
            return Err(WorkflowError::QuotaExceeded);
        }

        let key = format!("captions/{}.{}", Uuid::new_v4(), ext);
        let image_url = self
            .with_timeout(
                "blob upload",
                self.storage.put(&key, data.clone(), &content_type),
            )
            .await?;

        let outcome = self.generator.caption(data).await;
        if let Some(reason) = outcome.degrade_reason() {
            warn!("serving fallback caption, reason: {}", reason.as_ref());
        }

        let caption_id = match identity {
            None => {
                if !self.sessions.mark_used(&session_id).await {
                    // a concurrent request from this session got there first
                    warn!("guest quota spent concurrently, blob {} is orphaned", key);
                    return Err(WorkflowError::QuotaExceeded);
                }
                None
            }
            Some(identity) => {
                let record = self
                    .with_timeout(
                        "caption insert",
                        self.repository.insert(NewCaption {
                            user_id: identity.user_id,
                            image_url: image_url.clone(),
                            caption_text: outcome.caption().to_string(),
                        }),
                    )
                    .await?;
                Some(record.id)
            }
        };

        info!(caption_id, "caption ready");

        Ok(UploadReceipt {
            outcome,
            image_url,
            caption_id,
        })
    }
}

impl From<anyhow::Error> for WorkflowError {
    fn from(value: anyhow::Error) -> Self {
        WorkflowError::Persistence(value)
    }
}

#[cfg(test)]
mod test {
    use super::{
        validate_content_type, validate_size, UploadCoordinator, UploadRequest, ValidationError,
        WorkflowError, MAX_UPLOAD_BYTES,
    };
    use crate::{
        auth::Identity,
        db::{
            CaptionPage, CaptionRecord, CaptionRepository, MemoryCaptionRepository, NewCaption,
            RECENT_HISTORY_LIMIT,
        },
        session::{MemorySessionStore, SessionStore},
    };
    use ai::{
        caption::{CaptionGenerator, CaptionModels, Vocabulary},
        FeatureExtractor, FeatureVector, TokenPredictor,
    };
    use anyhow::bail;
    use async_trait::async_trait;
    use bytes::Bytes;
    use image::RgbImage;
    use std::{
        collections::HashMap,
        io::Cursor,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };
    use storage::{MemoryStorage, Operator, Storage, StorageError, StorageResult};

    struct CountingExtractor(Arc<AtomicUsize>);

    impl FeatureExtractor for CountingExtractor {
        fn extract(&self, _image: &RgbImage) -> anyhow::Result<FeatureVector> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(FeatureVector::new(vec![1.0; 4]))
        }
    }

    /// Always says "startseq dog dog runs endseq".
    struct DogPredictor;

    impl TokenPredictor for DogPredictor {
        fn predict(&self, _: &FeatureVector, sequence: &[u32]) -> anyhow::Result<Vec<f32>> {
            let produced = sequence.iter().filter(|&&id| id != 0).count();
            let next = [3, 3, 4, 2][(produced - 1).min(3)];
            let mut scores = vec![0.0; 5];
            scores[next] = 1.0;
            Ok(scores)
        }
    }

    /// Rejects every write.
    struct BrokenStorage(MemoryStorage);

    #[async_trait]
    impl Storage for BrokenStorage {
        fn op(&self) -> &Operator {
            self.0.op()
        }

        fn public_base_url(&self) -> &str {
            self.0.public_base_url()
        }

        async fn put(
            &self,
            _key: &str,
            _data: Bytes,
            _content_type: &str,
        ) -> StorageResult<String> {
            Err(StorageError::ConfigError("bucket credentials rejected".to_string()))
        }
    }

    /// Writes never complete.
    struct StalledStorage(MemoryStorage);

    #[async_trait]
    impl Storage for StalledStorage {
        fn op(&self) -> &Operator {
            self.0.op()
        }

        fn public_base_url(&self) -> &str {
            self.0.public_base_url()
        }

        async fn put(
            &self,
            _key: &str,
            _data: Bytes,
            _content_type: &str,
        ) -> StorageResult<String> {
            std::future::pending().await
        }
    }

    struct BrokenRepository;

    #[async_trait]
    impl CaptionRepository for BrokenRepository {
        async fn insert(&self, _caption: NewCaption) -> anyhow::Result<CaptionRecord> {
            bail!("connection to db.internal refused")
        }

        async fn recent(
            &self,
            _user_id: i64,
            _limit: usize,
        ) -> anyhow::Result<Vec<CaptionRecord>> {
            bail!("connection to db.internal refused")
        }

        async fn page(
            &self,
            _user_id: i64,
            _offset: u64,
            _limit: u64,
        ) -> anyhow::Result<CaptionPage> {
            bail!("connection to db.internal refused")
        }
    }

    fn memory_storage() -> MemoryStorage {
        MemoryStorage::new("http://blobs.test").unwrap()
    }

    /// Coordinator over the dog-captioning stub models, returning it with the
    /// extraction counter.
    fn coordinator(
        storage: Arc<dyn Storage>,
        repository: Arc<dyn CaptionRepository>,
        sessions: Arc<MemorySessionStore>,
        upstream_timeout: Duration,
    ) -> (UploadCoordinator, Arc<AtomicUsize>) {
        let vocabulary = Vocabulary::from_word_index(HashMap::from([
            ("startseq".to_string(), 1),
            ("endseq".to_string(), 2),
            ("dog".to_string(), 3),
            ("runs".to_string(), 4),
        ]))
        .unwrap();
        let extractions = Arc::new(AtomicUsize::new(0));
        let models = CaptionModels::new(
            vocabulary,
            Box::new(CountingExtractor(Arc::clone(&extractions))),
            Box::new(DogPredictor),
        );
        let generator = Arc::new(CaptionGenerator::from_models(models, 1).unwrap());

        let coordinator =
            UploadCoordinator::new(generator, storage, repository, sessions, upstream_timeout);
        (coordinator, extractions)
    }

    struct Harness {
        coordinator: UploadCoordinator,
        extractions: Arc<AtomicUsize>,
        repository: Arc<MemoryCaptionRepository>,
        sessions: Arc<MemorySessionStore>,
        storage: Arc<MemoryStorage>,
    }

    fn harness() -> Harness {
        let repository = Arc::new(MemoryCaptionRepository::new());
        let sessions = Arc::new(MemorySessionStore::new());
        let storage = Arc::new(memory_storage());

        let (coordinator, extractions) = coordinator(
            storage.clone(),
            repository.clone(),
            sessions.clone(),
            Duration::from_secs(5),
        );

        Harness {
            coordinator,
            extractions,
            repository,
            sessions,
            storage,
        }
    }

    fn png() -> Bytes {
        let image = image::DynamicImage::ImageRgb8(RgbImage::new(3, 3));
        let mut buffer = Cursor::new(vec![]);
        image
            .write_to(&mut buffer, image::ImageFormat::Png)
            .unwrap();
        Bytes::from(buffer.into_inner())
    }

    fn request(identity: Option<Identity>, session_id: &str) -> UploadRequest {
        UploadRequest {
            data: png(),
            content_type: "image/png".to_string(),
            identity,
            session_id: session_id.to_string(),
        }
    }

    #[test]
    fn test_validate_content_type() {
        assert_eq!(validate_content_type("image/jpeg"), Ok("jpg"));
        assert_eq!(validate_content_type("IMAGE/JPG"), Ok("jpg"));
        assert_eq!(validate_content_type("image/png; charset=binary"), Ok("png"));
        assert_eq!(validate_content_type("image/gif"), Ok("gif"));
        assert!(matches!(
            validate_content_type("application/pdf"),
            Err(ValidationError::UnsupportedContentType(_))
        ));
        assert!(validate_content_type("image/webp").is_err());
        assert!(validate_content_type("").is_err());
    }

    #[test]
    fn test_validate_size() {
        assert_eq!(validate_size(0), Err(ValidationError::Empty));
        assert_eq!(validate_size(1), Ok(()));
        assert_eq!(validate_size(MAX_UPLOAD_BYTES), Ok(()));
        assert_eq!(validate_size(MAX_UPLOAD_BYTES + 1), Err(ValidationError::TooLarge));
    }

    #[test_log::test(tokio::test)]
    async fn test_authenticated_upload_is_persisted() {
        let h = harness();

        let receipt = h
            .coordinator
            .upload(request(Some(Identity { user_id: 5 }), "s1"))
            .await
            .unwrap();

        assert_eq!(receipt.caption(), "dog runs");
        assert!(receipt.outcome.degrade_reason().is_none());
        let caption_id = receipt.caption_id.unwrap();
        assert!(caption_id > 0);
        assert!(receipt.image_url.starts_with("http://blobs.test/captions/"));
        assert!(receipt.image_url.ends_with(".png"));

        let recent = h.repository.recent(5, RECENT_HISTORY_LIMIT).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, caption_id);
        assert_eq!(recent[0].caption_text, "dog runs");
        assert_eq!(recent[0].image_url, receipt.image_url);

        // authenticated uploads never spend the guest quota
        assert!(!h.sessions.is_used("s1").await);
    }

    #[test_log::test(tokio::test)]
    async fn test_guest_gets_one_caption_per_session() {
        let h = harness();

        let receipt = h.coordinator.upload(request(None, "guest")).await.unwrap();
        assert_eq!(receipt.caption_id, None);
        assert_eq!(receipt.caption(), "dog runs");
        assert_eq!(h.repository.count().await, 0);
        assert!(h.sessions.is_used("guest").await);

        let key = receipt
            .image_url
            .strip_prefix("http://blobs.test/")
            .unwrap();
        assert!(h.storage.is_exist(key).await.unwrap());

        let second = h.coordinator.upload(request(None, "guest")).await;
        assert!(matches!(second, Err(WorkflowError::QuotaExceeded)));
        assert_eq!(h.extractions.load(Ordering::SeqCst), 1);

        // a different session still has its free caption
        assert!(h.coordinator.upload(request(None, "other")).await.is_ok());
    }

    #[test_log::test(tokio::test)]
    async fn test_validation_happens_before_any_work() {
        let h = harness();

        let mut pdf = request(None, "s");
        pdf.content_type = "application/pdf".to_string();
        assert!(matches!(
            h.coordinator.upload(pdf).await,
            Err(WorkflowError::Validation(ValidationError::UnsupportedContentType(_)))
        ));

        let mut empty = request(None, "s");
        empty.data = Bytes::new();
        assert!(matches!(
            h.coordinator.upload(empty).await,
            Err(WorkflowError::Validation(ValidationError::Empty))
        ));

        let mut huge = request(None, "s");
        huge.data = Bytes::from(vec![0u8; MAX_UPLOAD_BYTES + 1]);
        assert!(matches!(
            h.coordinator.upload(huge).await,
            Err(WorkflowError::Validation(ValidationError::TooLarge))
        ));

        assert_eq!(h.extractions.load(Ordering::SeqCst), 0);
        assert!(!h.sessions.is_used("s").await);
    }

    #[test_log::test(tokio::test)]
    async fn test_undecodable_image_still_gets_a_caption() {
        let h = harness();

        let mut garbage = request(Some(Identity { user_id: 1 }), "s");
        garbage.data = Bytes::from_static(b"definitely not a png");

        let receipt = h.coordinator.upload(garbage).await.unwrap();
        assert!(receipt.outcome.degrade_reason().is_some());
        assert!(ai::caption::UNIVERSAL_CAPTIONS.contains(&receipt.caption()));
        assert!(receipt.is_saved());
    }

    #[test_log::test(tokio::test)]
    async fn test_blob_store_failure_keeps_guest_quota() {
        let sessions = Arc::new(MemorySessionStore::new());
        let (coordinator, extractions) = coordinator(
            Arc::new(BrokenStorage(memory_storage())),
            Arc::new(MemoryCaptionRepository::new()),
            sessions.clone(),
            Duration::from_secs(5),
        );

        let result = coordinator.upload(request(None, "guest")).await;

        assert!(matches!(result, Err(WorkflowError::Storage(_))));
        assert_eq!(extractions.load(Ordering::SeqCst), 0);
        assert!(!sessions.is_used("guest").await);
    }

    #[test_log::test(tokio::test)]
    async fn test_stalled_blob_store_times_out() {
        let sessions = Arc::new(MemorySessionStore::new());
        let (coordinator, extractions) = coordinator(
            Arc::new(StalledStorage(memory_storage())),
            Arc::new(MemoryCaptionRepository::new()),
            sessions.clone(),
            Duration::from_millis(50),
        );

        let result = coordinator.upload(request(None, "guest")).await;

        assert!(matches!(result, Err(WorkflowError::Timeout("blob upload"))));
        assert_eq!(extractions.load(Ordering::SeqCst), 0);
        assert!(!sessions.is_used("guest").await);
    }

    #[test_log::test(tokio::test)]
    async fn test_persistence_failure_is_reported() {
        let storage = Arc::new(memory_storage());
        let (coordinator, _) = coordinator(
            storage,
            Arc::new(BrokenRepository),
            Arc::new(MemorySessionStore::new()),
            Duration::from_secs(5),
        );

        let result = coordinator
            .upload(request(Some(Identity { user_id: 4 }), "s"))
            .await;

        match result {
            Err(WorkflowError::Persistence(e)) => {
                assert!(format!("{:#}", e).contains("db.internal"))
            }
            other => panic!("expected a persistence error, got {:?}", other),
        }
    }
}
