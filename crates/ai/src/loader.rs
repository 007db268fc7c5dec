use crate::CaptionError;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

type CreateModelFn<T> = Arc<dyn Fn() -> anyhow::Result<T> + Send + Sync>;

enum LoadState<T> {
    Ready(Arc<T>),
    Unavailable(String),
}

/// Loads a model at most once for the process lifetime.
///
/// The outcome of the first load is cached, including failures, so concurrent
/// first callers wait on the same load and a broken artifact is not retried
/// on every request.
pub(crate) struct ModelLoader<T> {
    state: OnceCell<LoadState<T>>,
    create_model_fn: Option<CreateModelFn<T>>,
}

impl<T> ModelLoader<T>
where
    T: Send + Sync + 'static,
{
    pub fn new<F>(create_model: F) -> Self
    where
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Self {
            state: OnceCell::new(),
            create_model_fn: Some(Arc::new(create_model)),
        }
    }

    pub fn ready(model: T) -> Self {
        Self {
            state: OnceCell::new_with(Some(LoadState::Ready(Arc::new(model)))),
            create_model_fn: None,
        }
    }

    pub async fn load(&self) -> Result<Arc<T>, CaptionError> {
        let state = self
            .state
            .get_or_init(|| async {
                let Some(create_model) = self.create_model_fn.clone() else {
                    return LoadState::Unavailable("no model constructor".to_string());
                };

                debug!("loading model");
                match tokio::task::spawn_blocking(move || create_model()).await {
                    Ok(Ok(model)) => {
                        info!("model loaded");
                        LoadState::Ready(Arc::new(model))
                    }
                    Ok(Err(e)) => {
                        error!("failed to load model: {:#}", e);
                        LoadState::Unavailable(format!("{:#}", e))
                    }
                    Err(e) => {
                        error!("model loading task failed: {}", e);
                        LoadState::Unavailable(e.to_string())
                    }
                }
            })
            .await;

        match state {
            LoadState::Ready(model) => Ok(Arc::clone(model)),
            LoadState::Unavailable(reason) => Err(CaptionError::ModelUnavailable(reason.clone())),
        }
    }
}
