use ai::caption::{CaptionConfig, CaptionModelPaths};
use anyhow::{anyhow, bail, Context};
use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};
use storage::{S3Config, StorageBackend, StorageConfig};
use strum_macros::EnumString;

pub const DEFAULT_LISTEN_ADDR: &str = "[::]:8000";
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(EnumString, Debug, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
enum StorageKind {
    Fs,
    S3,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    Any,
    List(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub caption: CaptionConfig,
    pub session_secret: String,
    pub cors_allowed_origins: AllowedOrigins,
    pub storage: StorageConfig,
    pub database_path: Option<PathBuf>,
    pub upstream_timeout: Duration,
    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key/value source, empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let listen_addr = var("LISTEN_ADDR")
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string())
            .parse::<SocketAddr>()
            .context("invalid LISTEN_ADDR")?;

        let resources_dir = var("LOCAL_RESOURCES_DIR").unwrap_or_else(|| "resources".to_string());
        let defaults = CaptionModelPaths::from_resources_dir(&resources_dir);
        let paths = CaptionModelPaths {
            vocabulary: var("CAPTION_VOCABULARY_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.vocabulary),
            feature_extractor: var("CAPTION_FEATURE_EXTRACTOR_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.feature_extractor),
            decoder: var("CAPTION_DECODER_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.decoder),
        };

        let mut caption = CaptionConfig::new(paths);
        if let Some(secs) = var("FETCH_TIMEOUT_SECS") {
            caption.fetch_timeout = Duration::from_secs(parse_number("FETCH_TIMEOUT_SECS", &secs)?);
        }
        if let Some(workers) = var("INFERENCE_WORKERS") {
            caption.inference_workers = parse_number("INFERENCE_WORKERS", &workers)?;
        }

        let session_secret = var("SESSION_SECRET").ok_or(anyhow!("SESSION_SECRET is not set"))?;

        let cors_allowed_origins = match var("CORS_ALLOWED_ORIGINS") {
            None => AllowedOrigins::Any,
            Some(v) if v.trim() == "*" => AllowedOrigins::Any,
            Some(v) => AllowedOrigins::List(
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            ),
        };

        let storage_root = var("STORAGE_ROOT").unwrap_or_else(|| "data/images".to_string());
        let storage_kind = match var("STORAGE_BACKEND") {
            Some(v) => StorageKind::from_str(v.trim())
                .map_err(|_| anyhow!("unknown STORAGE_BACKEND {:?}", v))?,
            None => StorageKind::Fs,
        };
        let backend = match storage_kind {
            StorageKind::Fs => StorageBackend::Fs {
                root: PathBuf::from(storage_root),
            },
            StorageKind::Memory => StorageBackend::Memory,
            StorageKind::S3 => {
                let required = |key: &str| var(key).ok_or(anyhow!("{} is required for s3", key));
                let mut config = S3Config::new(
                    required("S3_BUCKET")?,
                    required("S3_ENDPOINT")?,
                    required("S3_ACCESS_KEY_ID")?,
                    required("S3_SECRET_ACCESS_KEY")?,
                );
                if let Some(region) = var("S3_REGION") {
                    config = config.with_region(region);
                }
                StorageBackend::S3 {
                    root: storage_root,
                    config,
                }
            }
        };
        let storage = StorageConfig {
            backend,
            public_base_url: var("STORAGE_PUBLIC_URL")
                .unwrap_or_else(|| "http://localhost:8000/images".to_string()),
        };

        let upstream_timeout = match var("UPSTREAM_TIMEOUT_SECS") {
            Some(secs) => Duration::from_secs(parse_number("UPSTREAM_TIMEOUT_SECS", &secs)?),
            None => DEFAULT_UPSTREAM_TIMEOUT,
        };

        Ok(Self {
            listen_addr,
            caption,
            session_secret,
            cors_allowed_origins,
            storage,
            database_path: var("DATABASE_PATH").map(PathBuf::from),
            upstream_timeout,
            log_dir: var("LOCAL_LOG_DIR").map(PathBuf::from),
        })
    }

    /// Directory to expose under `/images` when blobs live on the local disk.
    pub fn served_images_dir(&self) -> Option<&PathBuf> {
        match &self.storage.backend {
            StorageBackend::Fs { root } => Some(root),
            _ => None,
        }
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> anyhow::Result<T> {
    match value.trim().parse::<T>() {
        Ok(v) => Ok(v),
        Err(_) => bail!("{} must be a number, got {:?}", key, value),
    }
}
