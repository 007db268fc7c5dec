use crate::{FsStorage, MemoryStorage, S3Storage, Storage, StorageResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct S3Config {
    pub bucket: String,
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: Option<String>,
}

impl S3Config {
    pub fn new(
        bucket: String,
        endpoint: String,
        access_key_id: String,
        secret_access_key: String,
    ) -> Self {
        Self {
            bucket,
            endpoint,
            access_key_id,
            secret_access_key,
            region: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}

#[derive(Debug, Clone)]
pub enum StorageBackend {
    Fs { root: PathBuf },
    S3 { root: String, config: S3Config },
    Memory,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub public_base_url: String,
}

impl StorageConfig {
    pub fn build(&self) -> StorageResult<Box<dyn Storage>> {
        let url = self.public_base_url.clone();
        let storage: Box<dyn Storage> = match &self.backend {
            StorageBackend::Fs { root } => Box::new(FsStorage::new(root, url)?),
            StorageBackend::S3 { root, config } => {
                Box::new(S3Storage::new(root, config.clone(), url)?)
            }
            StorageBackend::Memory => Box::new(MemoryStorage::new(url)?),
        };
        Ok(storage)
    }
}
