use opendal::Error as OpenDalError;
use thiserror::Error;

pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage error: {0}")]
    OpenDalError(#[from] OpenDalError),

    #[error("Invalid blob key: {0:?}")]
    InvalidKey(String),

    #[error("Storage config error: {0}")]
    ConfigError(String),
}
