mod config;
mod error;
mod services;
mod traits;

pub use bytes::Bytes;
pub use opendal::Operator;
pub use config::{S3Config, StorageBackend, StorageConfig};
pub use error::{StorageError, StorageResult};
pub use services::{FsStorage, MemoryStorage, S3Storage};
pub use traits::Storage;
