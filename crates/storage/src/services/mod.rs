mod fs_storage;
mod memory_storage;
mod s3_storage;

pub use fs_storage::FsStorage;
pub use memory_storage::MemoryStorage;
pub use s3_storage::S3Storage;
