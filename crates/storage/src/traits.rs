use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use opendal::Operator;
use tracing::debug;

/// A place to put uploaded images so they can be referenced by URL later.
///
/// Implementors only supply the operator and the public prefix; reading and
/// writing go through opendal the same way for every backend.
#[async_trait]
pub trait Storage: Send + Sync {
    fn op(&self) -> &Operator;

    /// Prefix prepended to a key to build its public URL.
    fn public_base_url(&self) -> &str;

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url().trim_end_matches('/'), key)
    }

    /// Store `data` under `key` and return its public URL.
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<String> {
        validate_key(key)?;
        debug!("writing {} bytes to {}", data.len(), key);

        if self.op().info().full_capability().write_with_content_type {
            self.op()
                .write_with(key, data)
                .content_type(content_type)
                .await?;
        } else {
            self.op().write(key, data).await?;
        }

        Ok(self.url_for(key))
    }

    async fn is_exist(&self, key: &str) -> StorageResult<bool> {
        validate_key(key)?;
        Ok(self.op().is_exist(key).await?)
    }
}

/// Keys are relative paths under the backend root.
fn validate_key(key: &str) -> StorageResult<()> {
    let invalid = key.is_empty()
        || key.starts_with('/')
        || key.ends_with('/')
        || key.split('/').any(|part| part.is_empty() || part == "..");

    if invalid {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}
