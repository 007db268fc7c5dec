use crate::{Storage, StorageError, StorageResult};
use opendal::{services::Fs, Operator};
use std::path::Path;

#[derive(Clone, Debug)]
pub struct FsStorage {
    op: Operator,
    public_base_url: String,
}

impl FsStorage {
    pub fn new(root: impl AsRef<Path>, public_base_url: impl Into<String>) -> StorageResult<Self> {
        let root = root.as_ref();
        let root_str = root
            .to_str()
            .ok_or_else(|| StorageError::ConfigError(format!("non utf-8 root {:?}", root)))?;

        let mut builder = Fs::default();
        builder.root(root_str);
        let op: Operator = Operator::new(builder)?.finish();

        Ok(Self {
            op,
            public_base_url: public_base_url.into(),
        })
    }
}

impl Storage for FsStorage {
    fn op(&self) -> &Operator {
        &self.op
    }

    fn public_base_url(&self) -> &str {
        &self.public_base_url
    }
}
