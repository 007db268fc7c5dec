use crate::{Storage, StorageResult};
use opendal::{services::Memory, Operator};

/// Process-local store, contents vanish on restart.
#[derive(Clone, Debug)]
pub struct MemoryStorage {
    op: Operator,
    public_base_url: String,
}

impl MemoryStorage {
    pub fn new(public_base_url: impl Into<String>) -> StorageResult<Self> {
        let builder = Memory::default();
        let op: Operator = Operator::new(builder)?.finish();

        Ok(Self {
            op,
            public_base_url: public_base_url.into(),
        })
    }
}

impl Storage for MemoryStorage {
    fn op(&self) -> &Operator {
        &self.op
    }

    fn public_base_url(&self) -> &str {
        &self.public_base_url
    }
}
