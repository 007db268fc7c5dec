use crate::{S3Config, Storage, StorageResult};
use opendal::{services::S3, Operator};

#[derive(Clone, Debug)]
pub struct S3Storage {
    op: Operator,
    public_base_url: String,
}

impl S3Storage {
    pub fn new(
        root: impl AsRef<str>,
        config: S3Config,
        public_base_url: impl Into<String>,
    ) -> StorageResult<Self> {
        let mut root = root.as_ref().to_string();
        if !root.starts_with('/') {
            root = format!("/{}", root);
        }

        let mut builder = S3::default();
        // NOTE: the root must be absolute path.
        builder.root(&root);
        builder.bucket(&config.bucket);
        builder.endpoint(&config.endpoint);
        builder.access_key_id(&config.access_key_id);
        builder.secret_access_key(&config.secret_access_key);
        if let Some(region) = &config.region {
            builder.region(region);
        }
        let op: Operator = Operator::new(builder)?.finish();

        Ok(Self {
            op,
            public_base_url: public_base_url.into(),
        })
    }
}

impl Storage for S3Storage {
    fn op(&self) -> &Operator {
        &self.op
    }

    fn public_base_url(&self) -> &str {
        &self.public_base_url
    }
}

#[cfg(test)]
mod test {
    use super::S3Storage;
    use crate::{S3Config, Storage};

    #[test]
    fn test_build_without_network() {
        let storage = S3Storage::new(
            "captions-root",
            S3Config::new(
                "caption-bucket".into(),
                "http://127.0.0.1:9000".into(),
                "access".into(),
                "secret".into(),
            )
            .with_region("us-east-1"),
            "https://cdn.example.com/",
        )
        .unwrap();

        assert_eq!(
            storage.url_for("captions/a.png"),
            "https://cdn.example.com/captions/a.png"
        );
    }
}
