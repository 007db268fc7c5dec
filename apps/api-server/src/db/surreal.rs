use super::{CaptionPage, CaptionRecord, CaptionRepository, NewCaption};
use anyhow::anyhow;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use surrealdb::{
    engine::local::{Db, Mem},
    sql::Datetime,
    Surreal,
};
use tokio::sync::Mutex;

// namespace and database are fixed, one service owns the whole store
const DATABASE_NS_VALUE: &str = "image-caption";
const DATABASE_NAME_VALUE: &str = "history";

const CREATE_TABLE: &str = r#"
DEFINE TABLE IF NOT EXISTS caption SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS user_id ON TABLE caption TYPE int;
DEFINE FIELD IF NOT EXISTS image_url ON TABLE caption TYPE string;
DEFINE FIELD IF NOT EXISTS caption_text ON TABLE caption TYPE string;
DEFINE FIELD IF NOT EXISTS created_at ON TABLE caption TYPE datetime DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS caption_user ON TABLE caption FIELDS user_id;

-- single row holding the last issued caption id
DEFINE TABLE IF NOT EXISTS caption_sequence SCHEMALESS;
"#;

const NEXT_ID: &str =
    "UPSERT ONLY caption_sequence:main SET counter = (counter ?? 0) + 1 RETURN VALUE counter";

const INSERT_CAPTION: &str = r#"
CREATE ONLY type::thing('caption', $id)
    SET user_id = $user_id, image_url = $image_url, caption_text = $caption_text
    RETURN NONE
"#;

const SELECT_FIELDS: &str = "record::id(id) AS id, user_id, image_url, caption_text, created_at";

#[derive(Deserialize, Debug)]
struct CaptionRow {
    id: i64,
    user_id: i64,
    image_url: String,
    caption_text: String,
    created_at: Datetime,
}

impl From<CaptionRow> for CaptionRecord {
    fn from(row: CaptionRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            image_url: row.image_url,
            caption_text: row.caption_text,
            created_at: row.created_at.0,
        }
    }
}

#[derive(Deserialize, Debug)]
struct CountRow {
    total: u64,
}

#[derive(Clone, Debug)]
pub struct SurrealCaptionRepository {
    client: Surreal<Db>,
    // id allocation and insert must not interleave
    write_lock: std::sync::Arc<Mutex<()>>,
}

impl SurrealCaptionRepository {
    /// Open the store at `path`, or an in-memory store when `path` is `None`.
    pub async fn new(path: Option<&Path>) -> anyhow::Result<Self> {
        let client = Self::init_db(path).await.map_err(|e| {
            tracing::error!("Failed to initialize surrealdb: {}", e);
            e
        })?;

        Ok(Self {
            client,
            write_lock: Default::default(),
        })
    }

    async fn init_db(path: Option<&Path>) -> anyhow::Result<Surreal<Db>> {
        let db = match path {
            None => Surreal::new::<Mem>(()).await?,
            #[cfg(feature = "embedded-db")]
            Some(path) => {
                let config = surrealdb::opt::Config::default();
                Surreal::new::<surrealdb::engine::local::RocksDb>((path, config)).await?
            }
            #[cfg(not(feature = "embedded-db"))]
            Some(path) => anyhow::bail!(
                "DATABASE_PATH={} requires the embedded-db feature",
                path.display()
            ),
        };

        db.use_ns(DATABASE_NS_VALUE)
            .use_db(DATABASE_NAME_VALUE)
            .await?;
        db.query(CREATE_TABLE).await?.check()?;

        Ok(db)
    }
}

#[async_trait]
impl CaptionRepository for SurrealCaptionRepository {
    #[tracing::instrument(skip_all, fields(user_id = caption.user_id))]
    async fn insert(&self, caption: NewCaption) -> anyhow::Result<CaptionRecord> {
        let _guard = self.write_lock.lock().await;

        let id: Option<i64> = self.client.query(NEXT_ID).await?.take(0)?;
        let id = id.ok_or(anyhow!("caption sequence returned no id"))?;

        self.client
            .query(INSERT_CAPTION)
            .bind(("id", id))
            .bind(("user_id", caption.user_id))
            .bind(("image_url", caption.image_url))
            .bind(("caption_text", caption.caption_text))
            .await?
            .check()?;

        let row: Option<CaptionRow> = self
            .client
            .query(format!(
                "SELECT {} FROM ONLY type::thing('caption', $id)",
                SELECT_FIELDS
            ))
            .bind(("id", id))
            .await?
            .take(0)?;

        row.map(CaptionRecord::from)
            .ok_or(anyhow!("caption {} missing after insert", id))
    }

    async fn recent(&self, user_id: i64, limit: usize) -> anyhow::Result<Vec<CaptionRecord>> {
        let rows: Vec<CaptionRow> = self
            .client
            .query(format!(
                "SELECT {} FROM caption WHERE user_id = $user_id ORDER BY created_at DESC, id DESC LIMIT $limit",
                SELECT_FIELDS
            ))
            .bind(("user_id", user_id))
            .bind(("limit", limit as i64))
            .await?
            .take(0)?;

        Ok(rows.into_iter().map(CaptionRecord::from).collect())
    }

    async fn page(&self, user_id: i64, offset: u64, limit: u64) -> anyhow::Result<CaptionPage> {
        let start = i64::try_from(offset)?;
        let limit = i64::try_from(limit)?;

        let mut response = self
            .client
            .query(format!(
                "SELECT {} FROM caption WHERE user_id = $user_id ORDER BY created_at DESC, id DESC LIMIT $limit START $start",
                SELECT_FIELDS
            ))
            .query("SELECT count() AS total FROM caption WHERE user_id = $user_id GROUP ALL")
            .bind(("user_id", user_id))
            .bind(("limit", limit))
            .bind(("start", start))
            .await?;

        let rows: Vec<CaptionRow> = response.take(0)?;
        let counts: Vec<CountRow> = response.take(1)?;

        Ok(CaptionPage {
            items: rows.into_iter().map(CaptionRecord::from).collect(),
            total: counts.first().map(|c| c.total).unwrap_or(0),
        })
    }
}
