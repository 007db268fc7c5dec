mod memory;
mod surreal;

pub use memory::MemoryCaptionRepository;
pub use surreal::SurrealCaptionRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const RECENT_HISTORY_LIMIT: usize = 3;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CaptionRecord {
    pub id: i64,
    pub user_id: i64,
    pub image_url: String,
    pub caption_text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCaption {
    pub user_id: i64,
    pub image_url: String,
    pub caption_text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptionPage {
    pub items: Vec<CaptionRecord>,
    pub total: u64,
}

/// Persistence for captions of authenticated users. Records are never updated.
#[async_trait]
pub trait CaptionRepository: Send + Sync {
    /// Store a caption, assigning a new positive id and the creation time.
    async fn insert(&self, caption: NewCaption) -> anyhow::Result<CaptionRecord>;

    /// Newest first.
    async fn recent(&self, user_id: i64, limit: usize) -> anyhow::Result<Vec<CaptionRecord>>;

    /// Newest first, skipping the first `offset` captions.
    async fn page(&self, user_id: i64, offset: u64, limit: u64) -> anyhow::Result<CaptionPage>;
}

#[cfg(test)]
pub(crate) mod test {
    use super::{CaptionRepository, NewCaption, RECENT_HISTORY_LIMIT};

    fn new_caption(user_id: i64, n: usize) -> NewCaption {
        NewCaption {
            user_id,
            image_url: format!("http://localhost/images/{}.png", n),
            caption_text: format!("caption {}", n),
        }
    }

    /// Shared checks run against every repository implementation.
    pub(crate) async fn exercise_repository(repo: &dyn CaptionRepository) {
        let mut ids = vec![];
        for n in 0..5 {
            let record = repo.insert(new_caption(7, n)).await.unwrap();
            assert!(record.id > 0);
            assert_eq!(record.user_id, 7);
            ids.push(record.id);
        }
        repo.insert(new_caption(8, 99)).await.unwrap();

        let mut sorted = ids.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), ids.len(), "ids must be unique");

        let recent = repo.recent(7, RECENT_HISTORY_LIMIT).await.unwrap();
        let texts = recent
            .iter()
            .map(|r| r.caption_text.as_str())
            .collect::<Vec<_>>();
        assert_eq!(texts, vec!["caption 4", "caption 3", "caption 2"]);
        assert!(recent.windows(2).all(|w| w[0].created_at >= w[1].created_at));

        assert!(repo.recent(9, RECENT_HISTORY_LIMIT).await.unwrap().is_empty());

        let page = repo.page(7, 2, 2).await.unwrap();
        assert_eq!(page.total, 5);
        let texts = page
            .items
            .iter()
            .map(|r| r.caption_text.as_str())
            .collect::<Vec<_>>();
        assert_eq!(texts, vec!["caption 2", "caption 1"]);

        let page = repo.page(7, 6, 2).await.unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 5);

        let page = repo.page(7, 1_000_000, 100).await.unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 5);
    }
}
