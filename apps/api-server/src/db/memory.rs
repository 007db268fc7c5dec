use super::{CaptionPage, CaptionRecord, CaptionRepository, NewCaption};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

/// Keeps records in process memory. Used by tests and throwaway deployments.
#[derive(Default)]
pub struct MemoryCaptionRepository {
    records: RwLock<Vec<CaptionRecord>>,
}

impl MemoryCaptionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.records.read().await.len()
    }

    fn newest_first(records: &[CaptionRecord], user_id: i64) -> Vec<CaptionRecord> {
        // records are appended in id order, so reversing is newest first
        records
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CaptionRepository for MemoryCaptionRepository {
    async fn insert(&self, caption: NewCaption) -> anyhow::Result<CaptionRecord> {
        let mut records = self.records.write().await;
        let record = CaptionRecord {
            id: records.len() as i64 + 1,
            user_id: caption.user_id,
            image_url: caption.image_url,
            caption_text: caption.caption_text,
            created_at: Utc::now(),
        };
        records.push(record.clone());
        Ok(record)
    }

    async fn recent(&self, user_id: i64, limit: usize) -> anyhow::Result<Vec<CaptionRecord>> {
        let records = self.records.read().await;
        let mut items = Self::newest_first(&records, user_id);
        items.truncate(limit);
        Ok(items)
    }

    async fn page(&self, user_id: i64, offset: u64, limit: u64) -> anyhow::Result<CaptionPage> {
        let records = self.records.read().await;
        let items = Self::newest_first(&records, user_id);
        let total = items.len() as u64;

        let items = items
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .collect();

        Ok(CaptionPage { items, total })
    }
}
