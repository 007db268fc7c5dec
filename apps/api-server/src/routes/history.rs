use super::extract::RequireIdentity;
use crate::{
    ctx::Ctx,
    db::{CaptionRecord, RECENT_HISTORY_LIMIT},
    error::ApiError,
};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

pub const MAX_PAGE_LIMIT: u64 = 100;

/// Largest row offset a page may start at. Offsets are signed in the database.
const MAX_OFFSET: u64 = i64::MAX as u64;

#[derive(Serialize, Debug)]
pub struct RecentHistory {
    pub items: Vec<CaptionRecord>,
    pub count: usize,
}

pub async fn recent_history(
    State(ctx): State<Ctx>,
    RequireIdentity(identity): RequireIdentity,
) -> Result<Json<RecentHistory>, ApiError> {
    let items = ctx
        .repository()
        .recent(identity.user_id, RECENT_HISTORY_LIMIT)
        .await?;

    Ok(Json(RecentHistory {
        count: items.len(),
        items,
    }))
}

#[derive(Deserialize, Debug)]
pub struct HistoryQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_page() -> u64 {
    1
}

fn default_limit() -> u64 {
    10
}

impl HistoryQuery {
    /// Validate `page` and `limit`, returning the offset of the first row.
    fn offset(&self) -> Result<u64, ApiError> {
        if self.page < 1 {
            return Err(ApiError::BadRequest("page must be at least 1".to_string()));
        }
        if !(1..=MAX_PAGE_LIMIT).contains(&self.limit) {
            return Err(ApiError::BadRequest(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_LIMIT
            )));
        }

        (self.page - 1)
            .checked_mul(self.limit)
            .filter(|offset| *offset <= MAX_OFFSET)
            .ok_or(ApiError::BadRequest("page is out of range".to_string()))
    }
}

#[derive(Serialize, Debug)]
pub struct HistoryPage {
    pub items: Vec<CaptionRecord>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

pub async fn all_history(
    State(ctx): State<Ctx>,
    RequireIdentity(identity): RequireIdentity,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<HistoryPage>, ApiError> {
    let Query(query) = query?;
    let offset = query.offset()?;

    let page = ctx
        .repository()
        .page(identity.user_id, offset, query.limit)
        .await?;

    Ok(Json(HistoryPage {
        items: page.items,
        total: page.total,
        page: query.page,
        limit: query.limit,
        total_pages: page.total.div_ceil(query.limit),
    }))
}
