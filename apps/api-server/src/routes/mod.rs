mod caption;
mod extract;
mod history;
mod localhost;

pub use caption::{CaptionResponse, GUEST_MESSAGE, SAVED_MESSAGE};
pub use localhost::get_localhost_routes;

use crate::{ctx::Ctx, workflow::MAX_UPLOAD_BYTES};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

async fn index() -> Json<Value> {
    Json(json!({ "message": "Image Caption Generator API" }))
}

pub fn get_routes(ctx: Ctx) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/caption/upload", post(caption::upload_caption))
        .route("/history/recent", get(history::recent_history))
        .route("/history/all", get(history::all_history))
        // oversize uploads are rejected with a 400 while streaming, this only
        // bounds the whole request
        .layer(DefaultBodyLimit::max(4 * MAX_UPLOAD_BYTES))
        .with_state(ctx)
}
