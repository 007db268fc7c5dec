use axum::Router;
use std::path::Path;
use tower_http::services::ServeDir;

/// Serve blobs written by the filesystem storage backend at `/images`.
pub fn get_localhost_routes(images_dir: &Path) -> Router {
    Router::new().nest_service("/images", ServeDir::new(images_dir))
}
