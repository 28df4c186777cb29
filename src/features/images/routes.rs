use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::features::images::handlers::{list_images, random_image, upload_images};
use crate::features::images::services::{IngestionService, QueryService};

/// Public gallery routes
pub fn routes(query_service: Arc<QueryService>) -> Router {
    Router::new()
        .route("/api/images", get(list_images))
        .route("/api/images/random", get(random_image))
        .with_state(query_service)
}

/// Upload route; needs an authenticated user
pub fn upload_routes(ingestion_service: Arc<IngestionService>, max_body_size: usize) -> Router {
    Router::new()
        .route(
            "/api/images/upload",
            post(upload_images).layer(DefaultBodyLimit::max(max_body_size)),
        )
        .with_state(ingestion_service)
}
