use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::features::admin::handlers;
use crate::features::admin::services::ModerationService;
use crate::features::images::QueryService;

/// Create admin routes (every handler requires the admin role)
pub fn routes(query_service: Arc<QueryService>, moderation_service: Arc<ModerationService>) -> Router {
    let read = Router::new()
        .route("/api/admin/stats", get(handlers::get_stats))
        .route("/api/admin/images", get(handlers::list_images))
        .route("/api/admin/pending", get(handlers::list_pending))
        .with_state(query_service);

    let actions = Router::new()
        .route("/api/admin/approve/{id}", post(handlers::approve_image))
        .route("/api/admin/reject/{id}", post(handlers::reject_image))
        .route("/api/admin/images/{id}", delete(handlers::delete_image))
        .route("/api/admin/bulk-approve", post(handlers::bulk_approve))
        .route("/api/admin/bulk-delete", post(handlers::bulk_reject))
        .route("/api/admin/bulk-reject", post(handlers::bulk_reject))
        .with_state(moderation_service);

    read.merge(actions)
}
