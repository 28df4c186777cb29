use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};

use crate::core::error::Result;
use crate::core::extractor::{AppJson, AppQuery};
use crate::features::admin::dtos::*;
use crate::features::admin::services::ModerationService;
use crate::features::auth::guards::RequireAdmin;
use crate::features::images::dtos::{AdminImageFilterQuery, ImageResponseDto, ImageStatsDto};
use crate::features::images::QueryService;
use crate::shared::types::{ApiResponse, Meta, PaginationQuery};

/// Dashboard counters
#[utoipa::path(
    get,
    path = "/api/admin/stats",
    responses(
        (status = 200, description = "Image and category counts", body = ApiResponse<ImageStatsDto>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin role required")
    ),
    tag = "admin",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_stats(
    RequireAdmin(_admin): RequireAdmin,
    State(service): State<Arc<QueryService>>,
) -> Result<Json<ApiResponse<ImageStatsDto>>> {
    let stats = service.stats().await?;
    Ok(Json(ApiResponse::success(Some(stats), None, None)))
}

/// List all images (paginated, optional status filter)
#[utoipa::path(
    get,
    path = "/api/admin/images",
    params(PaginationQuery, AdminImageFilterQuery),
    responses(
        (status = 200, description = "Images, newest upload first", body = ApiResponse<Vec<ImageResponseDto>>),
        (status = 400, description = "Invalid query parameters"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin role required")
    ),
    tag = "admin",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_images(
    RequireAdmin(_admin): RequireAdmin,
    State(service): State<Arc<QueryService>>,
    AppQuery(pagination): AppQuery<PaginationQuery>,
    AppQuery(filter): AppQuery<AdminImageFilterQuery>,
) -> Result<Json<ApiResponse<Vec<ImageResponseDto>>>> {
    let (items, total) = service.list_admin(&pagination, filter.status).await?;

    Ok(Json(ApiResponse::success(
        Some(items),
        None,
        Some(pagination.meta(total)),
    )))
}

/// The moderation queue, oldest first
#[utoipa::path(
    get,
    path = "/api/admin/pending",
    responses(
        (status = 200, description = "Pending images", body = ApiResponse<Vec<ImageResponseDto>>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin role required")
    ),
    tag = "admin",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_pending(
    RequireAdmin(_admin): RequireAdmin,
    State(service): State<Arc<QueryService>>,
) -> Result<Json<ApiResponse<Vec<ImageResponseDto>>>> {
    let items = service.pending().await?;
    let total = items.len() as i64;

    Ok(Json(ApiResponse::success(
        Some(items),
        None,
        Some(Meta {
            total,
            page: 1,
            limit: total.max(1),
        }),
    )))
}

/// Approve a pending image into a category
#[utoipa::path(
    post,
    path = "/api/admin/approve/{id}",
    params(
        ("id" = i64, Path, description = "Image id")
    ),
    request_body = ApproveRequestDto,
    responses(
        (status = 200, description = "Image approved", body = ApiResponse<ImageResponseDto>),
        (status = 400, description = "Missing or unknown category"),
        (status = 404, description = "Image not found or already processed")
    ),
    tag = "admin",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn approve_image(
    RequireAdmin(_admin): RequireAdmin,
    State(service): State<Arc<ModerationService>>,
    Path(id): Path<i64>,
    AppJson(dto): AppJson<ApproveRequestDto>,
) -> Result<Json<ApiResponse<ImageResponseDto>>> {
    let image = service.approve(id, dto.category_id).await?;
    Ok(Json(ApiResponse::success(
        Some(image),
        Some("Image approved".to_string()),
        None,
    )))
}

/// Reject an image: delete the record and its stored file
#[utoipa::path(
    post,
    path = "/api/admin/reject/{id}",
    params(
        ("id" = i64, Path, description = "Image id")
    ),
    responses(
        (status = 200, description = "Image rejected"),
        (status = 404, description = "Image not found")
    ),
    tag = "admin",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn reject_image(
    RequireAdmin(_admin): RequireAdmin,
    State(service): State<Arc<ModerationService>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>> {
    service.reject(id).await?;
    Ok(Json(ApiResponse::success(
        None,
        Some("Image rejected".to_string()),
        None,
    )))
}

/// Delete an image; same as rejecting it
#[utoipa::path(
    delete,
    path = "/api/admin/images/{id}",
    params(
        ("id" = i64, Path, description = "Image id")
    ),
    responses(
        (status = 200, description = "Image deleted"),
        (status = 404, description = "Image not found")
    ),
    tag = "admin",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_image(
    admin: RequireAdmin,
    state: State<Arc<ModerationService>>,
    id: Path<i64>,
) -> Result<Json<ApiResponse<()>>> {
    reject_image(admin, state, id).await
}

/// Approve many pending images into one category
#[utoipa::path(
    post,
    path = "/api/admin/bulk-approve",
    request_body = BulkApproveRequestDto,
    responses(
        (status = 200, description = "Pending images among `ids` approved", body = ApiResponse<BulkApproveResponseDto>),
        (status = 400, description = "Missing or unknown category, or too many ids")
    ),
    tag = "admin",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn bulk_approve(
    RequireAdmin(_admin): RequireAdmin,
    State(service): State<Arc<ModerationService>>,
    AppJson(dto): AppJson<BulkApproveRequestDto>,
) -> Result<Json<ApiResponse<BulkApproveResponseDto>>> {
    let result = service.bulk_approve(&dto.ids, dto.category_id).await?;
    Ok(Json(ApiResponse::success(Some(result), None, None)))
}

/// Reject many images, removing their stored files
#[utoipa::path(
    post,
    path = "/api/admin/bulk-delete",
    request_body = BulkIdsRequestDto,
    responses(
        (status = 200, description = "Existing images among `ids` deleted", body = ApiResponse<BulkRejectResponseDto>),
        (status = 400, description = "Too many ids")
    ),
    tag = "admin",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn bulk_reject(
    RequireAdmin(_admin): RequireAdmin,
    State(service): State<Arc<ModerationService>>,
    AppJson(dto): AppJson<BulkIdsRequestDto>,
) -> Result<Json<ApiResponse<BulkRejectResponseDto>>> {
    let result = service.bulk_reject(&dto.ids).await?;
    Ok(Json(ApiResponse::success(Some(result), None, None)))
}
