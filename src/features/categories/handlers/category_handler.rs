use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::core::extractor::AppJson;
use crate::features::auth::guards::RequireAdmin;
use crate::features::categories::dtos::{CategoryResponseDto, CreateCategoryDto, UpdateCategoryDto};
use crate::features::categories::services::CategoryService;
use crate::shared::types::ApiResponse;

/// List all categories
#[utoipa::path(
    get,
    path = "/api/categories",
    responses(
        (status = 200, description = "List of categories", body = ApiResponse<Vec<CategoryResponseDto>>),
    ),
    tag = "categories"
)]
pub async fn list_categories(
    State(service): State<Arc<CategoryService>>,
) -> Result<Json<ApiResponse<Vec<CategoryResponseDto>>>> {
    let categories = service.list().await?;
    Ok(Json(ApiResponse::success(Some(categories), None, None)))
}

/// Get category by id
#[utoipa::path(
    get,
    path = "/api/categories/{id}",
    params(
        ("id" = i64, Path, description = "Category id")
    ),
    responses(
        (status = 200, description = "Category found", body = ApiResponse<CategoryResponseDto>),
        (status = 404, description = "Category not found")
    ),
    tag = "categories"
)]
pub async fn get_category(
    State(service): State<Arc<CategoryService>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<CategoryResponseDto>>> {
    let category = service.get(id).await?;
    Ok(Json(ApiResponse::success(Some(category), None, None)))
}

/// Create a category (admin)
#[utoipa::path(
    post,
    path = "/api/admin/categories",
    request_body = CreateCategoryDto,
    responses(
        (status = 201, description = "Category created", body = ApiResponse<CategoryResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin role required"),
        (status = 409, description = "Slug already exists")
    ),
    tag = "categories",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_category(
    RequireAdmin(_admin): RequireAdmin,
    State(service): State<Arc<CategoryService>>,
    AppJson(dto): AppJson<CreateCategoryDto>,
) -> Result<(StatusCode, Json<ApiResponse<CategoryResponseDto>>)> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let category = service.create(dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(Some(category), None, None)),
    ))
}

/// Update a category (admin)
#[utoipa::path(
    put,
    path = "/api/admin/categories/{id}",
    params(
        ("id" = i64, Path, description = "Category id")
    ),
    request_body = UpdateCategoryDto,
    responses(
        (status = 200, description = "Category updated", body = ApiResponse<CategoryResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 404, description = "Category not found"),
        (status = 409, description = "Slug already exists")
    ),
    tag = "categories",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_category(
    RequireAdmin(_admin): RequireAdmin,
    State(service): State<Arc<CategoryService>>,
    Path(id): Path<i64>,
    AppJson(dto): AppJson<UpdateCategoryDto>,
) -> Result<Json<ApiResponse<CategoryResponseDto>>> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let category = service.update(id, dto).await?;
    Ok(Json(ApiResponse::success(Some(category), None, None)))
}

/// Delete a category that no image refers to (admin)
#[utoipa::path(
    delete,
    path = "/api/admin/categories/{id}",
    params(
        ("id" = i64, Path, description = "Category id")
    ),
    responses(
        (status = 200, description = "Category deleted"),
        (status = 404, description = "Category not found"),
        (status = 409, description = "Category is in use")
    ),
    tag = "categories",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_category(
    RequireAdmin(_admin): RequireAdmin,
    State(service): State<Arc<CategoryService>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>> {
    service.delete(id).await?;
    Ok(Json(ApiResponse::success(
        None,
        Some("Category deleted successfully".to_string()),
        None,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::categories::routes;
    use crate::features::images::ImageStore;
    use crate::shared::test_helpers::{test_pool, with_admin_auth, with_user_auth};
    use axum_test::TestServer;
    use serde_json::json;

    async fn service() -> Arc<CategoryService> {
        let pool = test_pool().await;
        let images = Arc::new(ImageStore::new(pool.clone()));
        Arc::new(CategoryService::new(pool, images))
    }

    #[tokio::test]
    async fn test_public_listing() {
        let server = TestServer::new(routes::routes(service().await)).unwrap();

        let response = server.get("/api/categories").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: serde_json::Value = response.json();
        assert_eq!(body["data"].as_array().unwrap().len(), 5);

        let response = server.get("/api/categories/3").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: serde_json::Value = response.json();
        assert_eq!(body["data"]["slug"], "cute");

        let response = server.get("/api/categories/77").await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_admin_crud() {
        let app = with_admin_auth(routes::admin_routes(service().await));
        let server = TestServer::new(app).unwrap();

        let response = server
            .post("/api/admin/categories")
            .json(&json!({"name": "Birds", "slug": "birds"}))
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
        let body: serde_json::Value = response.json();
        let id = body["data"]["id"].as_i64().unwrap();

        let response = server
            .post("/api/admin/categories")
            .json(&json!({"name": "Birds", "slug": "Not A Slug"}))
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

        let response = server
            .put(&format!("/api/admin/categories/{id}"))
            .json(&json!({"name": "Parrots"}))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);

        let response = server.delete(&format!("/api/admin/categories/{id}")).await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let response = server.delete(&format!("/api/admin/categories/{id}")).await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_admin_routes_reject_other_callers() {
        let server = TestServer::new(routes::admin_routes(service().await)).unwrap();
        let response = server
            .post("/api/admin/categories")
            .json(&json!({"name": "Birds", "slug": "birds"}))
            .await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

        let app = with_user_auth(routes::admin_routes(service().await), 1);
        let server = TestServer::new(app).unwrap();
        let response = server.delete("/api/admin/categories/1").await;
        assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    }
}
