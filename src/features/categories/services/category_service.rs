use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::info;

use crate::core::error::{is_foreign_key_violation, is_unique_violation, AppError, Result};
use crate::features::categories::dtos::{CategoryResponseDto, CreateCategoryDto, UpdateCategoryDto};
use crate::features::categories::models::Category;
use crate::features::images::ImageStore;

/// Service for category operations
pub struct CategoryService {
    pool: SqlitePool,
    images: Arc<ImageStore>,
}

impl CategoryService {
    pub fn new(pool: SqlitePool, images: Arc<ImageStore>) -> Self {
        Self { pool, images }
    }

    /// List all categories ordered by id
    pub async fn list(&self) -> Result<Vec<CategoryResponseDto>> {
        let categories =
            sqlx::query_as::<_, Category>("SELECT id, name, slug FROM categories ORDER BY id")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to list categories: {:?}", e);
                    AppError::Database(e)
                })?;

        Ok(categories.into_iter().map(|c| c.into()).collect())
    }

    pub async fn get(&self, id: i64) -> Result<CategoryResponseDto> {
        self.find(id)
            .await?
            .map(|c| c.into())
            .ok_or_else(|| AppError::NotFound(format!("Category {} not found", id)))
    }

    pub async fn exists(&self, id: i64) -> Result<bool> {
        let found = sqlx::query_scalar::<_, i64>("SELECT 1 FROM categories WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    /// Fail with a validation error unless the category exists
    pub async fn ensure_exists(&self, id: i64) -> Result<()> {
        if self.exists(id).await? {
            Ok(())
        } else {
            Err(AppError::Validation(format!("Category {} does not exist", id)))
        }
    }

    pub async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM categories")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn create(&self, dto: CreateCategoryDto) -> Result<CategoryResponseDto> {
        let category = sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name, slug) VALUES (?, ?) RETURNING id, name, slug",
        )
        .bind(dto.name.trim())
        .bind(&dto.slug)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| slug_conflict(e, &dto.slug))?;

        info!("Category created: id={}, slug={}", category.id, category.slug);
        Ok(category.into())
    }

    pub async fn update(&self, id: i64, dto: UpdateCategoryDto) -> Result<CategoryResponseDto> {
        let current = self
            .find(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Category {} not found", id)))?;

        let name = dto
            .name
            .map(|n| n.trim().to_string())
            .unwrap_or(current.name);
        let slug = dto.slug.unwrap_or(current.slug);

        let category = sqlx::query_as::<_, Category>(
            "UPDATE categories SET name = ?, slug = ? WHERE id = ? RETURNING id, name, slug",
        )
        .bind(&name)
        .bind(&slug)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| slug_conflict(e, &slug))?
        .ok_or_else(|| AppError::NotFound(format!("Category {} not found", id)))?;

        info!("Category updated: id={}", category.id);
        Ok(category.into())
    }

    /// Delete a category nothing refers to
    pub async fn delete(&self, id: i64) -> Result<()> {
        let in_use = self.images.count_referencing(id).await?;
        if in_use > 0 {
            return Err(AppError::Conflict(format!(
                "Category {} is used by {} images",
                id, in_use
            )));
        }

        let result = sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                // An image picked this category up after the count above
                if is_foreign_key_violation(&e) {
                    AppError::Conflict(format!("Category {} is in use", id))
                } else {
                    AppError::Database(e)
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Category {} not found", id)));
        }

        info!("Category deleted: id={}", id);
        Ok(())
    }

    async fn find(&self, id: i64) -> Result<Option<Category>> {
        let category =
            sqlx::query_as::<_, Category>("SELECT id, name, slug FROM categories WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(category)
    }
}

fn slug_conflict(err: sqlx::Error, slug: &str) -> AppError {
    if is_unique_violation(&err) {
        AppError::Conflict(format!("Category slug '{}' already exists", slug))
    } else {
        AppError::Database(err)
    }
}
